//! Freshness-aware content rotation
//!
//! The rotator selects post text from JSON-backed content pools using
//! weighted randomization, avoiding anything used recently on the target
//! platform. Selection weight favors higher-priority items, less-used
//! content, and text near the cross-platform sweet-spot length.
//!
//! # Modules
//!
//! - [`pool`] - Content pools and their backing files
//! - [`freshness`] - Per-platform last-use tracking

pub mod freshness;
pub mod pool;

pub use freshness::FreshnessTracker;
pub use pool::{ContentPool, PoolSource};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RotationConfig;
use crate::coordinator::{Coordinator, ContentItem};
use crate::metrics;
use crate::models::{content_hash, ContentKind, Platform};
use crate::storage::StateStore;

/// Text length the selection weight is centered on
const OPTIMAL_TEXT_CHARS: f64 = 150.0;

// ============================================================================
// Platform Preferences
// ============================================================================

/// Per-platform rotation preferences
#[derive(Debug, Clone)]
pub struct PlatformPrefs {
    /// Content kinds tried in order of preference
    pub preferred_kinds: Vec<ContentKind>,

    /// Hours before the same content may repeat on this platform
    pub freshness_hours: i64,
}

impl PlatformPrefs {
    /// Built-in preferences per platform
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Twitter => Self {
                preferred_kinds: vec![ContentKind::Joke, ContentKind::Advertisement],
                freshness_hours: 24,
            },
            Platform::Mastodon => Self {
                preferred_kinds: vec![ContentKind::Joke, ContentKind::Comic],
                freshness_hours: 36,
            },
            Platform::Bluesky => Self {
                preferred_kinds: vec![ContentKind::Joke, ContentKind::Custom],
                freshness_hours: 30,
            },
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

/// A piece of content chosen by the rotator
#[derive(Debug, Clone)]
pub struct ContentSelection {
    /// Post text
    pub text: String,

    /// Kind of the selected content
    pub kind: ContentKind,

    /// Pool the content came from
    pub source: PoolSource,

    /// The raw pool item
    pub item: Value,
}

struct Candidate {
    text: String,
    hash: String,
    weight: f64,
    item: Value,
}

/// Pick an index from weighted candidates
fn select_weighted<R: Rng>(candidates: &[Candidate], rng: &mut R) -> usize {
    if candidates.len() == 1 {
        return 0;
    }

    let total: f64 = candidates.iter().map(|c| c.weight).sum();
    if total <= 0.0 {
        return rng.gen_range(0..candidates.len());
    }

    let mut roll = rng.gen_range(0.0..total);
    for (i, candidate) in candidates.iter().enumerate() {
        roll -= candidate.weight;
        if roll <= 0.0 {
            return i;
        }
    }

    candidates.len() - 1
}

// ============================================================================
// Rotator Statistics
// ============================================================================

/// Snapshot of pool and usage state
#[derive(Debug, Clone)]
pub struct RotatorStats {
    /// Per-pool (total items, recently used) counts
    pub pools: HashMap<PoolSource, (usize, usize)>,

    /// Hashes under freshness tracking
    pub tracked_hashes: usize,

    /// Selections per platform id
    pub platform_usage: HashMap<String, usize>,

    /// Total items across all pools
    pub total_items: usize,
}

// ============================================================================
// Content Rotator
// ============================================================================

/// Selects fresh content per platform from the configured pools
pub struct ContentRotator {
    pools: HashMap<PoolSource, ContentPool>,
    freshness: FreshnessTracker,
    config: RotationConfig,
}

impl ContentRotator {
    /// Create a rotator, loading pools from the configured files
    pub fn new(config: RotationConfig, store: Option<StateStore>) -> Self {
        let freshness = match store {
            Some(store) => FreshnessTracker::with_store(store),
            None => FreshnessTracker::new(),
        };

        let mut rotator = Self {
            pools: HashMap::new(),
            freshness,
            config,
        };
        rotator.initialize_pools();
        rotator
    }

    fn initialize_pools(&mut self) {
        for source in PoolSource::all() {
            if let Some(items) = self.load_pool_items(source) {
                info!(source = %source, items = items.len(), "Loaded content pool");
                self.pools.insert(source, ContentPool::new(source, items));
            }
        }
    }

    /// Load items for a pool from its backing file, if any
    ///
    /// The advertisements pool always exists, falling back to the built-in
    /// defaults when no file is configured.
    fn load_pool_items(&self, source: PoolSource) -> Option<Vec<Value>> {
        let load = |path: &std::path::PathBuf| match pool::load_items_file(path) {
            Ok(items) => Some(items),
            Err(e) => {
                warn!(source = %source, error = %e, "Failed to load pool file");
                None
            }
        };

        match source {
            PoolSource::Jokes => self.config.jokes_file.as_ref().and_then(load),
            PoolSource::Replies => self.config.replies_file.as_ref().and_then(load),
            PoolSource::Advertisements => Some(
                self.config
                    .advertisements_file
                    .as_ref()
                    .and_then(load)
                    .unwrap_or_else(pool::default_advertisements),
            ),
            PoolSource::Comics => {
                let dir = self.config.comics_dir.as_ref()?;
                match pool::load_comics_dir(dir) {
                    Ok(comics) => Some(comics),
                    Err(e) => {
                        warn!(error = %e, "Failed to load comics directory");
                        None
                    }
                }
            }
        }
    }

    /// Select fresh content for a platform
    ///
    /// Tries the platform's preferred kinds in order (or the requested kind),
    /// then falls back to any pool with an eligible item.
    pub fn fresh_content(
        &mut self,
        platform: Platform,
        kind: Option<ContentKind>,
        now: DateTime<Utc>,
    ) -> Option<ContentSelection> {
        let prefs = PlatformPrefs::for_platform(platform);
        let target_kinds = match kind {
            Some(kind) => vec![kind],
            None => prefs.preferred_kinds.clone(),
        };

        for target in &target_kinds {
            if let Some(source) = PoolSource::for_kind(*target) {
                if let Some(selection) = self.select_from_pool(source, platform, now) {
                    return Some(selection);
                }
            }
        }

        // Fallback: any pool with something eligible
        for source in PoolSource::all() {
            if let Some(selection) = self.select_from_pool(source, platform, now) {
                return Some(selection);
            }
        }

        warn!(platform = %platform, "No fresh content available");
        None
    }

    fn select_from_pool(
        &mut self,
        source: PoolSource,
        platform: Platform,
        now: DateTime<Utc>,
    ) -> Option<ContentSelection> {
        let prefs = PlatformPrefs::for_platform(platform);
        let max_chars = platform.max_post_chars();

        let candidates: Vec<Candidate> = {
            let pool = self.pools.get(&source)?;
            pool.items
                .iter()
                .filter_map(|item| {
                    let text = pool::extract_text(item)?;
                    if text.chars().count() > max_chars {
                        return None;
                    }

                    let hash = content_hash(&text);
                    if pool.recently_used(&hash) {
                        return None;
                    }
                    if !self.freshness.is_fresh(&hash, platform, prefs.freshness_hours, now) {
                        return None;
                    }

                    let weight = self.candidate_weight(item, &text, &hash);
                    Some(Candidate {
                        text,
                        hash,
                        weight,
                        item: item.clone(),
                    })
                })
                .collect()
        };

        if candidates.is_empty() {
            return None;
        }

        let index = select_weighted(&candidates, &mut rand::thread_rng());
        let chosen = &candidates[index];

        if let Some(pool) = self.pools.get_mut(&source) {
            pool.mark_recent(chosen.hash.clone());
        }
        self.freshness.record(&chosen.hash, platform, now);
        metrics::record_content_selected(source.id(), platform.id());

        Some(ContentSelection {
            text: chosen.text.clone(),
            kind: source.content_kind(),
            source,
            item: chosen.item.clone(),
        })
    }

    /// Selection weight: item priority, scaled down by prior use across
    /// platforms and by distance from the sweet-spot length
    fn candidate_weight(&self, item: &Value, text: &str, hash: &str) -> f64 {
        let mut weight = pool::item_priority(item);

        let usage = self.freshness.usage_count(hash);
        weight *= (1.0 / usage.max(1) as f64).max(0.1);

        let length_factor = 1.0 - (text.chars().count() as f64 - OPTIMAL_TEXT_CHARS).abs() / 200.0;
        weight *= length_factor.max(0.5);

        weight
    }

    /// Select `count` fresh items and hand them to the coordinator with
    /// spaced scheduled times
    pub fn schedule_automated(
        &mut self,
        coordinator: &mut Coordinator,
        platform: Platform,
        count: usize,
        start: Option<DateTime<Utc>>,
        spacing_hours: i64,
        now: DateTime<Utc>,
    ) -> Vec<Uuid> {
        let start = start.unwrap_or(now + Duration::minutes(30));
        let mut scheduled = Vec::new();

        for i in 0..count {
            let Some(selection) = self.fresh_content(platform, None, now) else {
                warn!(platform = %platform, slot = i + 1, "No content available for slot");
                continue;
            };

            let post_time = start + Duration::hours(i as i64 * spacing_hours);
            let times: HashMap<Platform, DateTime<Utc>> =
                [(platform, post_time)].into_iter().collect();

            let item = ContentItem::new(selection.text, selection.kind, vec![platform], now)
                .with_scheduled_times(times)
                .with_metadata("source", selection.source.id())
                .with_metadata("automated", "true")
                .with_metadata("rotation_batch", now.to_rfc3339());

            if let Some(id) = coordinator.add_item(item) {
                scheduled.push(id);
            }
        }

        info!(
            platform = %platform,
            scheduled = scheduled.len(),
            requested = count,
            "Scheduled automated posts"
        );
        scheduled
    }

    /// Reload pools whose backing files changed, returning how many refreshed
    pub fn refresh_pools(&mut self) -> usize {
        let mut refreshed = 0;

        for source in PoolSource::all() {
            let Some(new_items) = self.load_pool_items(source) else {
                continue;
            };

            match self.pools.get_mut(&source) {
                Some(pool) => {
                    if new_items.len() != pool.items.len() || new_items != pool.items {
                        info!(source = %source, items = new_items.len(), "Refreshed content pool");
                        pool.replace_items(new_items);
                        refreshed += 1;
                    }
                }
                None => {
                    info!(source = %source, items = new_items.len(), "Loaded new content pool");
                    self.pools.insert(source, ContentPool::new(source, new_items));
                    refreshed += 1;
                }
            }
        }

        refreshed
    }

    /// Forget freshness stamps older than the horizon
    pub fn reset_freshness(
        &mut self,
        platform: Option<Platform>,
        older_than_hours: i64,
        now: DateTime<Utc>,
    ) -> usize {
        self.freshness.reset(platform, older_than_hours, now)
    }

    /// Rotation statistics snapshot
    pub fn statistics(&self) -> RotatorStats {
        let mut pools = HashMap::new();
        let mut total_items = 0;

        for (source, pool) in &self.pools {
            pools.insert(*source, (pool.items.len(), pool.recent_len()));
            total_items += pool.items.len();
        }

        RotatorStats {
            pools,
            tracked_hashes: self.freshness.tracked_count(),
            platform_usage: self.freshness.platform_usage(),
            total_items,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;
    use std::path::PathBuf;

    fn write_jokes(dir: &std::path::Path, jokes: &[&str]) -> PathBuf {
        let items: Vec<Value> = jokes.iter().map(|j| json!({ "joke": j })).collect();
        let path = dir.join("jokes.json");
        std::fs::write(&path, serde_json::to_string(&items).unwrap()).unwrap();
        path
    }

    fn rotator_with_jokes(dir: &std::path::Path, jokes: &[&str]) -> ContentRotator {
        let config = RotationConfig {
            jokes_file: Some(write_jokes(dir, jokes)),
            ..Default::default()
        };
        ContentRotator::new(config, None)
    }

    #[test]
    fn test_fresh_content_prefers_jokes() {
        let dir = tempfile::tempdir().unwrap();
        let mut rotator = rotator_with_jokes(dir.path(), &["a short joke"]);

        let selection = rotator
            .fresh_content(Platform::Bluesky, None, Utc::now())
            .unwrap();
        assert_eq!(selection.kind, ContentKind::Joke);
        assert_eq!(selection.source, PoolSource::Jokes);
        assert_eq!(selection.text, "a short joke");
    }

    #[test]
    fn test_selection_marks_content_used() {
        let dir = tempfile::tempdir().unwrap();
        let mut rotator = rotator_with_jokes(dir.path(), &["only joke"]);
        let now = Utc::now();

        assert!(rotator.fresh_content(Platform::Bluesky, Some(ContentKind::Joke), now).is_some());

        // Recent-ring blocks an immediate repeat from the same pool
        assert!(rotator
            .fresh_content(Platform::Bluesky, Some(ContentKind::Joke), now)
            .is_none());
    }

    #[test]
    fn test_recent_ring_is_shared_across_platforms() {
        let dir = tempfile::tempdir().unwrap();
        let mut rotator = rotator_with_jokes(dir.path(), &["shared joke"]);
        let now = Utc::now();

        rotator.fresh_content(Platform::Bluesky, Some(ContentKind::Joke), now);

        // The recent-ring is per pool, so another platform cannot pick the
        // same item immediately either
        let other = rotator.fresh_content(Platform::Twitter, Some(ContentKind::Joke), now);
        assert!(other.is_none());
    }

    #[test]
    fn test_length_limit_filters_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let long_joke = "x".repeat(400);
        let mut rotator = rotator_with_jokes(dir.path(), &[&long_joke, "short enough"]);

        // 400 chars exceeds every platform limit; only the short joke remains
        let selection = rotator
            .fresh_content(Platform::Twitter, Some(ContentKind::Joke), Utc::now())
            .unwrap();
        assert_eq!(selection.text, "short enough");
    }

    #[test]
    fn test_fallback_to_advertisements() {
        // No jokes configured; the built-in ads pool answers
        let rotator_config = RotationConfig::default();
        let mut rotator = ContentRotator::new(rotator_config, None);

        let selection = rotator
            .fresh_content(Platform::Mastodon, None, Utc::now())
            .unwrap();
        assert_eq!(selection.source, PoolSource::Advertisements);
    }

    #[test]
    fn test_select_weighted_prefers_heavier() {
        let candidates = vec![
            Candidate {
                text: "light".into(),
                hash: "h1".into(),
                weight: 0.001,
                item: json!({}),
            },
            Candidate {
                text: "heavy".into(),
                hash: "h2".into(),
                weight: 100.0,
                item: json!({}),
            },
        ];

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut heavy_wins = 0;
        for _ in 0..100 {
            if select_weighted(&candidates, &mut rng) == 1 {
                heavy_wins += 1;
            }
        }
        assert!(heavy_wins > 90);
    }

    #[test]
    fn test_select_weighted_single_candidate() {
        let candidates = vec![Candidate {
            text: "only".into(),
            hash: "h".into(),
            weight: 0.0,
            item: json!({}),
        }];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(select_weighted(&candidates, &mut rng), 0);
    }

    #[test]
    fn test_schedule_automated_spacing() {
        let dir = tempfile::tempdir().unwrap();
        let mut rotator = rotator_with_jokes(dir.path(), &["joke one", "joke two", "joke three"]);
        let mut coordinator = Coordinator::new();
        let now = Utc::now();
        let start = now + Duration::minutes(30);

        let ids = rotator.schedule_automated(
            &mut coordinator,
            Platform::Bluesky,
            2,
            Some(start),
            4,
            now,
        );
        assert_eq!(ids.len(), 2);

        let first = coordinator.get_pending(ids[0]).unwrap();
        let second = coordinator.get_pending(ids[1]).unwrap();
        assert_eq!(first.scheduled_for(Platform::Bluesky).unwrap(), start);
        assert_eq!(
            second.scheduled_for(Platform::Bluesky).unwrap(),
            start + Duration::hours(4)
        );
        assert_eq!(first.metadata.get("automated").unwrap(), "true");
        assert_eq!(first.metadata.get("source").unwrap(), "jokes");
    }

    #[test]
    fn test_refresh_pools_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_jokes(dir.path(), &["one"]);
        let config = RotationConfig {
            jokes_file: Some(path.clone()),
            ..Default::default()
        };
        let mut rotator = ContentRotator::new(config, None);

        // Unchanged file refreshes nothing
        assert_eq!(rotator.refresh_pools(), 0);

        // Adding a joke triggers a refresh
        let items = vec![json!({"joke": "one"}), json!({"joke": "two"})];
        std::fs::write(&path, serde_json::to_string(&items).unwrap()).unwrap();
        assert_eq!(rotator.refresh_pools(), 1);

        let stats = rotator.statistics();
        assert_eq!(stats.pools.get(&PoolSource::Jokes).unwrap().0, 2);
    }

    #[test]
    fn test_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let mut rotator = rotator_with_jokes(dir.path(), &["a", "b joke text"]);
        let now = Utc::now();

        rotator.fresh_content(Platform::Bluesky, Some(ContentKind::Joke), now);

        let stats = rotator.statistics();
        assert!(stats.total_items >= 2);
        assert_eq!(stats.tracked_hashes, 1);
        assert_eq!(*stats.platform_usage.get("bluesky").unwrap(), 1);
    }
}
