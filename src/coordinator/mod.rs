//! Cross-platform content coordination
//!
//! The coordinator owns the lifecycle of content items across platforms:
//! admission with content-hash deduplication, per-platform FIFO queues,
//! scheduled-time and priority-based selection, post-publish cooldowns, and
//! hourly/daily posting limits. State round-trips through a single JSON
//! file written after each mutation.
//!
//! # Modules
//!
//! - [`item`] - Content items and per-platform status
//! - [`dedup`] - Bounded content-hash index with a bloom screen
//! - [`limits`] - Posting limits, cooldowns, and the rate-limit guard

pub mod dedup;
pub mod item;
pub mod limits;

pub use dedup::DedupIndex;
pub use item::{ContentItem, PostStatus};
pub use limits::{Pacer, PlatformLimits};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::metrics;
use crate::models::{ContentKind, Platform};
use crate::storage::StateStore;

/// File name of the persisted coordinator state
const STATE_FILE: &str = "coordinator_state.json";

/// Exact dedup history capacity
const HISTORY_CAPACITY: usize = 5000;

/// Posted items kept across saves
const POSTED_CAPACITY: usize = 1000;

// ============================================================================
// Persisted State
// ============================================================================

/// On-disk form of the coordinator state
#[derive(Debug, Default, Serialize, Deserialize)]
struct CoordinatorState {
    pending: Vec<ContentItem>,
    posted: Vec<ContentItem>,
    content_history: Vec<String>,
    queues: HashMap<Platform, Vec<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Statistics
// ============================================================================

/// Posting statistics for one platform
#[derive(Debug, Clone, Serialize)]
pub struct PlatformStats {
    pub platform: Platform,
    pub total_pending: usize,
    pub total_posted: usize,
    pub total_failed: usize,
    pub posts_last_hour: usize,
    pub posts_last_day: usize,
    pub queue_length: usize,
    pub next_available: Option<DateTime<Utc>>,
}

// ============================================================================
// Coordinator
// ============================================================================

/// Cross-platform content coordinator
pub struct Coordinator {
    pending: HashMap<Uuid, ContentItem>,
    posted: HashMap<Uuid, ContentItem>,
    dedup: DedupIndex,
    queues: HashMap<Platform, VecDeque<Uuid>>,
    pacer: Pacer,
    store: Option<StateStore>,
}

impl Coordinator {
    /// Create a coordinator without persistence
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            posted: HashMap::new(),
            dedup: DedupIndex::new(HISTORY_CAPACITY),
            queues: Platform::all()
                .into_iter()
                .map(|p| (p, VecDeque::new()))
                .collect(),
            pacer: Pacer::new(),
            store: None,
        }
    }

    /// Create a coordinator backed by a state store, restoring prior state
    pub fn with_store(store: StateStore) -> Self {
        let mut coordinator = Self::new();
        coordinator.store = Some(store);
        coordinator.load_state();
        coordinator
    }

    /// Admit a prepared item for coordinated posting
    ///
    /// Returns `None` when the item's content hash was seen before.
    pub fn add_item(&mut self, item: ContentItem) -> Option<Uuid> {
        if self.dedup.contains(&item.content_hash) {
            warn!(hash = %&item.content_hash[..12], "Duplicate content detected, skipping");
            metrics::record_dedup_hit("coordinator");
            return None;
        }

        let id = item.id;
        self.dedup.insert(item.content_hash.clone());
        for platform in &item.platforms {
            if let Some(queue) = self.queues.get_mut(platform) {
                queue.push_back(id);
            }
        }
        let platform_count = item.platforms.len();
        self.pending.insert(id, item);

        self.save_state();
        info!(id = %id, platforms = platform_count, "Added content");
        Some(id)
    }

    /// Admit content for coordinated posting
    ///
    /// Returns `None` when the content hash was seen before.
    pub fn add_content(
        &mut self,
        text: impl Into<String>,
        kind: ContentKind,
        platforms: Vec<Platform>,
        scheduled_times: Option<HashMap<Platform, DateTime<Utc>>>,
        priority: u32,
        now: DateTime<Utc>,
    ) -> Option<Uuid> {
        let mut item = ContentItem::new(text, kind, platforms, now).with_priority(priority);
        if let Some(times) = scheduled_times {
            item = item.with_scheduled_times(times);
        }
        self.add_item(item)
    }

    /// Schedule one piece of content across platforms with staggered times
    ///
    /// The first platform posts at `start` (default ten minutes out), each
    /// later platform `stagger_minutes` after the previous one.
    pub fn schedule_cross_platform(
        &mut self,
        text: impl Into<String>,
        kind: ContentKind,
        platforms: Vec<Platform>,
        stagger_minutes: i64,
        start: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<Uuid> {
        let start = start.unwrap_or(now + Duration::minutes(10));

        let times: HashMap<Platform, DateTime<Utc>> = platforms
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, start + Duration::minutes(i as i64 * stagger_minutes)))
            .collect();

        // Cross-platform items outrank single-platform fillers
        let id = self.add_content(text, kind, platforms.clone(), Some(times), 2, now)?;
        info!(id = %id, platforms = platforms.len(), "Scheduled cross-platform content");
        Some(id)
    }

    /// Next content item ready to post on a platform
    ///
    /// Returns `None` while the platform is cooling down, has reached its
    /// hourly/daily limit, or has nothing due.
    pub fn next_for_platform(
        &self,
        platform: Platform,
        now: DateTime<Utc>,
    ) -> Option<ContentItem> {
        if self.pacer.on_cooldown(platform, now) {
            return None;
        }

        if self.limit_reached(platform, now) {
            return None;
        }

        let queue = self.queues.get(&platform)?;
        let mut candidates: Vec<&ContentItem> = queue
            .iter()
            .filter_map(|id| self.pending.get(id))
            .filter(|item| {
                item.status_for(platform) == PostStatus::Pending && item.is_due_on(platform, now)
            })
            .collect();

        if candidates.is_empty() {
            return None;
        }

        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        Some(candidates[0].clone())
    }

    /// Record the outcome of a posting attempt
    pub fn mark_posted(&mut self, id: Uuid, platform: Platform, success: bool, now: DateTime<Utc>) {
        let Some(item) = self.pending.get_mut(&id) else {
            warn!(id = %id, "Content not found in pending set");
            return;
        };

        if success {
            item.status.insert(platform, PostStatus::Posted);
            metrics::record_post(platform.id(), true);
            info!(id = %id, platform = %platform, "Content posted");
        } else {
            item.status.insert(platform, PostStatus::Failed);
            metrics::record_post(platform.id(), false);
            error!(id = %id, platform = %platform, "Content failed to post");
        }

        if let Some(queue) = self.queues.get_mut(&platform) {
            queue.retain(|queued| *queued != id);
        }

        let complete = item.is_complete();
        if complete {
            if let Some(item) = self.pending.remove(&id) {
                self.posted.insert(id, item);
            }
        }

        self.pacer.start_cooldown(platform, now);
        self.save_state();
    }

    /// Consume a slot of the process-level hourly guard for a platform
    pub fn try_acquire_rate_slot(&self, platform: Platform) -> bool {
        self.pacer.try_acquire(platform)
    }

    /// Whether the hourly or daily limit is exhausted
    fn limit_reached(&self, platform: Platform, now: DateTime<Utc>) -> bool {
        let limits = PlatformLimits::for_platform(platform);

        let hourly = self.posts_in_window(platform, Duration::hours(1), now);
        if hourly >= limits.hourly_limit as usize {
            warn!(platform = %platform, posts = hourly, "Hourly limit reached");
            return true;
        }

        let daily = self.posts_in_window(platform, Duration::days(1), now);
        if daily >= limits.daily_limit as usize {
            warn!(platform = %platform, posts = daily, "Daily limit reached");
            return true;
        }

        false
    }

    /// Count successful posts on a platform within a recent window
    fn posts_in_window(&self, platform: Platform, window: Duration, now: DateTime<Utc>) -> usize {
        self.posted
            .values()
            .filter(|item| item.status_for(platform) == PostStatus::Posted)
            .filter_map(|item| item.scheduled_for(platform))
            .filter(|posted_at| now.signed_duration_since(*posted_at) < window)
            .count()
    }

    /// Posting statistics for a platform
    pub fn platform_statistics(&self, platform: Platform, now: DateTime<Utc>) -> PlatformStats {
        let total_pending = self
            .pending
            .values()
            .filter(|item| item.status_for(platform) == PostStatus::Pending)
            .count();

        let mut total_posted = 0;
        let mut total_failed = 0;
        for item in self.posted.values() {
            match item.status_for(platform) {
                PostStatus::Posted => total_posted += 1,
                PostStatus::Failed => total_failed += 1,
                _ => {}
            }
        }

        PlatformStats {
            platform,
            total_pending,
            total_posted,
            total_failed,
            posts_last_hour: self.posts_in_window(platform, Duration::hours(1), now),
            posts_last_day: self.posts_in_window(platform, Duration::days(1), now),
            queue_length: self.queues.get(&platform).map(|q| q.len()).unwrap_or(0),
            next_available: self.pacer.cooldown_until(platform, now),
        }
    }

    /// Drop posted items older than `days`, returning how many were removed
    pub fn cleanup(&mut self, days: i64, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(days);

        let old_ids: Vec<Uuid> = self
            .posted
            .iter()
            .filter(|(_, item)| item.created_at < cutoff)
            .map(|(id, _)| *id)
            .collect();

        for id in &old_ids {
            self.posted.remove(id);
        }

        if !old_ids.is_empty() {
            info!(removed = old_ids.len(), "Cleaned up old posted content");
            self.save_state();
        }

        old_ids.len()
    }

    /// Number of pending items
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of archived posted items
    pub fn posted_count(&self) -> usize {
        self.posted.len()
    }

    /// Look up a pending item
    pub fn get_pending(&self, id: Uuid) -> Option<&ContentItem> {
        self.pending.get(&id)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn load_state(&mut self) {
        let Some(store) = &self.store else {
            return;
        };

        let state: CoordinatorState = store.load_or_default(STATE_FILE);

        for item in state.pending {
            self.pending.insert(item.id, item);
        }
        for item in state.posted {
            self.posted.insert(item.id, item);
        }
        self.dedup = DedupIndex::from_hashes(HISTORY_CAPACITY, state.content_history);
        for (platform, ids) in state.queues {
            // Queues only reference pending items; drop dangling ids
            let queue: VecDeque<Uuid> = ids
                .into_iter()
                .filter(|id| self.pending.contains_key(id))
                .collect();
            self.queues.insert(platform, queue);
        }

        info!(
            pending = self.pending.len(),
            posted = self.posted.len(),
            "Loaded coordinator state"
        );
    }

    fn save_state(&mut self) {
        let Some(store) = &self.store else {
            return;
        };

        // Cap the posted archive, keeping the newest items
        if self.posted.len() > POSTED_CAPACITY {
            let mut by_age: Vec<(Uuid, DateTime<Utc>)> = self
                .posted
                .iter()
                .map(|(id, item)| (*id, item.created_at))
                .collect();
            by_age.sort_by_key(|(_, created)| *created);
            let excess = by_age.len() - POSTED_CAPACITY;
            for (id, _) in by_age.into_iter().take(excess) {
                self.posted.remove(&id);
            }
        }

        let state = CoordinatorState {
            pending: self.pending.values().cloned().collect(),
            posted: self.posted.values().cloned().collect(),
            content_history: self.dedup.hashes(),
            queues: self
                .queues
                .iter()
                .map(|(p, q)| (*p, q.iter().copied().collect()))
                .collect(),
            saved_at: Some(Utc::now()),
        };

        if let Err(e) = store.save(STATE_FILE, &state) {
            error!(error = %e, "Failed to save coordinator state");
        } else {
            debug!("Saved coordinator state");
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn all_platforms() -> Vec<Platform> {
        vec![Platform::Twitter, Platform::Mastodon, Platform::Bluesky]
    }

    #[test]
    fn test_add_content_dedup() {
        let mut c = Coordinator::new();
        let now = Utc::now();

        let first = c.add_content("same joke", ContentKind::Joke, all_platforms(), None, 1, now);
        assert!(first.is_some());

        let second = c.add_content("same joke", ContentKind::Joke, all_platforms(), None, 1, now);
        assert!(second.is_none());
    }

    #[test]
    fn test_next_for_platform_respects_schedule() {
        let mut c = Coordinator::new();
        let now = Utc::now();

        // Default schedule is 30 minutes out, so nothing is due yet
        c.add_content("joke", ContentKind::Joke, vec![Platform::Bluesky], None, 1, now)
            .unwrap();
        assert!(c.next_for_platform(Platform::Bluesky, now).is_none());

        // Due once the scheduled time arrives
        let later = now + Duration::minutes(31);
        let item = c.next_for_platform(Platform::Bluesky, later);
        assert!(item.is_some());
        assert_eq!(item.unwrap().text, "joke");
    }

    #[test]
    fn test_next_for_platform_priority_order() {
        let mut c = Coordinator::new();
        let now = Utc::now();
        let due = Some(
            [(Platform::Bluesky, now - Duration::minutes(1))]
                .into_iter()
                .collect(),
        );

        c.add_content("low", ContentKind::Joke, vec![Platform::Bluesky], due.clone(), 1, now)
            .unwrap();
        c.add_content("high", ContentKind::Joke, vec![Platform::Bluesky], due, 3, now)
            .unwrap();

        let item = c.next_for_platform(Platform::Bluesky, now).unwrap();
        assert_eq!(item.text, "high");
    }

    #[test]
    fn test_mark_posted_lifecycle() {
        let mut c = Coordinator::new();
        let now = Utc::now();

        let id = c
            .add_content(
                "joke",
                ContentKind::Joke,
                vec![Platform::Bluesky, Platform::Mastodon],
                None,
                1,
                now,
            )
            .unwrap();

        c.mark_posted(id, Platform::Bluesky, true, now);
        // Still pending until every platform is terminal
        assert_eq!(c.pending_count(), 1);
        assert_eq!(c.posted_count(), 0);

        c.mark_posted(id, Platform::Mastodon, false, now);
        assert_eq!(c.pending_count(), 0);
        assert_eq!(c.posted_count(), 1);
    }

    #[test]
    fn test_cooldown_blocks_selection() {
        let mut c = Coordinator::new();
        let now = Utc::now();
        let due = Some(
            [(Platform::Bluesky, now - Duration::minutes(1))]
                .into_iter()
                .collect(),
        );

        let id = c
            .add_content("first", ContentKind::Joke, vec![Platform::Bluesky], due, 1, now)
            .unwrap();
        c.mark_posted(id, Platform::Bluesky, true, now);

        let due2: HashMap<Platform, DateTime<Utc>> =
            [(Platform::Bluesky, now - Duration::minutes(1))]
                .into_iter()
                .collect();
        c.add_content("second", ContentKind::Joke, vec![Platform::Bluesky], Some(due2), 1, now)
            .unwrap();

        // BlueSky cooldown is 4 minutes
        assert!(c.next_for_platform(Platform::Bluesky, now).is_none());
        let later = now + Duration::minutes(5);
        assert!(c.next_for_platform(Platform::Bluesky, later).is_some());
    }

    #[test]
    fn test_queue_drained_after_posting() {
        let mut c = Coordinator::new();
        let now = Utc::now();

        let id = c
            .add_content("joke", ContentKind::Joke, vec![Platform::Bluesky], None, 1, now)
            .unwrap();

        let stats = c.platform_statistics(Platform::Bluesky, now);
        assert_eq!(stats.queue_length, 1);

        c.mark_posted(id, Platform::Bluesky, true, now);
        let stats = c.platform_statistics(Platform::Bluesky, now);
        assert_eq!(stats.queue_length, 0);
    }

    #[test]
    fn test_statistics_counts() {
        let mut c = Coordinator::new();
        let now = Utc::now();
        let due: HashMap<Platform, DateTime<Utc>> = [(Platform::Mastodon, now)]
            .into_iter()
            .collect();

        let id = c
            .add_content("a", ContentKind::Joke, vec![Platform::Mastodon], Some(due), 1, now)
            .unwrap();
        c.mark_posted(id, Platform::Mastodon, true, now);

        let stats = c.platform_statistics(Platform::Mastodon, now);
        assert_eq!(stats.total_posted, 1);
        assert_eq!(stats.posts_last_hour, 1);
        assert_eq!(stats.posts_last_day, 1);
        assert!(stats.next_available.is_some());
    }

    #[test]
    fn test_cleanup_old_content() {
        let mut c = Coordinator::new();
        let now = Utc::now();

        let id = c
            .add_content("old", ContentKind::Joke, vec![Platform::Bluesky], None, 1, now)
            .unwrap();
        c.mark_posted(id, Platform::Bluesky, true, now);

        // Not old enough yet
        assert_eq!(c.cleanup(7, now), 0);

        // A week later it goes away
        assert_eq!(c.cleanup(7, now + Duration::days(8)), 1);
        assert_eq!(c.posted_count(), 0);
    }

    #[test]
    fn test_schedule_cross_platform_stagger() {
        let mut c = Coordinator::new();
        let now = Utc::now();
        let start = now + Duration::minutes(10);

        let id = c
            .schedule_cross_platform(
                "announcement",
                ContentKind::Custom,
                vec![Platform::Bluesky, Platform::Mastodon, Platform::Twitter],
                5,
                Some(start),
                now,
            )
            .unwrap();

        let item = c.get_pending(id).unwrap();
        assert_eq!(item.priority, 2);
        assert_eq!(item.scheduled_for(Platform::Bluesky).unwrap(), start);
        assert_eq!(
            item.scheduled_for(Platform::Mastodon).unwrap(),
            start + Duration::minutes(5)
        );
        assert_eq!(
            item.scheduled_for(Platform::Twitter).unwrap(),
            start + Duration::minutes(10)
        );
    }

    #[test]
    fn test_state_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();
        let now = Utc::now();

        let id = {
            let mut c = Coordinator::with_store(store.clone());
            c.add_content("persisted joke", ContentKind::Joke, all_platforms(), None, 1, now)
                .unwrap()
        };

        let mut c = Coordinator::with_store(store);
        assert_eq!(c.pending_count(), 1);
        assert!(c.get_pending(id).is_some());

        // Dedup history survives the restart
        let dup = c.add_content("persisted joke", ContentKind::Joke, all_platforms(), None, 1, now);
        assert!(dup.is_none());
    }
}
