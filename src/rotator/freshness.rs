//! Per-platform content freshness tracking
//!
//! Records when a content hash was last posted on each platform, persisted
//! to `content_freshness.json`. A hash is fresh for a platform once its last
//! use there is outside the platform's freshness window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info};

use crate::models::Platform;
use crate::storage::StateStore;

/// File name of the persisted freshness map
const FRESHNESS_FILE: &str = "content_freshness.json";

/// Persisted form: hash -> platform id -> last use
type FreshnessMap = HashMap<String, HashMap<String, DateTime<Utc>>>;

/// On-disk wrapper for the freshness map
#[derive(Debug, Default, Serialize, Deserialize)]
struct FreshnessState {
    #[serde(flatten)]
    entries: FreshnessMap,
}

/// Tracks when content was last used per platform
#[derive(Debug, Default)]
pub struct FreshnessTracker {
    entries: FreshnessMap,
    store: Option<StateStore>,
}

impl FreshnessTracker {
    /// Create an in-memory tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker backed by a state store, restoring prior stamps
    pub fn with_store(store: StateStore) -> Self {
        let state: FreshnessState = store.load_or_default(FRESHNESS_FILE);
        Self {
            entries: state.entries,
            store: Some(store),
        }
    }

    /// When a hash was last used on a platform
    pub fn last_used(&self, hash: &str, platform: Platform) -> Option<DateTime<Utc>> {
        self.entries
            .get(hash)?
            .get(platform.id())
            .copied()
    }

    /// Whether a hash is outside the freshness window for a platform
    pub fn is_fresh(
        &self,
        hash: &str,
        platform: Platform,
        window_hours: i64,
        now: DateTime<Utc>,
    ) -> bool {
        match self.last_used(hash, platform) {
            Some(last) => last <= now - Duration::hours(window_hours),
            None => true,
        }
    }

    /// Number of platforms a hash has been used on
    pub fn usage_count(&self, hash: &str) -> usize {
        self.entries.get(hash).map(|p| p.len()).unwrap_or(0)
    }

    /// Number of tracked hashes
    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }

    /// Per-platform usage totals
    pub fn platform_usage(&self) -> HashMap<String, usize> {
        let mut usage: HashMap<String, usize> = HashMap::new();
        for platforms in self.entries.values() {
            for platform in platforms.keys() {
                *usage.entry(platform.clone()).or_insert(0) += 1;
            }
        }
        usage
    }

    /// Stamp a hash as used on a platform now, persisting the map
    pub fn record(&mut self, hash: &str, platform: Platform, now: DateTime<Utc>) {
        self.entries
            .entry(hash.to_string())
            .or_default()
            .insert(platform.id().to_string(), now);
        self.save();
    }

    /// Forget stamps older than the horizon, optionally for one platform only
    ///
    /// Returns the number of stamps removed. Hashes with no remaining stamps
    /// are pruned.
    pub fn reset(
        &mut self,
        platform: Option<Platform>,
        older_than_hours: i64,
        now: DateTime<Utc>,
    ) -> usize {
        let cutoff = now - Duration::hours(older_than_hours);
        let mut removed = 0;

        self.entries.retain(|_, platforms| {
            platforms.retain(|platform_id, stamped| {
                let matches_platform = platform
                    .map(|p| p.id() == platform_id)
                    .unwrap_or(true);
                let keep = !(matches_platform && *stamped < cutoff);
                if !keep {
                    removed += 1;
                }
                keep
            });
            !platforms.is_empty()
        });

        if removed > 0 {
            self.save();
            info!(
                removed,
                platform = platform.map(|p| p.id()).unwrap_or("all"),
                "Reset content freshness"
            );
        }

        removed
    }

    fn save(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let state = FreshnessState {
            entries: self.entries.clone(),
        };
        if let Err(e) = store.save(FRESHNESS_FILE, &state) {
            error!(error = %e, "Failed to save freshness data");
        }
    }
}
