//! RSS watcher state files
//!
//! Three small JSON files, each rewritten after the mutation that touches
//! it:
//!
//! - `rss_state.json` — per-feed last-seen guid and the last check time
//! - `posted_items.json` — every guid ever posted (dedup safety net)
//! - `last_posted_pubdate.json` — high-water publish date of posted items
//!
//! Missing or corrupt files fall back to empty state; the watcher then
//! treats every feed as a first run, which is safe because first runs only
//! mark items seen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::storage::StateStore;

const STATE_FILE: &str = "rss_state.json";
const POSTED_FILE: &str = "posted_items.json";
const PUBDATE_FILE: &str = "last_posted_pubdate.json";

/// Per-feed cursor state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FeedState {
    /// Feed URL -> guid of the newest item seen
    #[serde(default)]
    feeds: HashMap<String, String>,

    /// When the watcher last completed a cycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_checked: Option<DateTime<Utc>>,
}

/// High-water publish date record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PubdateState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_posted_pubdate: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// Combined watcher state with JSON persistence
#[derive(Debug)]
pub struct WatcherState {
    feed_state: FeedState,
    posted: HashSet<String>,
    pubdate: PubdateState,
    store: StateStore,
}

impl WatcherState {
    /// Load watcher state from the store
    pub fn load(store: StateStore) -> Self {
        let feed_state: FeedState = store.load_or_default(STATE_FILE);
        let posted: Vec<String> = store.load_or_default(POSTED_FILE);
        let pubdate: PubdateState = store.load_or_default(PUBDATE_FILE);

        Self {
            feed_state,
            posted: posted.into_iter().collect(),
            pubdate,
            store,
        }
    }

    /// Last-seen guid for a feed, `None` on a feed's first run
    pub fn last_seen(&self, feed_url: &str) -> Option<&str> {
        self.feed_state.feeds.get(feed_url).map(String::as_str)
    }

    /// Record the newest guid seen for a feed
    pub fn mark_seen(&mut self, feed_url: &str, guid: &str) {
        self.feed_state
            .feeds
            .insert(feed_url.to_string(), guid.to_string());
        self.save_feed_state();
    }

    /// Whether a guid was already posted
    pub fn is_posted(&self, guid: &str) -> bool {
        self.posted.contains(guid)
    }

    /// Record a guid as posted
    pub fn mark_posted(&mut self, guid: &str) {
        self.posted.insert(guid.to_string());
        self.save_posted();
    }

    /// High-water publish date of posted items
    pub fn last_pubdate(&self) -> Option<DateTime<Utc>> {
        self.pubdate.last_posted_pubdate
    }

    /// Raise the high-water publish date
    pub fn set_last_pubdate(&mut self, pubdate: DateTime<Utc>) {
        self.pubdate.last_posted_pubdate = Some(pubdate);
        self.pubdate.updated_at = Some(Utc::now());
        self.save_pubdate();
    }

    /// When the watcher last completed a cycle
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.feed_state.last_checked
    }

    /// Stamp the cycle completion time
    pub fn touch_checked(&mut self, now: DateTime<Utc>) {
        self.feed_state.last_checked = Some(now);
        self.save_feed_state();
    }

    /// Number of guids in the posted set
    pub fn posted_count(&self) -> usize {
        self.posted.len()
    }

    /// Number of feeds with a cursor
    pub fn tracked_feed_count(&self) -> usize {
        self.feed_state.feeds.len()
    }

    fn save_feed_state(&self) {
        if let Err(e) = self.store.save(STATE_FILE, &self.feed_state) {
            tracing::error!(error = %e, "Failed to save RSS feed state");
        }
    }

    fn save_posted(&self) {
        let list: Vec<&String> = self.posted.iter().collect();
        if let Err(e) = self.store.save(POSTED_FILE, &list) {
            tracing::error!(error = %e, "Failed to save posted items");
        }
    }

    fn save_pubdate(&self) {
        if let Err(e) = self.store.save(PUBDATE_FILE, &self.pubdate) {
            tracing::error!(error = %e, "Failed to save last posted pubdate");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_in(dir: &std::path::Path) -> WatcherState {
        WatcherState::load(StateStore::new(dir).unwrap())
    }

    #[test]
    fn test_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        assert!(state.last_seen("https://example.org/feed").is_none());
        assert!(!state.is_posted("some-guid"));
        assert!(state.last_pubdate().is_none());
        assert_eq!(state.posted_count(), 0);
    }

    #[test]
    fn test_state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();

        {
            let mut state = state_in(dir.path());
            state.mark_seen("https://example.org/feed", "guid-9");
            state.mark_posted("guid-9");
            state.set_last_pubdate(now);
            state.touch_checked(now);
        }

        let state = state_in(dir.path());
        assert_eq!(state.last_seen("https://example.org/feed"), Some("guid-9"));
        assert!(state.is_posted("guid-9"));
        assert_eq!(state.last_pubdate().unwrap(), now);
        assert!(state.last_checked().is_some());
    }

    #[test]
    fn test_corrupt_files_fall_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STATE_FILE), "{broken").unwrap();
        std::fs::write(dir.path().join(POSTED_FILE), "also broken").unwrap();

        let state = state_in(dir.path());
        assert_eq!(state.tracked_feed_count(), 0);
        assert_eq!(state.posted_count(), 0);
    }

    #[test]
    fn test_feeds_tracked_independently() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(dir.path());

        state.mark_seen("https://a.example/feed", "a-1");
        state.mark_seen("https://b.example/feed", "b-7");

        assert_eq!(state.last_seen("https://a.example/feed"), Some("a-1"));
        assert_eq!(state.last_seen("https://b.example/feed"), Some("b-7"));
        assert_eq!(state.tracked_feed_count(), 2);
    }
}
