//! Content items and their per-platform lifecycle

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{content_hash, ContentKind, Platform};

/// Per-platform posting status of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Scheduled,
    Posted,
    Failed,
    Skipped,
}

impl PostStatus {
    /// Terminal statuses end the item's life on that platform
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Posted | Self::Failed | Self::Skipped)
    }
}

/// A piece of content tracked across one or more platforms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique item identifier
    pub id: Uuid,

    /// Post text
    pub text: String,

    /// Kind of content
    pub kind: ContentKind,

    /// Platforms this item targets
    pub platforms: Vec<Platform>,

    /// When the item should post on each platform
    pub scheduled_times: HashMap<Platform, DateTime<Utc>>,

    /// Lifecycle status per platform
    pub status: HashMap<Platform, PostStatus>,

    /// Free-form metadata (source pool, batch id, ...)
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// SHA256 of the text, the deduplication key
    pub content_hash: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Selection priority, higher first
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    1
}

impl ContentItem {
    /// Create an item targeting `platforms` with default staggered times:
    /// first platform thirty minutes out, five more minutes per position.
    pub fn new(
        text: impl Into<String>,
        kind: ContentKind,
        platforms: Vec<Platform>,
        now: DateTime<Utc>,
    ) -> Self {
        let text = text.into();
        let hash = content_hash(&text);

        let scheduled_times = platforms
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, now + Duration::minutes(30 + i as i64 * 5)))
            .collect();
        let status = platforms.iter().map(|p| (*p, PostStatus::Pending)).collect();

        Self {
            id: Uuid::new_v4(),
            text,
            kind,
            platforms,
            scheduled_times,
            status,
            metadata: HashMap::new(),
            content_hash: hash,
            created_at: now,
            priority: 1,
        }
    }

    /// Replace the scheduled times
    pub fn with_scheduled_times(mut self, times: HashMap<Platform, DateTime<Utc>>) -> Self {
        self.scheduled_times = times;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Status on a platform (Skipped when the platform is not targeted)
    pub fn status_for(&self, platform: Platform) -> PostStatus {
        self.status
            .get(&platform)
            .copied()
            .unwrap_or(PostStatus::Skipped)
    }

    /// Scheduled time on a platform
    pub fn scheduled_for(&self, platform: Platform) -> Option<DateTime<Utc>> {
        self.scheduled_times.get(&platform).copied()
    }

    /// Whether the scheduled time for a platform has arrived
    pub fn is_due_on(&self, platform: Platform, now: DateTime<Utc>) -> bool {
        match self.scheduled_for(platform) {
            Some(t) => t <= now,
            None => true,
        }
    }

    /// Whether every targeted platform has reached a terminal status
    pub fn is_complete(&self) -> bool {
        self.platforms
            .iter()
            .all(|p| self.status_for(*p).is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_defaults() {
        let now = Utc::now();
        let item = ContentItem::new(
            "a joke",
            ContentKind::Joke,
            vec![Platform::Bluesky, Platform::Mastodon],
            now,
        );

        assert_eq!(item.status_for(Platform::Bluesky), PostStatus::Pending);
        assert_eq!(item.status_for(Platform::Mastodon), PostStatus::Pending);
        assert_eq!(item.content_hash, content_hash("a joke"));
        assert_eq!(item.priority, 1);

        // Default stagger: 30 minutes, then +5 per platform position
        let bsky = item.scheduled_for(Platform::Bluesky).unwrap();
        let masto = item.scheduled_for(Platform::Mastodon).unwrap();
        assert_eq!(bsky, now + Duration::minutes(30));
        assert_eq!(masto, now + Duration::minutes(35));
    }

    #[test]
    fn test_untargeted_platform_is_skipped() {
        let item = ContentItem::new("x", ContentKind::Custom, vec![Platform::Bluesky], Utc::now());
        assert_eq!(item.status_for(Platform::Twitter), PostStatus::Skipped);
    }

    #[test]
    fn test_is_complete() {
        let now = Utc::now();
        let mut item = ContentItem::new(
            "x",
            ContentKind::Custom,
            vec![Platform::Bluesky, Platform::Mastodon],
            now,
        );
        assert!(!item.is_complete());

        item.status.insert(Platform::Bluesky, PostStatus::Posted);
        assert!(!item.is_complete());

        item.status.insert(Platform::Mastodon, PostStatus::Failed);
        assert!(item.is_complete());
    }

    #[test]
    fn test_is_due_on() {
        let now = Utc::now();
        let mut item = ContentItem::new("x", ContentKind::Custom, vec![Platform::Bluesky], now);

        // Default schedule is 30 minutes out
        assert!(!item.is_due_on(Platform::Bluesky, now));
        assert!(item.is_due_on(Platform::Bluesky, now + Duration::minutes(31)));

        // No scheduled time means immediately due
        item.scheduled_times.clear();
        assert!(item.is_due_on(Platform::Bluesky, now));
    }

    #[test]
    fn test_serde_roundtrip() {
        let item = ContentItem::new("x", ContentKind::Joke, vec![Platform::Bluesky], Utc::now())
            .with_priority(2)
            .with_metadata("source", "jokes");

        let json = serde_json::to_string(&item).unwrap();
        let parsed: ContentItem = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, item.id);
        assert_eq!(parsed.priority, 2);
        assert_eq!(parsed.content_hash, item.content_hash);
    }
}
