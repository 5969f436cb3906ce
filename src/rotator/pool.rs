//! Content pools and their backing files
//!
//! Pools are JSON-backed collections of loosely structured items. Each pool
//! keeps a bounded ring of recently used content hashes so the same item is
//! not picked twice in quick succession regardless of platform.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use tracing::warn;

use crate::models::ContentKind;

/// Where a pool's items come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolSource {
    Jokes,
    Replies,
    Advertisements,
    Comics,
}

impl PoolSource {
    /// All pool sources, in preference-fallback order
    pub fn all() -> Vec<Self> {
        vec![Self::Jokes, Self::Replies, Self::Advertisements, Self::Comics]
    }

    /// Source ID as string
    pub fn id(&self) -> &'static str {
        match self {
            Self::Jokes => "jokes",
            Self::Replies => "replies",
            Self::Advertisements => "advertisements",
            Self::Comics => "comics",
        }
    }

    /// Capacity of the recently-used ring
    pub fn recent_capacity(&self) -> usize {
        match self {
            Self::Jokes => 200,
            Self::Replies => 100,
            Self::Advertisements => 50,
            Self::Comics => 30,
        }
    }

    /// Kind of content this pool produces
    pub fn content_kind(&self) -> ContentKind {
        match self {
            Self::Jokes => ContentKind::Joke,
            Self::Replies => ContentKind::Interaction,
            Self::Advertisements => ContentKind::Advertisement,
            Self::Comics => ContentKind::Comic,
        }
    }

    /// Pool that produces a given kind of content
    pub fn for_kind(kind: ContentKind) -> Option<Self> {
        match kind {
            ContentKind::Joke => Some(Self::Jokes),
            ContentKind::Interaction => Some(Self::Replies),
            ContentKind::Advertisement => Some(Self::Advertisements),
            ContentKind::Comic => Some(Self::Comics),
            ContentKind::Custom => None,
        }
    }
}

impl fmt::Display for PoolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// A pool of selectable content items
#[derive(Debug)]
pub struct ContentPool {
    /// Where the items come from
    pub source: PoolSource,

    /// Raw items as loaded from disk
    pub items: Vec<Value>,

    /// Content hashes picked recently, bounded per source
    recent: VecDeque<String>,

    /// When the pool was last (re)loaded
    pub last_refreshed: DateTime<Utc>,
}

impl ContentPool {
    /// Create a pool from loaded items
    pub fn new(source: PoolSource, items: Vec<Value>) -> Self {
        Self {
            source,
            items,
            recent: VecDeque::with_capacity(source.recent_capacity()),
            last_refreshed: Utc::now(),
        }
    }

    /// Whether a content hash was picked recently from this pool
    pub fn recently_used(&self, hash: &str) -> bool {
        self.recent.iter().any(|h| h == hash)
    }

    /// Record a pick, evicting the oldest entry past capacity
    pub fn mark_recent(&mut self, hash: String) {
        self.recent.push_back(hash);
        while self.recent.len() > self.source.recent_capacity() {
            self.recent.pop_front();
        }
    }

    /// Number of recently-used entries
    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    /// Replace the items after a refresh
    pub fn replace_items(&mut self, items: Vec<Value>) {
        self.items = items;
        self.last_refreshed = Utc::now();
    }
}

/// Extract post text from a loosely structured pool item
///
/// Tries the common field names first, then falls back to the first string
/// value of meaningful length.
pub fn extract_text(item: &Value) -> Option<String> {
    const TEXT_FIELDS: &[&str] = &["content", "text", "joke", "message", "description"];

    if let Value::String(s) = item {
        return Some(s.trim().to_string()).filter(|s| !s.is_empty());
    }

    let obj = item.as_object()?;
    for field in TEXT_FIELDS {
        if let Some(Value::String(s)) = obj.get(*field) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }

    obj.values()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| s.len() > 10)
        .map(str::to_string)
}

/// Selection priority of a pool item (default 1.0)
pub fn item_priority(item: &Value) -> f64 {
    item.get("priority")
        .and_then(Value::as_f64)
        .filter(|p| *p > 0.0)
        .unwrap_or(1.0)
}

/// Load pool items from a JSON file
///
/// Accepts either a top-level array or an object whose first array field
/// holds the items (the advertisements file nests them under a key).
pub fn load_items_file(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pool file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse pool file: {}", path.display()))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(obj) => obj
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .context("Pool file object contains no array field"),
        _ => anyhow::bail!("Pool file must be an array or an object"),
    }
}

/// Load comic descriptors from a directory of per-comic JSON files
pub fn load_comics_dir(dir: &Path) -> Result<Vec<Value>> {
    let mut comics = Vec::new();

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read comics directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        match std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|c| serde_json::from_str(&c).map_err(anyhow::Error::from))
        {
            Ok(comic) => comics.push(comic),
            Err(e) => warn!(file = %path.display(), error = %e, "Skipping unreadable comic file"),
        }
    }

    Ok(comics)
}

/// Built-in advertisements used when no file is configured
pub fn default_advertisements() -> Vec<Value> {
    serde_json::json!([
        {
            "content": "Check out our latest comedy content! 🎭 #Comedy #Humor",
            "priority": 2,
            "platforms": ["twitter", "mastodon", "bluesky"]
        },
        {
            "content": "Daily dose of humor coming your way! Follow for more laughs 😄",
            "priority": 1,
            "platforms": ["twitter", "bluesky"]
        }
    ])
    .as_array()
    .cloned()
    .unwrap_or_default()
}
