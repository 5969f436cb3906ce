// Core data structures shared across the crier modules

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Compute the SHA256 hex digest of a piece of post text
///
/// Content hashes are the deduplication key used by the coordinator and the
/// rotator's freshness tracking.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Target social platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Mastodon,
    Bluesky,
}

impl Platform {
    /// Get all supported platforms
    pub fn all() -> Vec<Self> {
        vec![Self::Twitter, Self::Mastodon, Self::Bluesky]
    }

    /// Get platform ID as string
    pub fn id(&self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Mastodon => "mastodon",
            Self::Bluesky => "bluesky",
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Twitter => "Twitter",
            Self::Mastodon => "Mastodon",
            Self::Bluesky => "BlueSky",
        }
    }

    /// Maximum post length in characters
    pub fn max_post_chars(&self) -> usize {
        match self {
            Self::Twitter => 280,
            Self::Mastodon => 500,
            Self::Bluesky => 300,
        }
    }

    /// Minutes to wait after a post before the next one on this platform
    pub fn cooldown_minutes(&self) -> i64 {
        match self {
            Self::Twitter => 5,
            Self::Mastodon => 3,
            Self::Bluesky => 4,
        }
    }

    /// Try to parse from string
    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "twitter" | "x" => Some(Self::Twitter),
            "mastodon" => Some(Self::Mastodon),
            "bluesky" | "bsky" => Some(Self::Bluesky),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| format!("unknown platform: {s}"))
    }
}

/// Kind of content being posted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Joke,
    Advertisement,
    Comic,
    Interaction,
    Custom,
}

impl ContentKind {
    /// Get kind ID as string
    pub fn id(&self) -> &'static str {
        match self {
            Self::Joke => "joke",
            Self::Advertisement => "advertisement",
            Self::Comic => "comic",
            Self::Interaction => "interaction",
            Self::Custom => "custom",
        }
    }

    /// Try to parse from string
    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "joke" => Some(Self::Joke),
            "advertisement" | "ad" => Some(Self::Advertisement),
            "comic" => Some(Self::Comic),
            "interaction" | "reply" => Some(Self::Interaction),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl Default for ContentKind {
    fn default() -> Self {
        Self::Custom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_stable() {
        let a = content_hash("why did the chicken cross the road");
        let b = content_hash("why did the chicken cross the road");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let c = content_hash("a different joke");
        assert_ne!(a, c);
    }

    #[test]
    fn test_platform_from_id() {
        assert_eq!(Platform::from_id("twitter"), Some(Platform::Twitter));
        assert_eq!(Platform::from_id("BSKY"), Some(Platform::Bluesky));
        assert_eq!(Platform::from_id("myspace"), None);
    }

    #[test]
    fn test_platform_all() {
        let platforms = Platform::all();
        assert_eq!(platforms.len(), 3);
        assert!(platforms.contains(&Platform::Mastodon));
    }

    #[test]
    fn test_platform_limits() {
        assert_eq!(Platform::Twitter.max_post_chars(), 280);
        assert_eq!(Platform::Mastodon.max_post_chars(), 500);
        assert_eq!(Platform::Bluesky.max_post_chars(), 300);
    }

    #[test]
    fn test_platform_serde_roundtrip() {
        let json = serde_json::to_string(&Platform::Bluesky).unwrap();
        assert_eq!(json, "\"bluesky\"");
        let parsed: Platform = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Platform::Bluesky);
    }

    #[test]
    fn test_content_kind_parse() {
        assert_eq!(ContentKind::from_id("joke"), Some(ContentKind::Joke));
        assert_eq!(ContentKind::from_id("ad"), Some(ContentKind::Advertisement));
        assert_eq!(ContentKind::from_id("unknown"), None);
    }
}
