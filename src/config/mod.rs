//! Configuration management for the crier daemon
//!
//! This module handles loading and validating configuration from environment
//! variables, TOML files, and command-line arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::Platform;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-platform settings and credentials
    pub platforms: PlatformsConfig,

    /// Cron schedules for the task scheduler
    pub scheduling: SchedulingConfig,

    /// RSS watcher configuration
    pub rss: RssConfig,

    /// Content rotation configuration
    pub rotation: RotationConfig,

    /// HTTP client configuration
    pub http: HttpConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Directory for JSON state files and the lock file
    pub state_dir: PathBuf,
}

/// Settings for a single platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Whether posting to this platform is enabled
    pub enabled: bool,

    /// API base URL (overridable for tests)
    pub base_url: String,

    /// Access token / app password
    pub access_token: String,

    /// Account identifier (BlueSky handle, unused elsewhere)
    pub identifier: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            access_token: String::new(),
            identifier: String::new(),
        }
    }
}

/// Per-platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    pub twitter: PlatformConfig,
    pub mastodon: PlatformConfig,
    pub bluesky: PlatformConfig,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            twitter: PlatformConfig {
                base_url: String::from("https://api.twitter.com"),
                ..Default::default()
            },
            mastodon: PlatformConfig {
                base_url: String::from("https://mastodon.social"),
                ..Default::default()
            },
            bluesky: PlatformConfig {
                base_url: String::from("https://bsky.social"),
                ..Default::default()
            },
        }
    }
}

impl PlatformsConfig {
    /// Get config for a platform
    pub fn get(&self, platform: Platform) -> &PlatformConfig {
        match platform {
            Platform::Twitter => &self.twitter,
            Platform::Mastodon => &self.mastodon,
            Platform::Bluesky => &self.bluesky,
        }
    }

    /// Platforms with posting enabled
    pub fn enabled(&self) -> Vec<Platform> {
        Platform::all()
            .into_iter()
            .filter(|p| self.get(*p).enabled)
            .collect()
    }
}

/// Cron schedules driving the task scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Posting cron per platform id (five-field cron expressions)
    pub posting_frequency: HashMap<String, String>,

    /// Daily maintenance cron
    pub maintenance_frequency: String,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        let mut posting_frequency = HashMap::new();
        posting_frequency.insert(String::from("twitter"), String::from("0 */6 * * *"));
        posting_frequency.insert(String::from("mastodon"), String::from("0 */4 * * *"));
        posting_frequency.insert(String::from("bluesky"), String::from("0 */4 * * *"));

        Self {
            posting_frequency,
            maintenance_frequency: String::from("0 2 * * *"),
        }
    }
}

impl SchedulingConfig {
    /// Posting cron for a platform, if configured
    pub fn posting_cron(&self, platform: Platform) -> Option<&str> {
        self.posting_frequency.get(platform.id()).map(|s| s.as_str())
    }
}

/// Staggered cross-platform posting settings for the RSS watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaggerConfig {
    /// Whether staggered background posting is enabled
    pub enabled: bool,

    /// Inclusive bounds for the random delay between platforms, in minutes
    pub delay_between_platforms_minutes: (u64, u64),

    /// Shuffle platform order per item
    pub randomize_platform_order: bool,
}

impl Default for StaggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_between_platforms_minutes: (40, 80),
            randomize_platform_order: true,
        }
    }
}

/// RSS watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RssConfig {
    /// Feed URLs to poll
    pub feeds: Vec<String>,

    /// Minutes between poll cycles in watch mode
    pub poll_interval_minutes: u64,

    /// Inclusive bounds for the random delay between immediate-mode posts, in seconds
    pub post_delay_seconds: (u64, u64),

    /// Post the newest item on a feed's first run instead of only marking it seen
    pub post_on_first_run: bool,

    /// Twitter posting for RSS items (off by default per limited API access)
    pub enable_twitter: bool,

    /// Mastodon posting for RSS items
    pub enable_mastodon: bool,

    /// BlueSky posting for RSS items (main platform)
    pub enable_bluesky: bool,

    /// Staggered posting configuration
    pub staggered: StaggerConfig,

    /// Test mode shortens the stagger delays to 5-15 minutes
    pub test_mode: bool,

    /// Maximum teaser length before the link is appended
    pub teaser_max_chars: usize,
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            poll_interval_minutes: 20,
            post_delay_seconds: (5, 10),
            post_on_first_run: false,
            enable_twitter: false,
            enable_mastodon: true,
            enable_bluesky: true,
            staggered: StaggerConfig::default(),
            test_mode: false,
            teaser_max_chars: 260,
        }
    }
}

impl RssConfig {
    /// Stagger delay bounds in minutes, honoring test mode
    pub fn stagger_delay_minutes(&self) -> (u64, u64) {
        if self.test_mode {
            (5, 15)
        } else {
            self.staggered.delay_between_platforms_minutes
        }
    }

    /// Platforms enabled for RSS fan-out
    pub fn enabled_platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        if self.enable_bluesky {
            platforms.push(Platform::Bluesky);
        }
        if self.enable_mastodon {
            platforms.push(Platform::Mastodon);
        }
        if self.enable_twitter {
            platforms.push(Platform::Twitter);
        }
        platforms
    }
}

/// Content rotation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// JSON file with joke items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jokes_file: Option<PathBuf>,

    /// JSON file with canned reply items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies_file: Option<PathBuf>,

    /// JSON file with advertisement items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertisements_file: Option<PathBuf>,

    /// Directory of per-comic JSON descriptors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comics_dir: Option<PathBuf>,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Rate limit (requests per second) for feed polling
    pub requests_per_second: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2,
            request_timeout_secs: 30,
            user_agent: format!("crier/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Credentials always come from the environment so they stay out of the
    /// config file.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse::<u32>("CRIER_REQUESTS_PER_SECOND") {
            config.http.requests_per_second = v;
        }
        if let Some(v) = env_parse::<u64>("CRIER_REQUEST_TIMEOUT") {
            config.http.request_timeout_secs = v;
        }
        if let Ok(v) = std::env::var("CRIER_USER_AGENT") {
            config.http.user_agent = v;
        }
        if let Ok(v) = std::env::var("CRIER_STATE_DIR") {
            config.state_dir = v.into();
        }
        if let Ok(v) = std::env::var("CRIER_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("CRIER_LOG_FORMAT") {
            config.logging.format = v;
        }
        if let Ok(v) = std::env::var("CRIER_FEEDS") {
            config.rss.feeds = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        config.apply_credential_env();

        Ok(config)
    }

    /// Load configuration from a file, then overlay credential env vars
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        config.apply_credential_env();

        Ok(config)
    }

    /// Overlay credentials from the environment
    fn apply_credential_env(&mut self) {
        if let Ok(v) = std::env::var("TWITTER_BEARER_TOKEN") {
            self.platforms.twitter.access_token = v;
        }
        if let Ok(v) = std::env::var("MASTODON_ACCESS_TOKEN") {
            self.platforms.mastodon.access_token = v;
        }
        if let Ok(v) = std::env::var("BLUESKY_APP_PASSWORD") {
            self.platforms.bluesky.access_token = v;
        }
        if let Ok(v) = std::env::var("BLUESKY_HANDLE") {
            self.platforms.bluesky.identifier = v;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.http.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if self.rss.poll_interval_minutes == 0 {
            anyhow::bail!("poll_interval_minutes must be greater than 0");
        }

        let (lo, hi) = self.rss.staggered.delay_between_platforms_minutes;
        if lo > hi {
            anyhow::bail!("stagger delay bounds must be ordered low..high");
        }

        let (lo, hi) = self.rss.post_delay_seconds;
        if lo > hi {
            anyhow::bail!("post delay bounds must be ordered low..high");
        }

        for feed in &self.rss.feeds {
            url::Url::parse(feed).with_context(|| format!("Invalid feed URL: {feed}"))?;
        }

        for platform in self.platforms.enabled() {
            let pc = self.platforms.get(platform);
            if pc.base_url.is_empty() {
                anyhow::bail!("{platform} is enabled but has no base_url");
            }
            if pc.access_token.is_empty() {
                anyhow::bail!("{platform} is enabled but has no access token");
            }
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            platforms: PlatformsConfig::default(),
            scheduling: SchedulingConfig::default(),
            rss: RssConfig::default(),
            rotation: RotationConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            state_dir: PathBuf::from("state"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_requests_per_second() {
        let mut config = Config::default();
        config.http.requests_per_second = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enabled_platform_needs_token() {
        let mut config = Config::default();
        config.platforms.mastodon.enabled = true;
        config.platforms.mastodon.access_token.clear();
        assert!(config.validate().is_err());

        config.platforms.mastodon.access_token = String::from("token");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stagger_bounds_ordering() {
        let mut config = Config::default();
        config.rss.staggered.delay_between_platforms_minutes = (80, 40);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_feed_url_rejected() {
        let mut config = Config::default();
        config.rss.feeds = vec![String::from("not a url")];
        assert!(config.validate().is_err());

        config.rss.feeds = vec![String::from("https://example.org/feed.xml")];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_test_mode_shortens_delays() {
        let mut rss = RssConfig::default();
        assert_eq!(rss.stagger_delay_minutes(), (40, 80));

        rss.test_mode = true;
        assert_eq!(rss.stagger_delay_minutes(), (5, 15));
    }

    #[test]
    fn test_rss_enabled_platforms_default() {
        let rss = RssConfig::default();
        let platforms = rss.enabled_platforms();

        // Twitter is off by default for RSS fan-out
        assert!(!platforms.contains(&Platform::Twitter));
        assert!(platforms.contains(&Platform::Bluesky));
        assert!(platforms.contains(&Platform::Mastodon));
    }

    #[test]
    fn test_request_timeout_conversion() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            parsed.rss.poll_interval_minutes,
            config.rss.poll_interval_minutes
        );
    }
}
