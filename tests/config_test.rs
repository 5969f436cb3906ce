//! Configuration loading and validation tests

use crier::config::Config;
use crier::models::Platform;
use serial_test::serial;

const SAMPLE_CONFIG: &str = r#"
state_dir = "/tmp/crier-test-state"

[platforms.mastodon]
enabled = true
base_url = "https://fosstodon.org"
access_token = "file-token"

[platforms.bluesky]
enabled = false

[scheduling]
maintenance_frequency = "0 3 * * *"

[scheduling.posting_frequency]
mastodon = "30 */2 * * *"

[rss]
feeds = ["https://example.org/feed.xml"]
poll_interval_minutes = 10
post_on_first_run = true
test_mode = true

[rss.staggered]
enabled = true
delay_between_platforms_minutes = [20, 40]
randomize_platform_order = false

[http]
requests_per_second = 5

[logging]
level = "debug"
format = "json"
"#;

#[test]
#[serial]
fn test_from_file_parses_all_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crier.toml");
    std::fs::write(&path, SAMPLE_CONFIG).unwrap();

    let config = Config::from_file(&path).unwrap();

    assert!(config.platforms.mastodon.enabled);
    assert_eq!(config.platforms.mastodon.base_url, "https://fosstodon.org");
    assert!(!config.platforms.bluesky.enabled);

    assert_eq!(
        config.scheduling.posting_cron(Platform::Mastodon),
        Some("30 */2 * * *")
    );
    assert_eq!(config.scheduling.maintenance_frequency, "0 3 * * *");

    assert_eq!(config.rss.feeds.len(), 1);
    assert_eq!(config.rss.poll_interval_minutes, 10);
    assert!(config.rss.post_on_first_run);
    // Test mode overrides the configured stagger bounds
    assert_eq!(config.rss.stagger_delay_minutes(), (5, 15));

    assert_eq!(config.http.requests_per_second, 5);
    assert_eq!(config.logging.format, "json");

    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_credential_env_overlays_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crier.toml");
    std::fs::write(&path, SAMPLE_CONFIG).unwrap();

    std::env::set_var("MASTODON_ACCESS_TOKEN", "env-token");
    let config = Config::from_file(&path).unwrap();
    std::env::remove_var("MASTODON_ACCESS_TOKEN");

    assert_eq!(config.platforms.mastodon.access_token, "env-token");
}

#[test]
#[serial]
fn test_from_env_feeds_list() {
    std::env::set_var(
        "CRIER_FEEDS",
        "https://a.example/feed.xml, https://b.example/feed.xml",
    );
    let config = Config::from_env().unwrap();
    std::env::remove_var("CRIER_FEEDS");

    assert_eq!(
        config.rss.feeds,
        vec![
            "https://a.example/feed.xml".to_string(),
            "https://b.example/feed.xml".to_string(),
        ]
    );
}

#[test]
#[serial]
fn test_partial_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crier.toml");
    std::fs::write(&path, "[rss]\npoll_interval_minutes = 7\n").unwrap();

    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.rss.poll_interval_minutes, 7);
    // Everything else falls back to defaults
    assert_eq!(config.http.requests_per_second, 2);
    assert!(!config.rss.enable_twitter);
    assert!(config.rss.enable_bluesky);
    assert!(config.scheduling.posting_cron(Platform::Bluesky).is_some());
}

#[test]
#[serial]
fn test_invalid_toml_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crier.toml");
    std::fs::write(&path, "not valid [toml").unwrap();

    assert!(Config::from_file(&path).is_err());
}

#[test]
#[serial]
fn test_enabled_platform_without_credentials_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crier.toml");
    std::fs::write(
        &path,
        "[platforms.bluesky]\nenabled = true\nbase_url = \"https://bsky.social\"\n",
    )
    .unwrap();

    // No token in file or environment
    std::env::remove_var("BLUESKY_APP_PASSWORD");
    let config = Config::from_file(&path).unwrap();
    assert!(config.validate().is_err());
}
