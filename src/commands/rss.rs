//! The `rss` command: feed watching and fan-out posting

use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::models::Platform;
use crate::platforms::{build_posters, Poster};
use crate::rss::RssWatcher;
use crate::storage::StateStore;

/// Run the RSS watcher: one cycle with `once`, otherwise poll forever
pub async fn watch(config: Config, once: bool) -> Result<()> {
    config.validate()?;

    let store = StateStore::new(&config.state_dir)?;
    let posters = rss_posters(&config);
    let poll_interval = Duration::from_secs(config.rss.poll_interval_minutes * 60);

    let mut watcher = RssWatcher::new(config.rss.clone(), &config.http, store, posters)?;

    if once {
        let outcome = watcher.run_once(Utc::now()).await?;
        info!(
            eligible = outcome.eligible,
            posted = outcome.posted_guid.as_deref().unwrap_or("none"),
            "RSS cycle complete"
        );
        // A detached stagger task would die with the process in one-shot mode
        if let Some(handle) = outcome.stagger_handle {
            let _ = handle.await;
        }
        return Ok(());
    }

    info!(
        interval_minutes = config.rss.poll_interval_minutes,
        "RSS watcher started"
    );

    loop {
        let outcome = watcher.run_once(Utc::now()).await?;
        if let Some(guid) = &outcome.posted_guid {
            info!(guid = %guid.chars().take(50).collect::<String>(), "Cycle handed off an item");
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, stopping RSS watcher");
                return Ok(());
            }
        }
    }
}

/// Platform adapters enabled for RSS fan-out
///
/// An adapter is used only when both its platform credentials are configured
/// and the RSS config enables that platform.
fn rss_posters(config: &Config) -> Vec<std::sync::Arc<dyn Poster>> {
    let enabled: Vec<Platform> = config.rss.enabled_platforms();
    build_posters(config)
        .into_iter()
        .filter(|poster| enabled.contains(&poster.platform()))
        .collect()
}
