//! CLI command implementations
//!
//! Each subcommand builds what it needs from the shared [`AppContext`]:
//! the coordinator, the rotator, and the platform adapters, all backed by
//! JSON state files under the configured state directory.

pub mod post;
pub mod rss;
pub mod run;
pub mod status;
pub mod tasks;

use anyhow::{Context as _, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::models::Platform;
use crate::platforms::{build_posters, Poster};
use crate::rotator::ContentRotator;
use crate::storage::StateStore;

/// Shared state for command implementations
pub struct AppContext {
    pub config: Config,
    pub store: StateStore,
    pub coordinator: Arc<Mutex<Coordinator>>,
    pub rotator: Arc<Mutex<ContentRotator>>,
    pub posters: Vec<Arc<dyn Poster>>,
}

impl AppContext {
    /// Build the context from a validated config
    pub fn build(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let store = StateStore::new(&config.state_dir)?;
        let coordinator = Arc::new(Mutex::new(Coordinator::with_store(store.clone())));
        let rotator = Arc::new(Mutex::new(ContentRotator::new(
            config.rotation.clone(),
            Some(store.clone()),
        )));
        let posters = build_posters(&config);

        Ok(Self {
            config,
            store,
            coordinator,
            rotator,
            posters,
        })
    }

    /// Adapter for a platform, if one was built
    pub fn poster_for(&self, platform: Platform) -> Option<Arc<dyn Poster>> {
        self.posters
            .iter()
            .find(|p| p.platform() == platform)
            .cloned()
    }
}

/// One posting cycle for a platform: take the next due coordinated item
/// (refilling from the rotator when the queue is dry) and publish it.
///
/// Returns `Ok(true)` when something was posted.
pub async fn post_cycle(ctx: &AppContext, platform: Platform) -> Result<bool> {
    let Some(poster) = ctx.poster_for(platform) else {
        anyhow::bail!("no adapter available for {platform}");
    };

    let now = Utc::now();
    let mut coordinator = ctx.coordinator.lock().await;

    let mut item = coordinator.next_for_platform(platform, now);
    if item.is_none() {
        // Queue is dry: rotate one fresh piece of content in, due immediately
        let mut rotator = ctx.rotator.lock().await;
        let scheduled =
            rotator.schedule_automated(&mut coordinator, platform, 1, Some(now), 4, now);
        if scheduled.is_empty() {
            info!(platform = %platform, "Nothing to post");
            return Ok(false);
        }
        item = coordinator.next_for_platform(platform, now);
    }

    let Some(item) = item else {
        // Content exists but the platform is paced out (cooldown or limits)
        info!(platform = %platform, "Platform not ready to post");
        return Ok(false);
    };

    if !coordinator.try_acquire_rate_slot(platform) {
        warn!(platform = %platform, "Hourly rate guard rejected post");
        return Ok(false);
    }

    let result = poster.post_text(&item.text).await;
    let success = result.is_ok();
    coordinator.mark_posted(item.id, platform, success, now);

    match result {
        Ok(()) => Ok(true),
        Err(e) => Err(anyhow::Error::new(e).context(format!("posting to {platform} failed"))),
    }
}
