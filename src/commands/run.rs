//! The `run` command: the full automation daemon
//!
//! Acquires the single-instance lock, registers the posting and maintenance
//! actions, loads the persisted task table plus the config-driven defaults,
//! and runs the scheduler loop until interrupted.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::Platform;
use crate::scheduler::{action, parse_schedule, ScheduledTask, Scheduler, TaskPriority};
use crate::storage::LockFile;

use super::{post_cycle, AppContext};

/// Hours of freshness history kept by maintenance (one week)
const FRESHNESS_HORIZON_HOURS: i64 = 168;

/// Days of posted history kept by maintenance
const CLEANUP_DAYS: i64 = 7;

/// Run the automation daemon until Ctrl-C
pub async fn run(config: Config) -> Result<()> {
    let lock_path = config.state_dir.join("crier.lock");
    let _lock = LockFile::acquire(lock_path)?;

    let ctx = Arc::new(AppContext::build(config)?);
    let scheduler = Scheduler::with_store(ctx.store.clone());

    register_actions(&scheduler, Arc::clone(&ctx)).await;

    // Persisted tasks first, then config-driven defaults for anything new
    let loaded = scheduler.load_tasks().await?;
    let added = add_default_tasks(&scheduler, &ctx).await?;
    info!(loaded, added, "Task table ready");

    let loop_handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");

    scheduler.shutdown(Duration::from_secs(30)).await;
    loop_handle.abort();

    Ok(())
}

/// Register the posting and maintenance actions
async fn register_actions(scheduler: &Scheduler, ctx: Arc<AppContext>) {
    for platform in Platform::all() {
        let ctx = Arc::clone(&ctx);
        scheduler
            .register_action(
                format!("post_content_{platform}"),
                action(move || {
                    let ctx = Arc::clone(&ctx);
                    async move {
                        post_cycle(&ctx, platform).await?;
                        Ok(())
                    }
                }),
            )
            .await;
    }

    let maintenance_ctx = Arc::clone(&ctx);
    scheduler
        .register_action(
            "maintenance",
            action(move || {
                let ctx = Arc::clone(&maintenance_ctx);
                async move {
                    run_maintenance(&ctx).await;
                    Ok(())
                }
            }),
        )
        .await;
}

/// Build the default task set from the config
///
/// Existing tasks (from the persisted table) keep their state; only missing
/// ones are added.
async fn add_default_tasks(scheduler: &Scheduler, ctx: &AppContext) -> Result<usize> {
    let mut added = 0;

    for platform in ctx.config.platforms.enabled() {
        let Some(cron) = ctx.config.scheduling.posting_cron(platform) else {
            warn!(platform = %platform, "No posting frequency configured");
            continue;
        };

        let id = format!("post_content_{platform}");
        if scheduler.task_status(&id).await.is_some() {
            continue;
        }

        let schedule = match parse_schedule(cron) {
            Ok(schedule) => schedule,
            Err(e) => {
                warn!(platform = %platform, cron, error = %e, "Invalid posting cron, skipping task");
                continue;
            }
        };

        scheduler
            .add_task(
                ScheduledTask::new(
                    &id,
                    format!("Post Content - {}", platform.display_name()),
                    &id,
                    schedule,
                )
                .with_description(format!("Automated content posting for {platform}"))
                .with_platform(platform)
                .with_metadata("type", "content_posting"),
            )
            .await;
        added += 1;
    }

    if scheduler.task_status("system_maintenance").await.is_none() {
        let schedule = parse_schedule(&ctx.config.scheduling.maintenance_frequency)?;
        scheduler
            .add_task(
                ScheduledTask::new(
                    "system_maintenance",
                    "System Maintenance",
                    "maintenance",
                    schedule,
                )
                .with_description("Daily state cleanup and pool refresh")
                .with_priority(TaskPriority::Low)
                .with_metadata("type", "maintenance"),
            )
            .await;
        added += 1;
    }

    Ok(added)
}

/// Daily maintenance: drop old posted items, expire stale freshness stamps,
/// and pick up pool file changes
pub async fn run_maintenance(ctx: &AppContext) {
    let now = Utc::now();

    let removed = ctx.coordinator.lock().await.cleanup(CLEANUP_DAYS, now);

    let mut rotator = ctx.rotator.lock().await;
    let reset = rotator.reset_freshness(None, FRESHNESS_HORIZON_HOURS, now);
    let refreshed = rotator.refresh_pools();

    info!(removed, reset, refreshed, "Maintenance completed");
}
