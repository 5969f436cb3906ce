//! The `status` command: a text snapshot of queues, pools, and tasks

use anyhow::Result;
use chrono::Utc;

use crate::config::Config;
use crate::models::Platform;
use crate::rss::WatcherState;
use crate::scheduler::Scheduler;

use super::AppContext;

/// Print platform queues, rotation pools, RSS cursors, and upcoming tasks
pub async fn status(config: Config) -> Result<()> {
    let ctx = AppContext::build(config)?;
    let now = Utc::now();

    println!("Platform queues");
    println!("{:-<60}", "");
    {
        let coordinator = ctx.coordinator.lock().await;
        for platform in Platform::all() {
            let stats = coordinator.platform_statistics(platform, now);
            let next = stats
                .next_available
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| String::from("now"));
            println!(
                "{:>10}: {} queued, {} pending, {} posted, {} failed, {}h/{}d recent, next {}",
                platform.id(),
                stats.queue_length,
                stats.total_pending,
                stats.total_posted,
                stats.total_failed,
                stats.posts_last_hour,
                stats.posts_last_day,
                next,
            );
        }
    }

    println!();
    println!("Content pools");
    println!("{:-<60}", "");
    {
        let rotator = ctx.rotator.lock().await;
        let stats = rotator.statistics();
        for (source, (items, recent)) in &stats.pools {
            println!("{:>16}: {} items, {} recently used", source.id(), items, recent);
        }
        println!(
            "{:>16}: {} hashes tracked",
            "freshness", stats.tracked_hashes
        );
    }

    println!();
    println!("RSS watcher");
    println!("{:-<60}", "");
    {
        let state = WatcherState::load(ctx.store.clone());
        println!(
            "{:>16}: {} feeds tracked, {} items posted",
            "cursors",
            state.tracked_feed_count(),
            state.posted_count()
        );
        if let Some(pubdate) = state.last_pubdate() {
            println!("{:>16}: {}", "high-water", pubdate.to_rfc3339());
        }
        if let Some(checked) = state.last_checked() {
            println!("{:>16}: {}", "last checked", checked.to_rfc3339());
        }
    }

    println!();
    println!("Upcoming tasks");
    println!("{:-<60}", "");
    {
        let scheduler = Scheduler::with_store(ctx.store.clone());
        scheduler.load_tasks().await?;
        let upcoming = scheduler.upcoming(10).await;
        if upcoming.is_empty() {
            println!("(no tasks scheduled)");
        }
        for task in upcoming {
            let when = task
                .next_run
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| String::from("-"));
            println!("{:>24}: {} ({:?})", task.id, when, task.priority);
        }
    }

    Ok(())
}
