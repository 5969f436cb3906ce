//! Prometheus metrics for the crier daemon
//!
//! Tracks task runs, per-platform posts, dedup hits, feed polls, and
//! rotation selections.
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails (or never happens), metric operations become
//! no-ops.

use prometheus::{
    register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all crier metrics
struct CrierMetrics {
    task_runs: CounterVec,
    posts: CounterVec,
    dedup_hits: CounterVec,
    feed_polls: CounterVec,
    content_selected: CounterVec,
    scheduler_active_tasks: Gauge,
}

/// Global storage for metrics
static METRICS: OnceLock<CrierMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
///
/// # Returns
///
/// `Ok(())` if all metrics were registered successfully,
/// `Err` with description if any registration failed.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = CrierMetrics {
        task_runs: register_counter_vec!(
            "crier_task_runs_total",
            "Scheduled task runs by task and outcome",
            &["task", "outcome"]
        )?,
        posts: register_counter_vec!(
            "crier_posts_total",
            "Posting attempts by platform and outcome",
            &["platform", "outcome"]
        )?,
        dedup_hits: register_counter_vec!(
            "crier_dedup_hits_total",
            "Duplicate content rejections by subsystem",
            &["subsystem"]
        )?,
        feed_polls: register_counter_vec!(
            "crier_feed_polls_total",
            "Feed poll attempts by outcome",
            &["outcome"]
        )?,
        content_selected: register_counter_vec!(
            "crier_content_selected_total",
            "Rotation selections by source pool and platform",
            &["source", "platform"]
        )?,
        scheduler_active_tasks: register_gauge!(
            "crier_scheduler_active_tasks",
            "Currently running scheduled tasks"
        )?,
    };

    METRICS.set(metrics).ok();
    Ok(())
}

// ============================================================================
// Recording
// ============================================================================

fn outcome_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Record a scheduled task run
pub fn record_task_run(task: &str, success: bool) {
    if let Some(m) = METRICS.get() {
        m.task_runs
            .with_label_values(&[task, outcome_label(success)])
            .inc();
    }
}

/// Record a posting attempt
pub fn record_post(platform: &str, success: bool) {
    if let Some(m) = METRICS.get() {
        m.posts
            .with_label_values(&[platform, outcome_label(success)])
            .inc();
    }
}

/// Record a duplicate-content rejection
pub fn record_dedup_hit(subsystem: &str) {
    if let Some(m) = METRICS.get() {
        m.dedup_hits.with_label_values(&[subsystem]).inc();
    }
}

/// Record a feed poll
pub fn record_feed_poll(success: bool) {
    if let Some(m) = METRICS.get() {
        m.feed_polls
            .with_label_values(&[outcome_label(success)])
            .inc();
    }
}

/// Record a rotation selection
pub fn record_content_selected(source: &str, platform: &str) {
    if let Some(m) = METRICS.get() {
        m.content_selected
            .with_label_values(&[source, platform])
            .inc();
    }
}

/// Set the running-task gauge
pub fn set_active_tasks(count: usize) {
    if let Some(m) = METRICS.get() {
        m.scheduler_active_tasks.set(count as f64);
    }
}

/// Render all registered metrics in the Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
