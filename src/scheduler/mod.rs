//! Cron-driven task scheduling
//!
//! This module provides the automation scheduler: a task table driven by
//! five-field cron expressions, with per-task async execution, retry with
//! exponential backoff, and JSON persistence of the task table.
//!
//! # Overview
//!
//! Tasks reference named actions registered on the [`Scheduler`]. The run
//! loop ticks every 10 seconds and starts every due task on its own tokio
//! task. A failed run is re-scheduled with an exponentially growing delay
//! (one minute doubling, capped at one hour); once the retry budget is
//! spent the task is disabled instead of removed, so the table keeps a
//! record of what gave up.
//!
//! # Modules
//!
//! - [`cron`] - Cron expression parsing and next-run computation
//! - [`task`] - Task definitions, status, and the persisted task table
//! - [`runner`] - The execution loop and action registry
//!
//! # Quick Start
//!
//! ```ignore
//! use crier::scheduler::{action, parse_schedule, ScheduledTask, Scheduler};
//!
//! let scheduler = Scheduler::new();
//! scheduler.register_action("post_content", action(|| async {
//!     // select and post one piece of content
//!     Ok(())
//! })).await;
//!
//! scheduler.add_task(ScheduledTask::new(
//!     "post_content_bluesky",
//!     "Post Content - BlueSky",
//!     "post_content",
//!     parse_schedule("0 */4 * * *")?,
//! )).await;
//!
//! scheduler.run().await;
//! ```

pub mod cron;
pub mod error;
pub mod runner;
pub mod task;

// Re-export main types
pub use cron::CronSchedule;
pub use error::{SchedulerError, SchedulerResult};
pub use runner::{action, Action, ActionFuture, Scheduler};
pub use task::{parse_schedule, ScheduledTask, TaskPriority, TaskSnapshot, TaskStatus, TaskTable};
