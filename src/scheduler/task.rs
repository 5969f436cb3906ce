//! Scheduled task definitions and the persisted task table
//!
//! A task couples a cron schedule with the name of a registered action.
//! Failed runs are re-scheduled with exponential backoff (one minute
//! doubling, capped at one hour); a task that exhausts its retries is
//! disabled rather than removed.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::models::Platform;
use crate::utils::retry::RetryConfig;

use super::cron::CronSchedule;
use super::error::SchedulerResult;

// ============================================================================
// Priority and Status
// ============================================================================

/// Task priority, higher runs first when several tasks are due
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low = 1,
    Normal = 2,
    High = 3,
    Critical = 4,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Lifecycle state of a task's most recent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

// ============================================================================
// Scheduled Task
// ============================================================================

/// A single scheduled task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Unique task identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// What the task does
    pub description: String,

    /// Name of the registered action to invoke
    pub action: String,

    /// Cron schedule
    pub schedule: CronSchedule,

    /// Task priority
    #[serde(default)]
    pub priority: TaskPriority,

    /// Platform the task targets, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,

    /// Whether the task is eligible to run
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum retries before the task is disabled
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Consecutive failures so far
    #[serde(default)]
    pub retry_count: u32,

    /// Next scheduled run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,

    /// Most recent run start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,

    /// Status of the most recent run
    #[serde(default)]
    pub status: TaskStatus,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

impl ScheduledTask {
    /// Create a new task with its first run computed from the schedule
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        action: impl Into<String>,
        schedule: CronSchedule,
    ) -> Self {
        let mut task = Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            action: action.into(),
            schedule,
            priority: TaskPriority::Normal,
            platform: None,
            enabled: true,
            max_retries: 3,
            retry_count: 0,
            next_run: None,
            last_run: None,
            status: TaskStatus::Pending,
            metadata: HashMap::new(),
        };
        task.compute_next_run(Utc::now());
        task
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the target platform
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Recompute `next_run` from the cron schedule
    ///
    /// A schedule that never fires disables the task instead of looping the
    /// runner forever.
    pub fn compute_next_run(&mut self, now: DateTime<Utc>) {
        let local = now.with_timezone(&Local);
        match self.schedule.next_after(local) {
            Some(next) => self.next_run = Some(next.with_timezone(&Utc)),
            None => {
                warn!(task = %self.id, "Schedule never fires, disabling task");
                self.enabled = false;
                self.next_run = None;
            }
        }
    }

    /// Whether the task should run at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.status != TaskStatus::Running
            && self.next_run.is_some_and(|t| t <= now)
    }

    /// Record a successful run: reset retries and schedule the next run
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.retry_count = 0;
        if self.enabled {
            self.compute_next_run(now);
        }
    }

    /// Record a failed run: back off exponentially, disable after the
    /// retry budget is spent
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Failed;
        self.retry_count += 1;

        if self.retry_count < self.max_retries {
            let backoff = RetryConfig::task_backoff().delay_for_attempt(self.retry_count);
            let backoff =
                chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::zero());
            self.next_run = Some(now + backoff);
        } else {
            warn!(task = %self.id, retries = self.retry_count, "Task exceeded max retries, disabling");
            self.enabled = false;
            self.next_run = None;
        }
    }
}

// ============================================================================
// Task Table Persistence
// ============================================================================

/// On-disk form of the task table (`tasks.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskTable {
    pub tasks: Vec<ScheduledTask>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl TaskTable {
    /// Build a table snapshot from tasks
    pub fn new(tasks: Vec<ScheduledTask>) -> Self {
        Self {
            tasks,
            generated_at: Some(Utc::now()),
        }
    }
}

/// Condensed task state for status displays
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    pub enabled: bool,
    pub priority: TaskPriority,
    pub platform: Option<Platform>,
    pub retry_count: u32,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
}

impl From<&ScheduledTask> for TaskSnapshot {
    fn from(task: &ScheduledTask) -> Self {
        Self {
            id: task.id.clone(),
            name: task.name.clone(),
            status: task.status,
            enabled: task.enabled,
            priority: task.priority,
            platform: task.platform,
            retry_count: task.retry_count,
            next_run: task.next_run,
            last_run: task.last_run,
        }
    }
}

/// Parse a cron expression for task construction
///
/// Thin wrapper so callers outside the scheduler module do not need to
/// import the cron type directly.
pub fn parse_schedule(expression: &str) -> SchedulerResult<CronSchedule> {
    CronSchedule::parse(expression)
}

// ============================================================================
// Tests
// ============================================================================
