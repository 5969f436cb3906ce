//! Task execution loop
//!
//! The runner owns the task table and an action registry. Every tick it
//! starts any due task on its own tokio task, so a slow posting cycle never
//! blocks the loop or the other tasks.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::storage::StateStore;

use super::error::{SchedulerError, SchedulerResult};
use super::task::{ScheduledTask, TaskSnapshot, TaskStatus, TaskTable};

/// File name of the persisted task table
const TASKS_FILE: &str = "tasks.json";

/// Boxed future returned by task actions
pub type ActionFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A registered task action
pub type Action = Arc<dyn Fn() -> ActionFuture + Send + Sync>;

/// Wrap an async closure into an [`Action`]
pub fn action<F, Fut>(f: F) -> Action
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

struct Inner {
    tasks: RwLock<HashMap<String, ScheduledTask>>,
    actions: RwLock<HashMap<String, Action>>,
    running: Mutex<HashMap<String, JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    store: Option<StateStore>,
}

/// Cron-driven task scheduler
///
/// Cloning is cheap; clones share the same task table and registry.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
    tick_interval: Duration,
}

impl Scheduler {
    /// Create a scheduler without persistence
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a scheduler that persists its task table via `store`
    pub fn with_store(store: StateStore) -> Self {
        Self::build(Some(store))
    }

    fn build(store: Option<StateStore>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                tasks: RwLock::new(HashMap::new()),
                actions: RwLock::new(HashMap::new()),
                running: Mutex::new(HashMap::new()),
                shutdown,
                store,
            }),
            tick_interval: Duration::from_secs(10),
        }
    }

    /// Override the tick interval (used by tests)
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Register an action under a name tasks can reference
    pub async fn register_action(&self, name: impl Into<String>, action: Action) {
        self.inner.actions.write().await.insert(name.into(), action);
    }

    /// Add a task to the table
    pub async fn add_task(&self, task: ScheduledTask) {
        debug!(task = %task.id, name = %task.name, "Added task");
        self.inner.tasks.write().await.insert(task.id.clone(), task);
        self.persist().await;
    }

    /// Remove a task; refused while the task is running
    pub async fn remove_task(&self, id: &str) -> SchedulerResult<()> {
        if self.inner.running.lock().await.contains_key(id) {
            return Err(SchedulerError::task_running(id));
        }

        let removed = self.inner.tasks.write().await.remove(id);
        if removed.is_none() {
            return Err(SchedulerError::task_not_found(id));
        }

        info!(task = %id, "Removed task");
        self.persist().await;
        Ok(())
    }

    /// Enable a task and recompute its next run
    pub async fn enable_task(&self, id: &str) -> SchedulerResult<()> {
        let mut tasks = self.inner.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| SchedulerError::task_not_found(id))?;
        task.enabled = true;
        task.retry_count = 0;
        task.compute_next_run(Utc::now());
        drop(tasks);

        info!(task = %id, "Enabled task");
        self.persist().await;
        Ok(())
    }

    /// Disable a task
    pub async fn disable_task(&self, id: &str) -> SchedulerResult<()> {
        let mut tasks = self.inner.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| SchedulerError::task_not_found(id))?;
        task.enabled = false;
        drop(tasks);

        info!(task = %id, "Disabled task");
        self.persist().await;
        Ok(())
    }

    /// Snapshot of a single task
    pub async fn task_status(&self, id: &str) -> Option<TaskSnapshot> {
        self.inner.tasks.read().await.get(id).map(TaskSnapshot::from)
    }

    /// Snapshots of all tasks, ordered by id
    pub async fn all_statuses(&self) -> Vec<TaskSnapshot> {
        let tasks = self.inner.tasks.read().await;
        let mut snapshots: Vec<TaskSnapshot> = tasks.values().map(TaskSnapshot::from).collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    /// Next scheduled tasks ordered by run time, then priority (highest first)
    pub async fn upcoming(&self, limit: usize) -> Vec<TaskSnapshot> {
        let tasks = self.inner.tasks.read().await;
        let mut upcoming: Vec<TaskSnapshot> = tasks
            .values()
            .filter(|t| t.enabled && t.next_run.is_some())
            .map(TaskSnapshot::from)
            .collect();

        upcoming.sort_by(|a, b| {
            a.next_run
                .cmp(&b.next_run)
                .then_with(|| b.priority.cmp(&a.priority))
        });
        upcoming.truncate(limit);
        upcoming
    }

    /// Run a task immediately, bypassing its schedule
    pub async fn force_run(&self, id: &str) -> SchedulerResult<()> {
        info!(task = %id, "Force running task");
        self.start_task(id).await
    }

    /// Number of currently running tasks
    pub async fn running_count(&self) -> usize {
        let mut running = self.inner.running.lock().await;
        running.retain(|_, handle| !handle.is_finished());
        running.len()
    }

    /// Start every due task; returns the ids started this tick
    pub async fn tick_once(&self) -> Vec<String> {
        let now = Utc::now();

        let due: Vec<String> = {
            let tasks = self.inner.tasks.read().await;
            tasks
                .values()
                .filter(|t| t.is_due(now))
                .map(|t| t.id.clone())
                .collect()
        };

        let mut started = Vec::new();
        for id in due {
            match self.start_task(&id).await {
                Ok(()) => started.push(id),
                Err(SchedulerError::TaskRunning { .. }) => {}
                Err(e) => warn!(task = %id, error = %e, "Failed to start task"),
            }
        }

        // Prune finished handles
        let mut running = self.inner.running.lock().await;
        running.retain(|_, handle| !handle.is_finished());
        metrics::set_active_tasks(running.len());

        started
    }

    /// Run the scheduler loop until [`Scheduler::shutdown`] is called
    pub async fn run(&self) {
        info!(tick_secs = self.tick_interval.as_secs(), "Scheduler loop started");

        let mut shutdown_rx = self.inner.shutdown.subscribe();
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick_once().await;
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler loop stopped");
    }

    /// Signal shutdown and wait for in-flight tasks, bounded by `grace`
    pub async fn shutdown(&self, grace: Duration) {
        info!("Stopping scheduler");
        let _ = self.inner.shutdown.send(true);

        let (ids, handles): (Vec<String>, Vec<JoinHandle<()>>) =
            self.inner.running.lock().await.drain().unzip();
        if handles.is_empty() {
            return;
        }

        if tokio::time::timeout(grace, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!(tasks = ?ids, "Tasks did not finish within shutdown grace period");
        }
    }

    /// Load the persisted task table, replacing the in-memory one
    ///
    /// An unreadable table (corrupt JSON, invalid cron expressions) is
    /// logged and treated as empty; the next persist overwrites it.
    pub async fn load_tasks(&self) -> SchedulerResult<usize> {
        let Some(store) = &self.inner.store else {
            return Ok(0);
        };

        let table: TaskTable = match store.load(TASKS_FILE) {
            Ok(Some(table)) => table,
            Ok(None) => return Ok(0),
            Err(e) => {
                warn!(error = %e, "Task table unreadable, starting from empty table");
                return Ok(0);
            }
        };

        let mut tasks = self.inner.tasks.write().await;
        let count = table.tasks.len();
        for mut task in table.tasks {
            // A run interrupted by a crash is left Pending, not Running
            if task.status == TaskStatus::Running {
                task.status = TaskStatus::Pending;
            }
            if task.enabled && task.next_run.is_none() {
                task.compute_next_run(Utc::now());
            }
            tasks.insert(task.id.clone(), task);
        }

        info!(count, "Loaded task table");
        Ok(count)
    }

    /// Persist the task table when a store is configured
    async fn persist(&self) {
        let Some(store) = &self.inner.store else {
            return;
        };

        let table = {
            let tasks = self.inner.tasks.read().await;
            let mut list: Vec<ScheduledTask> = tasks.values().cloned().collect();
            list.sort_by(|a, b| a.id.cmp(&b.id));
            TaskTable::new(list)
        };

        if let Err(e) = store.save(TASKS_FILE, &table) {
            error!(error = %e, "Failed to persist task table");
        }
    }

    async fn start_task(&self, id: &str) -> SchedulerResult<()> {
        let mut running = self.inner.running.lock().await;
        running.retain(|_, handle| !handle.is_finished());
        if running.contains_key(id) {
            return Err(SchedulerError::task_running(id));
        }

        let action = {
            let mut tasks = self.inner.tasks.write().await;
            let task = tasks
                .get_mut(id)
                .ok_or_else(|| SchedulerError::task_not_found(id))?;

            task.status = TaskStatus::Running;
            task.last_run = Some(Utc::now());

            let actions = self.inner.actions.read().await;
            actions.get(&task.action).cloned()
        };

        let scheduler = self.clone();
        let task_id = id.to_string();
        let handle = tokio::spawn(async move {
            scheduler.execute(task_id, action).await;
        });
        running.insert(id.to_string(), handle);

        Ok(())
    }

    async fn execute(&self, id: String, action: Option<Action>) {
        let started = std::time::Instant::now();
        debug!(task = %id, "Starting task");

        let result = match action {
            Some(action) => action().await,
            None => {
                let name = {
                    let tasks = self.inner.tasks.read().await;
                    tasks.get(&id).map(|t| t.action.clone()).unwrap_or_default()
                };
                Err(anyhow::Error::new(SchedulerError::unknown_action(name)))
            }
        };

        let now = Utc::now();
        {
            let mut tasks = self.inner.tasks.write().await;
            if let Some(task) = tasks.get_mut(&id) {
                match &result {
                    Ok(()) => {
                        task.record_success(now);
                        metrics::record_task_run(&id, true);
                        info!(
                            task = %id,
                            elapsed_secs = started.elapsed().as_secs_f64(),
                            "Task completed"
                        );
                    }
                    Err(e) => {
                        task.record_failure(now);
                        metrics::record_task_run(&id, false);
                        error!(
                            task = %id,
                            retry_count = task.retry_count,
                            error = %e,
                            "Task failed"
                        );
                    }
                }
            }
        }

        self.inner.running.lock().await.remove(&id);
        self.persist().await;
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::cron::CronSchedule;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn every_minute_task(id: &str) -> ScheduledTask {
        ScheduledTask::new(
            id,
            id,
            "noop",
            CronSchedule::parse("* * * * *").unwrap(),
        )
    }

    async fn wait_for_idle(scheduler: &Scheduler) {
        for _ in 0..100 {
            if scheduler.running_count().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task did not finish");
    }

    #[tokio::test]
    async fn test_add_and_remove_task() {
        let scheduler = Scheduler::new();
        scheduler.add_task(every_minute_task("t1")).await;

        assert!(scheduler.task_status("t1").await.is_some());
        scheduler.remove_task("t1").await.unwrap();
        assert!(scheduler.task_status("t1").await.is_none());

        assert!(matches!(
            scheduler.remove_task("t1").await,
            Err(SchedulerError::TaskNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_force_run_executes_action() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        scheduler
            .register_action(
                "noop",
                action(move || {
                    let counter = Arc::clone(&counter_clone);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .await;

        scheduler.add_task(every_minute_task("t1")).await;
        scheduler.force_run("t1").await.unwrap();
        wait_for_idle(&scheduler).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let status = scheduler.task_status("t1").await.unwrap();
        assert_eq!(status.status, TaskStatus::Completed);
        assert_eq!(status.retry_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_action_fails_task() {
        let scheduler = Scheduler::new();
        scheduler.add_task(every_minute_task("t1")).await;

        scheduler.force_run("t1").await.unwrap();
        wait_for_idle(&scheduler).await;

        let status = scheduler.task_status("t1").await.unwrap();
        assert_eq!(status.status, TaskStatus::Failed);
        assert_eq!(status.retry_count, 1);
    }

    #[tokio::test]
    async fn test_failure_backoff_then_disable() {
        let scheduler = Scheduler::new();
        scheduler
            .register_action("noop", action(|| async { anyhow::bail!("always fails") }))
            .await;
        scheduler.add_task(every_minute_task("t1")).await;

        for _ in 0..3 {
            scheduler.force_run("t1").await.unwrap();
            wait_for_idle(&scheduler).await;
        }

        let status = scheduler.task_status("t1").await.unwrap();
        assert!(!status.enabled);
        assert_eq!(status.retry_count, 3);
    }

    #[tokio::test]
    async fn test_tick_once_starts_due_tasks() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        scheduler
            .register_action(
                "noop",
                action(move || {
                    let counter = Arc::clone(&counter_clone);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .await;

        let mut task = every_minute_task("t1");
        task.next_run = Some(Utc::now() - chrono::Duration::seconds(1));
        scheduler.add_task(task).await;

        let started = scheduler.tick_once().await;
        assert_eq!(started, vec!["t1".to_string()]);
        wait_for_idle(&scheduler).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Next run was recomputed into the future; not due anymore
        let started = scheduler.tick_once().await;
        assert!(started.is_empty());
    }

    #[tokio::test]
    async fn test_upcoming_order() {
        let scheduler = Scheduler::new();

        let mut early = every_minute_task("early");
        early.next_run = Some(Utc::now() + chrono::Duration::minutes(1));
        let mut late = every_minute_task("late");
        late.next_run = Some(Utc::now() + chrono::Duration::minutes(10));

        scheduler.add_task(late).await;
        scheduler.add_task(early).await;

        let upcoming = scheduler.upcoming(10).await;
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].id, "early");
        assert_eq!(upcoming[1].id, "late");
    }

    #[tokio::test]
    async fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path()).unwrap();

        {
            let scheduler = Scheduler::with_store(store.clone());
            scheduler.add_task(every_minute_task("t1")).await;
            scheduler.add_task(every_minute_task("t2")).await;
        }

        let scheduler = Scheduler::with_store(store);
        let count = scheduler.load_tasks().await.unwrap();
        assert_eq!(count, 2);
        assert!(scheduler.task_status("t1").await.is_some());
        assert!(scheduler.task_status("t2").await.is_some());
    }
}
