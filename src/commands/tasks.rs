//! The `tasks` command: inspect and tweak the persisted task table

use anyhow::Result;

use crate::config::Config;
use crate::scheduler::Scheduler;
use crate::storage::StateStore;

/// What to do with the task table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    List,
    Enable,
    Disable,
}

/// List all tasks, or enable/disable one by id
pub async fn tasks(config: Config, action: TaskAction, id: Option<String>) -> Result<()> {
    let store = StateStore::new(&config.state_dir)?;
    let scheduler = Scheduler::with_store(store);
    scheduler.load_tasks().await?;

    match (action, id) {
        (TaskAction::Enable, Some(id)) => {
            scheduler.enable_task(&id).await?;
            println!("Enabled task {id}");
        }
        (TaskAction::Disable, Some(id)) => {
            scheduler.disable_task(&id).await?;
            println!("Disabled task {id}");
        }
        (TaskAction::Enable | TaskAction::Disable, None) => {
            anyhow::bail!("a task id is required");
        }
        (TaskAction::List, _) => {
            let statuses = scheduler.all_statuses().await;
            if statuses.is_empty() {
                println!("(no tasks in the table)");
                return Ok(());
            }

            println!(
                "{:<28} {:>8} {:>10} {:>7} {:>26}",
                "id", "enabled", "status", "retries", "next run"
            );
            println!("{:-<84}", "");
            for task in statuses {
                let next = task
                    .next_run
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| String::from("-"));
                println!(
                    "{:<28} {:>8} {:>10} {:>7} {:>26}",
                    task.id,
                    task.enabled,
                    format!("{:?}", task.status).to_lowercase(),
                    task.retry_count,
                    next,
                );
            }
        }
    }

    Ok(())
}
