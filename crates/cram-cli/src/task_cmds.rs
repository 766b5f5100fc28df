//! `cram tasks`, `cram done`, `cram undo`, and `cram reset`.

use anyhow::Result;
use sqlx::SqlitePool;

use cram_db::models::{Task, TaskStatus};
use cram_db::queries::tasks as task_db;

/// One checklist line: `[x]` for done, `[ ]` for pending.
pub fn format_task_line(task: &Task) -> String {
    let mark = if task.status.is_done() { "x" } else { " " };
    format!("  [{mark}] {:>4}  {}", task.id, task.name)
}

/// Print the checklist.
pub async fn run_list(pool: &SqlitePool) -> Result<()> {
    let tasks = task_db::list_tasks(pool).await?;
    if tasks.is_empty() {
        println!("No tasks yet. Run `cram generate` to create a plan.");
        return Ok(());
    }

    let done = tasks.iter().filter(|t| t.status.is_done()).count();
    println!("Tasks ({done}/{} done):", tasks.len());
    for task in &tasks {
        println!("{}", format_task_line(task));
    }
    Ok(())
}

/// Mark a task done or pending. An unknown id changes nothing.
pub async fn run_set_done(pool: &SqlitePool, id: i64, done: bool) -> Result<()> {
    let status = TaskStatus::from_checked(done);
    if task_db::set_task_status(pool, id, status).await? {
        println!("Task {id} marked {status}.");
    } else {
        println!("Task {id} not found; nothing changed.");
    }
    Ok(())
}

/// Delete every task.
pub async fn run_reset(pool: &SqlitePool) -> Result<()> {
    let removed = task_db::clear_all(pool).await?;
    println!("Removed {removed} task(s).");
    Ok(())
}
