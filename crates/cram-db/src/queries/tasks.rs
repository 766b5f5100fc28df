//! Database query functions for the `tasks` table.
//!
//! Rows are never deleted one at a time: the whole table is cleared, either
//! on reset or as the first half of [`replace_all`].

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::models::{Task, TaskStatus};

/// Delete every task. Returns the number of rows removed.
pub async fn clear_all(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM tasks")
        .execute(pool)
        .await
        .context("failed to clear tasks")?;

    Ok(result.rows_affected())
}

/// Append a new `Pending` task. Returns its generated id.
pub async fn insert_task(pool: &SqlitePool, name: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO tasks (task_name, status) VALUES (?1, ?2)")
        .bind(name)
        .bind(TaskStatus::Pending)
        .execute(pool)
        .await
        .context("failed to insert task")?;

    Ok(result.last_insert_rowid())
}

/// List all tasks in insertion order.
pub async fn list_tasks(pool: &SqlitePool) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>("SELECT id, task_name, status FROM tasks ORDER BY id ASC")
        .fetch_all(pool)
        .await
        .context("failed to list tasks")?;

    Ok(tasks)
}

/// Fetch a single task by id.
pub async fn get_task(pool: &SqlitePool, id: i64) -> Result<Option<Task>> {
    let task =
        sqlx::query_as::<_, Task>("SELECT id, task_name, status FROM tasks WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch task")?;

    Ok(task)
}

/// Count the rows currently in the table.
pub async fn count_tasks(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
        .fetch_one(pool)
        .await
        .context("failed to count tasks")?;

    Ok(row.0)
}

/// Set the status of one task.
///
/// An unknown id is not an error: the update is a no-op and `false` is
/// returned. `true` means a row with that id exists.
pub async fn set_task_status(pool: &SqlitePool, id: i64, status: TaskStatus) -> Result<bool> {
    let result = sqlx::query("UPDATE tasks SET status = ?1 WHERE id = ?2")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update task status")?;

    Ok(result.rows_affected() > 0)
}

/// Replace the whole table with one `Pending` row per name, in order.
///
/// The delete and all inserts run in a single transaction, so readers see
/// either the old set or the new one. Returns the new rows.
pub async fn replace_all(pool: &SqlitePool, names: &[String]) -> Result<Vec<Task>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    sqlx::query("DELETE FROM tasks")
        .execute(&mut *tx)
        .await
        .context("failed to clear tasks")?;

    let mut tasks = Vec::with_capacity(names.len());
    for name in names {
        let result = sqlx::query("INSERT INTO tasks (task_name, status) VALUES (?1, ?2)")
            .bind(name)
            .bind(TaskStatus::Pending)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert task {name:?}"))?;

        tasks.push(Task {
            id: result.last_insert_rowid(),
            name: name.clone(),
            status: TaskStatus::Pending,
        });
    }

    tx.commit().await.context("failed to commit task replacement")?;

    Ok(tasks)
}
