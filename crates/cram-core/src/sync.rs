//! Task synchronisation: turn plan text into task rows.
//!
//! Any line containing [`TASK_MARKER`] yields one task named by whatever
//! follows the first marker on that line, trimmed. Other lines are dropped.
//! The store is then replaced wholesale with the new set.

use anyhow::{Result, bail};
use sqlx::SqlitePool;
use tracing::info;

use cram_db::models::Task;
use cram_db::queries::tasks as task_queries;

use crate::plan::is_error_text;

/// Marker identifying actionable lines in generated plan text.
pub const TASK_MARKER: &str = "TASK:";

/// Extract task names from plan text, in line order. No deduplication.
pub fn extract_task_names(plan_text: &str) -> Vec<String> {
    plan_text
        .lines()
        .filter_map(|line| line.split_once(TASK_MARKER))
        .map(|(_, rest)| rest.trim().to_string())
        .collect()
}

/// Replace every stored task with the tasks found in `plan_text`, all
/// `Pending`, in the order they appear. Returns the new rows.
///
/// Refuses `ERROR:`-tagged text so a failed generation can never wipe the
/// existing checklist.
pub async fn sync_tasks(pool: &SqlitePool, plan_text: &str) -> Result<Vec<Task>> {
    if is_error_text(plan_text) {
        bail!("refusing to sync tasks from a failed plan");
    }

    let names = extract_task_names(plan_text);
    let tasks = task_queries::replace_all(pool, &names).await?;

    info!(task_count = tasks.len(), "task table replaced");
    Ok(tasks)
}
