//! Study planner service.
//!
//! Ties the pieces together behind one handle: the display shell calls
//! [`StudyPlanner::submit`] on form submission and [`StudyPlanner::toggle`]
//! on checkbox changes, then re-reads [`StudyPlanner::tasks`] to render.
//! The store connection is owned here and passed down explicitly.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

use cram_db::models::{Task, TaskStatus};
use cram_db::queries::tasks as task_queries;

use crate::extract::extract_text;
use crate::plan::{PlanGenerator, PlanRequest, PlanResult};
use crate::sync::sync_tasks;

/// Where the syllabus came from. An uploaded PDF takes precedence over
/// pasted text.
#[derive(Debug, Clone)]
pub enum SyllabusSource {
    Pdf(Vec<u8>),
    Text(String),
}

impl SyllabusSource {
    /// Pick the PDF when one was uploaded (non-empty), the pasted text
    /// otherwise.
    pub fn choose(pdf: Option<Vec<u8>>, text: Option<String>) -> Self {
        match pdf {
            Some(bytes) if !bytes.is_empty() => Self::Pdf(bytes),
            _ => Self::Text(text.unwrap_or_default()),
        }
    }

    /// Resolve to syllabus text. PDF failures come back as error text.
    pub fn into_text(self) -> String {
        match self {
            Self::Pdf(bytes) => extract_text(&bytes),
            Self::Text(text) => text,
        }
    }
}

/// Result of a plan submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A plan was generated and the task table now holds its tasks.
    Generated { plan_text: String, tasks: Vec<Task> },
    /// Generation failed; `message` starts with `ERROR:`. Tasks untouched.
    Failed { message: String },
}

/// The planning pipeline over one task store.
#[derive(Debug)]
pub struct StudyPlanner {
    pool: SqlitePool,
    generator: PlanGenerator,
}

impl StudyPlanner {
    pub fn new(pool: SqlitePool, generator: PlanGenerator) -> Self {
        Self { pool, generator }
    }

    pub fn generator(&self) -> &PlanGenerator {
        &self.generator
    }

    /// Generate a plan and, on success, replace the task table with its
    /// tasks. Store errors propagate; generation failures do not.
    pub async fn submit(&self, request: &PlanRequest) -> Result<SubmitOutcome> {
        match self.generator.generate_plan(request).await {
            PlanResult::Generated(plan_text) => {
                let tasks = sync_tasks(&self.pool, &plan_text).await?;
                info!(task_count = tasks.len(), "plan submitted");
                Ok(SubmitOutcome::Generated { plan_text, tasks })
            }
            failed @ PlanResult::Failed(_) => {
                let message = failed.into_text();
                warn!(%message, "plan generation failed; keeping existing tasks");
                Ok(SubmitOutcome::Failed { message })
            }
        }
    }

    /// Mark a task done (`checked`) or pending. Unknown ids are ignored.
    pub async fn toggle(&self, id: i64, checked: bool) -> Result<()> {
        let status = TaskStatus::from_checked(checked);
        let found = task_queries::set_task_status(&self.pool, id, status).await?;
        if found {
            info!(task_id = id, %status, "task status updated");
        } else {
            info!(task_id = id, "toggle for unknown task ignored");
        }
        Ok(())
    }

    /// All tasks in display order.
    pub async fn tasks(&self) -> Result<Vec<Task>> {
        task_queries::list_tasks(&self.pool).await
    }

    /// Clear the checklist. Returns how many tasks were removed.
    pub async fn reset(&self) -> Result<u64> {
        let removed = task_queries::clear_all(&self.pool).await?;
        info!(removed, "all tasks reset");
        Ok(removed)
    }
}
