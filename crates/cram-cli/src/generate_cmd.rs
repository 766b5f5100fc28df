//! `cram generate`: build a plan from a syllabus file or inline text and
//! replace the checklist with its tasks.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

use cram_core::plan::PlanRequest;
use cram_core::planner::{StudyPlanner, SubmitOutcome, SyllabusSource};

use crate::task_cmds::format_task_line;

pub struct GenerateArgs {
    pub exam_date: NaiveDate,
    pub hours: u32,
    pub syllabus: Option<PathBuf>,
    pub text: Option<String>,
}

/// Whether a path should go through the PDF extractor.
fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Load syllabus text from a file. PDF extraction failures come back as
/// text, the same as an upload through the web form.
pub fn read_syllabus(path: &Path) -> Result<String> {
    if is_pdf(path) {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read syllabus {}", path.display()))?;
        Ok(SyllabusSource::Pdf(bytes).into_text())
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read syllabus {}", path.display()))
    }
}

/// Run the generate command.
pub async fn run_generate(planner: &StudyPlanner, args: GenerateArgs) -> Result<()> {
    let syllabus = match (&args.syllabus, args.text) {
        (Some(path), _) => read_syllabus(path)?,
        (None, text) => text.unwrap_or_default(),
    };

    let request = PlanRequest::new(syllabus, Some(args.exam_date), args.hours)?;

    println!(
        "Generating plan (models: {})...",
        planner.generator().models().join(", ")
    );
    match planner.submit(&request).await? {
        SubmitOutcome::Generated { plan_text, tasks } => {
            println!("Plan generated!");
            println!();
            println!("{plan_text}");
            println!();
            println!("Tasks ({}):", tasks.len());
            for task in &tasks {
                println!("{}", format_task_line(task));
            }
            Ok(())
        }
        SubmitOutcome::Failed { message } => bail!("{message}"),
    }
}
