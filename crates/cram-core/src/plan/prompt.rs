//! Prompt template for study-plan generation.
//!
//! The template is fixed; only the syllabus, exam date, and daily hours vary.
//! The model is told to put every actionable item on its own line behind the
//! task marker, which is what [`crate::sync`] later looks for.

use crate::sync::TASK_MARKER;

use super::request::PlanRequest;

/// Maximum number of syllabus characters embedded in a prompt.
pub const SYLLABUS_CHAR_LIMIT: usize = 2000;

/// The first [`SYLLABUS_CHAR_LIMIT`] characters of `text`. The rest is
/// dropped silently.
pub fn truncate_syllabus(text: &str) -> &str {
    match text.char_indices().nth(SYLLABUS_CHAR_LIMIT) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Build the generation prompt for a request.
pub fn build_prompt(request: &PlanRequest) -> String {
    let syllabus = truncate_syllabus(request.syllabus_text());
    let mut prompt = String::with_capacity(syllabus.len() + 512);

    prompt.push_str("You are an expert Study Planner.\n");
    prompt.push_str(&format!("Syllabus Content: {syllabus}\n"));
    prompt.push_str(&format!("Exam Date: {}\n", request.exam_date().format("%Y-%m-%d")));
    prompt.push_str(&format!(
        "Available Study Time: {} hours per day.\n\n",
        request.daily_hours()
    ));
    prompt.push_str("Create a detailed daily study plan.\n");
    prompt.push_str(&format!(
        "IMPORTANT: Every specific study task MUST start with the prefix '{TASK_MARKER}' on a new line.\n"
    ));
    prompt.push_str(&format!(
        "Example: {TASK_MARKER} Study Kinematics and solve 10 problems.\n"
    ));

    prompt
}
