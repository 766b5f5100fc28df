use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Form, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use cram_core::plan::{DAILY_HOURS_RANGE, DEFAULT_DAILY_HOURS, PlanRequest};
use cram_core::planner::{StudyPlanner, SubmitOutcome, SyllabusSource};
use cram_db::models::Task;

/// Largest accepted form submission, PDF included.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

type AppState = Arc<StudyPlanner>;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(planner: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/plan", post(submit_plan))
        .route("/tasks/{id}/toggle", post(toggle_task))
        .route("/tasks/reset", post(reset_tasks))
        .route("/api/tasks", get(list_tasks))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(planner)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(planner: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(planner);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("cram serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("cram serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Banner shown above the checklist after a submission.
enum Notice {
    /// Generation succeeded; carries the full plan text.
    Generated(String),
    /// Input was rejected before any generation call.
    Warning(String),
    /// Every model failed; carries the `ERROR:` text.
    Failed(String),
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_notice(notice: &Notice) -> String {
    match notice {
        Notice::Generated(plan) => format!(
            "<p class=\"success\">Plan generated!</p><pre class=\"plan\">{}</pre>",
            escape_html(plan)
        ),
        Notice::Warning(msg) => format!("<p class=\"warning\">{}</p>", escape_html(msg)),
        Notice::Failed(msg) => format!("<p class=\"error\">{}</p>", escape_html(msg)),
    }
}

fn render_task(task: &Task) -> String {
    let name = escape_html(&task.name);
    let (checked, label) = if task.status.is_done() {
        (" checked", format!("<s>{name}</s>"))
    } else {
        ("", name)
    };
    format!(
        "<li><form method=\"post\" action=\"/tasks/{id}/toggle\">\
<label><input type=\"checkbox\" name=\"done\" value=\"on\"{checked} onchange=\"this.form.submit()\"> {label}</label>\
</form></li>",
        id = task.id,
    )
}

fn render_page(tasks: &[Task], notice: Option<&Notice>) -> String {
    let notice = notice.map(render_notice).unwrap_or_default();
    let checklist = if tasks.is_empty() {
        "<p>No tasks yet. Generate a plan above!</p>".to_string()
    } else {
        let done = tasks.iter().filter(|t| t.status.is_done()).count();
        let items = tasks.iter().map(render_task).collect::<Vec<_>>().join("\n");
        format!(
            "<p>{done}/{total} done</p><ul class=\"tasks\">{items}</ul>\
<form method=\"post\" action=\"/tasks/reset\"><button type=\"submit\">Reset All Tasks</button></form>",
            total = tasks.len(),
        )
    };

    format!(
        "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>cram</title>\
<style>.success{{color:green}}.warning{{color:#b58900}}.error{{color:red}}.tasks{{list-style:none}}</style>\
</head><body>\
<h1>cram</h1>\
<form method=\"post\" action=\"/plan\" enctype=\"multipart/form-data\">\
<p><label>Exam date <input type=\"date\" name=\"exam_date\"></label></p>\
<p><label>Daily study hours <input type=\"number\" name=\"daily_hours\" min=\"{min}\" max=\"{max}\" value=\"{hours}\"></label></p>\
<p><label>Syllabus PDF <input type=\"file\" name=\"syllabus_pdf\" accept=\"application/pdf\"></label></p>\
<p><label>Or paste syllabus text<br><textarea name=\"syllabus_text\" rows=\"8\" cols=\"80\"></textarea></label></p>\
<p><button type=\"submit\">Generate Plan</button></p>\
</form>\
{notice}\
<h2>Checklist</h2>\
{checklist}\
</body></html>",
        min = DAILY_HOURS_RANGE.start(),
        max = DAILY_HOURS_RANGE.end(),
        hours = DEFAULT_DAILY_HOURS,
    )
}

async fn render(
    planner: &StudyPlanner,
    status: StatusCode,
    notice: Option<Notice>,
) -> Result<Response, AppError> {
    let tasks = planner.tasks().await.map_err(AppError::internal)?;
    Ok((status, Html(render_page(&tasks, notice.as_ref()))).into_response())
}

// ---------------------------------------------------------------------------
// Form parsing
// ---------------------------------------------------------------------------

/// Raw fields of the plan form.
#[derive(Debug, Default)]
struct PlanForm {
    exam_date: Option<NaiveDate>,
    daily_hours: u32,
    syllabus_text: Option<String>,
    syllabus_pdf: Option<Vec<u8>>,
}

async fn read_plan_form(mut multipart: Multipart) -> Result<PlanForm, AppError> {
    let mut form = PlanForm {
        daily_hours: DEFAULT_DAILY_HOURS,
        ..PlanForm::default()
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "syllabus_pdf" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request(e.body_text()))?;
                form.syllabus_pdf = Some(bytes.to_vec());
            }
            "syllabus_text" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(e.body_text()))?;
                form.syllabus_text = Some(value);
            }
            "exam_date" | "daily_hours" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(e.body_text()))?;
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                if name == "exam_date" {
                    let date = value.parse().map_err(|_| {
                        AppError::bad_request(format!("invalid exam date: {value:?}"))
                    })?;
                    form.exam_date = Some(date);
                } else {
                    form.daily_hours = value.parse().map_err(|_| {
                        AppError::bad_request(format!("invalid daily hours: {value:?}"))
                    })?;
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index(State(planner): State<AppState>) -> Result<Response, AppError> {
    render(&planner, StatusCode::OK, None).await
}

async fn submit_plan(
    State(planner): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_plan_form(multipart).await?;

    let source = SyllabusSource::choose(form.syllabus_pdf, form.syllabus_text);
    let syllabus = tokio::task::spawn_blocking(move || source.into_text())
        .await
        .map_err(|e| AppError::internal(e.into()))?;

    let request = match PlanRequest::new(syllabus, form.exam_date, form.daily_hours) {
        Ok(request) => request,
        Err(e) => {
            tracing::info!(error = %e, "plan request rejected");
            let notice = Notice::Warning(e.to_string());
            return render(&planner, StatusCode::UNPROCESSABLE_ENTITY, Some(notice)).await;
        }
    };

    let notice = match planner.submit(&request).await.map_err(AppError::internal)? {
        SubmitOutcome::Generated { plan_text, .. } => Notice::Generated(plan_text),
        SubmitOutcome::Failed { message } => Notice::Failed(message),
    };
    render(&planner, StatusCode::OK, Some(notice)).await
}

#[derive(Debug, Deserialize)]
struct ToggleForm {
    done: Option<String>,
}

async fn toggle_task(
    State(planner): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<ToggleForm>,
) -> Result<Redirect, AppError> {
    planner
        .toggle(id, form.done.is_some())
        .await
        .map_err(AppError::internal)?;
    Ok(Redirect::to("/"))
}

async fn reset_tasks(State(planner): State<AppState>) -> Result<Redirect, AppError> {
    planner.reset().await.map_err(AppError::internal)?;
    Ok(Redirect::to("/"))
}

async fn list_tasks(State(planner): State<AppState>) -> Result<Response, AppError> {
    let tasks = planner.tasks().await.map_err(AppError::internal)?;
    Ok(Json(tasks).into_response())
}

async fn healthz() -> &'static str {
    "ok"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
