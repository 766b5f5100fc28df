//! Plan generation against an ordered chain of model candidates.
//!
//! Each candidate gets exactly one attempt, in order. The first non-empty
//! response wins, unless it is itself `ERROR:`-tagged, which counts as a
//! failure. If none produce text the result carries the last recorded
//! failure. There is no retry or backoff beyond walking the chain.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use crate::generator::TextGenerator;

use super::prompt::build_prompt;
use super::request::PlanRequest;

/// Prefix marking a failed generation in rendered plan text.
pub const ERROR_TAG: &str = "ERROR:";

/// Model identifiers tried when no chain is configured.
pub const DEFAULT_MODELS: &[&str] = &[
    "models/gemini-2.0-flash",
    "models/gemini-2.5-flash",
    "gemini-2.0-flash",
    "gemini-2.5-flash",
];

/// Whether a rendered plan string is a failure.
pub fn is_error_text(text: &str) -> bool {
    text.starts_with(ERROR_TAG)
}

/// Outcome of one `generate_plan` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanResult {
    /// Raw plan text from the first model that produced any.
    Generated(String),
    /// Every candidate failed; the reason is the last failure seen.
    Failed(String),
}

impl PlanResult {
    /// Render as the single string the display shell shows: the plan text,
    /// or `ERROR: <reason>`.
    pub fn into_text(self) -> String {
        match self {
            Self::Generated(text) => text,
            Self::Failed(reason) => format!("{ERROR_TAG} {reason}"),
        }
    }
}

impl fmt::Display for PlanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generated(text) => f.write_str(text),
            Self::Failed(reason) => write!(f, "{ERROR_TAG} {reason}"),
        }
    }
}

/// Builds prompts and walks the model chain, memoizing successes.
pub struct PlanGenerator {
    backend: Arc<dyn TextGenerator>,
    models: Vec<String>,
    attempt_timeout: Option<Duration>,
    cache: Mutex<HashMap<PlanRequest, String>>,
}

impl fmt::Debug for PlanGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanGenerator")
            .field("backend", &self.backend.name())
            .field("models", &self.models)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

impl PlanGenerator {
    /// Create a generator that tries `models` in order.
    pub fn new(backend: Arc<dyn TextGenerator>, models: Vec<String>) -> Self {
        Self {
            backend,
            models,
            attempt_timeout: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Create a generator using [`DEFAULT_MODELS`].
    pub fn with_default_models(backend: Arc<dyn TextGenerator>) -> Self {
        Self::new(
            backend,
            DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        )
    }

    /// Bound each individual attempt. A timed-out attempt counts as a
    /// failure and the chain moves on.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// The configured fallback chain.
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Generate a plan for `request`.
    ///
    /// Identical requests are answered from the in-process cache without
    /// calling the backend. Only successes are cached.
    pub async fn generate_plan(&self, request: &PlanRequest) -> PlanResult {
        if let Some(text) = self.cached(request) {
            debug!("plan cache hit");
            return PlanResult::Generated(text);
        }

        let prompt = build_prompt(request);
        let mut last_failure = String::from("no model candidates configured");

        for model in &self.models {
            match self.attempt(model, &prompt).await {
                Ok(Some(text)) if is_error_text(&text) => {
                    let first_line = text.lines().next().unwrap_or_default();
                    warn!(model = %model, reply = %first_line, "model replied with error text");
                    last_failure = format!("{model} replied with error text: {first_line}");
                }
                Ok(Some(text)) if !text.is_empty() => {
                    info!(
                        backend = self.backend.name(),
                        model = %model,
                        chars = text.chars().count(),
                        "plan generated"
                    );
                    self.remember(request, &text);
                    return PlanResult::Generated(text);
                }
                Ok(_) => {
                    warn!(model = %model, "model returned an empty response");
                    last_failure = format!("{model} returned an empty response");
                }
                Err(e) => {
                    warn!(model = %model, error = %format!("{e:#}"), "model attempt failed");
                    last_failure = format!("{model}: {e:#}");
                }
            }
        }

        warn!(
            candidates = self.models.len(),
            reason = %last_failure,
            "all model candidates failed"
        );
        PlanResult::Failed(last_failure)
    }

    async fn attempt(&self, model: &str, prompt: &str) -> Result<Option<String>> {
        let call = self.backend.generate(model, prompt);
        match self.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| anyhow!("timed out after {limit:?}"))?,
            None => call.await,
        }
    }

    fn cached(&self, request: &PlanRequest) -> Option<String> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request)
            .cloned()
    }

    fn remember(&self, request: &PlanRequest, text: &str) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request.clone(), text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::bail;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    /// What a scripted model does when called.
    #[derive(Clone)]
    enum Reply {
        Text(&'static str),
        Empty,
        Missing,
        Fail(&'static str),
        Hang,
    }

    /// Backend that answers per model name and records every call.
    struct ScriptedGenerator {
        replies: HashMap<&'static str, Reply>,
        calls: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
        total: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(replies: &[(&'static str, Reply)]) -> Arc<Self> {
            Arc::new(Self {
                replies: replies.iter().cloned().collect(),
                calls: Mutex::new(VecDeque::new()),
                prompts: Mutex::new(Vec::new()),
                total: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().cloned().collect()
        }

        fn total(&self) -> usize {
            self.total.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, model: &str, prompt: &str) -> Result<Option<String>> {
            self.total.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push_back(model.to_string());
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.replies.get(model).cloned() {
                Some(Reply::Text(t)) => Ok(Some(t.to_string())),
                Some(Reply::Empty) => Ok(Some(String::new())),
                Some(Reply::Missing) => Ok(None),
                Some(Reply::Fail(msg)) => bail!("{msg}"),
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Some("too late".to_string()))
                }
                None => bail!("unknown model {model}"),
            }
        }
    }

    fn chain(models: &[&str]) -> Vec<String> {
        models.iter().map(|m| m.to_string()).collect()
    }

    fn request(syllabus: &str) -> PlanRequest {
        PlanRequest::new(syllabus, NaiveDate::from_ymd_opt(2026, 12, 15), 4).unwrap()
    }

    #[tokio::test]
    async fn first_success_wins_and_later_models_are_not_called() {
        let backend = ScriptedGenerator::new(&[
            ("a", Reply::Text("TASK: from a")),
            ("b", Reply::Text("TASK: from b")),
        ]);
        let generator = PlanGenerator::new(backend.clone(), chain(&["a", "b"]));

        let result = generator.generate_plan(&request("Optics")).await;
        assert_eq!(result, PlanResult::Generated("TASK: from a".to_string()));
        assert_eq!(backend.calls(), vec!["a"]);
    }

    #[tokio::test]
    async fn falls_back_in_order_until_one_succeeds() {
        let backend = ScriptedGenerator::new(&[
            ("a", Reply::Fail("quota exceeded")),
            ("b", Reply::Fail("model not found")),
            ("c", Reply::Text("TASK: from c")),
        ]);
        let generator = PlanGenerator::new(backend.clone(), chain(&["a", "b", "c"]));

        let result = generator.generate_plan(&request("Optics")).await;
        assert_eq!(result, PlanResult::Generated("TASK: from c".to_string()));
        assert_eq!(backend.calls(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_and_missing_text_count_as_failures() {
        let backend = ScriptedGenerator::new(&[
            ("a", Reply::Empty),
            ("b", Reply::Missing),
            ("c", Reply::Text("plan")),
        ]);
        let generator = PlanGenerator::new(backend.clone(), chain(&["a", "b", "c"]));

        let result = generator.generate_plan(&request("Optics")).await;
        assert_eq!(result, PlanResult::Generated("plan".to_string()));
        assert_eq!(backend.calls(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn all_failures_report_last_reason() {
        let backend = ScriptedGenerator::new(&[
            ("a", Reply::Fail("quota exceeded")),
            ("b", Reply::Fail("model not found")),
        ]);
        let generator = PlanGenerator::new(backend.clone(), chain(&["a", "b"]));

        let result = generator.generate_plan(&request("Optics")).await;
        assert!(matches!(result, PlanResult::Failed(_)));
        let text = result.into_text();
        assert!(is_error_text(&text), "got: {text}");
        assert!(text.contains("model not found"), "got: {text}");
        assert!(!text.contains("quota exceeded"), "got: {text}");
        assert_eq!(backend.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn error_tagged_reply_counts_as_failure() {
        let backend = ScriptedGenerator::new(&[
            ("a", Reply::Text("ERROR: I cannot plan that\nTASK: nope")),
            ("b", Reply::Text("TASK: from b")),
        ]);
        let generator = PlanGenerator::new(backend.clone(), chain(&["a", "b"]));

        let result = generator.generate_plan(&request("Optics")).await;
        assert_eq!(result, PlanResult::Generated("TASK: from b".to_string()));
        assert_eq!(backend.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn error_tagged_reply_is_reported_and_not_cached() {
        let backend =
            ScriptedGenerator::new(&[("a", Reply::Text("ERROR: I cannot plan that\nTASK: nope"))]);
        let generator = PlanGenerator::new(backend.clone(), chain(&["a"]));

        let text = generator.generate_plan(&request("Optics")).await.into_text();
        assert_eq!(text, "ERROR: a replied with error text: ERROR: I cannot plan that");

        generator.generate_plan(&request("Optics")).await;
        assert_eq!(backend.total(), 2);
    }

    #[tokio::test]
    async fn last_failure_can_be_an_empty_response() {
        let backend =
            ScriptedGenerator::new(&[("a", Reply::Fail("boom")), ("b", Reply::Empty)]);
        let generator = PlanGenerator::new(backend, chain(&["a", "b"]));

        let text = generator.generate_plan(&request("Optics")).await.into_text();
        assert_eq!(text, "ERROR: b returned an empty response");
    }

    #[tokio::test]
    async fn empty_chain_fails_without_calling_backend() {
        let backend = ScriptedGenerator::new(&[]);
        let generator = PlanGenerator::new(backend.clone(), Vec::new());

        let result = generator.generate_plan(&request("Optics")).await;
        assert_eq!(
            result.to_string(),
            "ERROR: no model candidates configured"
        );
        assert_eq!(backend.total(), 0);
    }

    #[tokio::test]
    async fn identical_requests_hit_the_cache() {
        let backend = ScriptedGenerator::new(&[("a", Reply::Text("TASK: once"))]);
        let generator = PlanGenerator::new(backend.clone(), chain(&["a"]));

        let first = generator.generate_plan(&request("Optics")).await;
        let second = generator.generate_plan(&request("Optics")).await;
        assert_eq!(first, second);
        assert_eq!(backend.total(), 1);

        // Any differing field is a different key.
        generator.generate_plan(&request("Acoustics")).await;
        let other_hours =
            PlanRequest::new("Optics", NaiveDate::from_ymd_opt(2026, 12, 15), 5).unwrap();
        generator.generate_plan(&other_hours).await;
        assert_eq!(backend.total(), 3);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let backend = ScriptedGenerator::new(&[("a", Reply::Fail("down"))]);
        let generator = PlanGenerator::new(backend.clone(), chain(&["a"]));

        generator.generate_plan(&request("Optics")).await;
        generator.generate_plan(&request("Optics")).await;
        assert_eq!(backend.total(), 2);
    }

    #[tokio::test]
    async fn every_attempt_receives_the_same_full_prompt() {
        let backend = ScriptedGenerator::new(&[("a", Reply::Fail("x")), ("b", Reply::Text("ok"))]);
        let generator = PlanGenerator::new(backend.clone(), chain(&["a", "b"]));

        let req = request("Fluid dynamics");
        generator.generate_plan(&req).await;

        let prompts = backend.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
        assert_eq!(prompts[0], build_prompt(&req));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_attempt_moves_to_next_model() {
        let backend = ScriptedGenerator::new(&[("slow", Reply::Hang), ("fast", Reply::Text("ok"))]);
        let generator = PlanGenerator::new(backend.clone(), chain(&["slow", "fast"]))
            .with_attempt_timeout(Duration::from_secs(30));

        let result = generator.generate_plan(&request("Optics")).await;
        assert_eq!(result, PlanResult::Generated("ok".to_string()));
        assert_eq!(backend.calls(), vec!["slow", "fast"]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reason_is_reported_when_chain_exhausted() {
        let backend = ScriptedGenerator::new(&[("slow", Reply::Hang)]);
        let generator = PlanGenerator::new(backend, chain(&["slow"]))
            .with_attempt_timeout(Duration::from_secs(5));

        let text = generator.generate_plan(&request("Optics")).await.into_text();
        assert_eq!(text, "ERROR: slow: timed out after 5s");
    }

    #[test]
    fn default_models_are_used_by_constructor() {
        let backend = ScriptedGenerator::new(&[]);
        let generator = PlanGenerator::with_default_models(backend);
        assert_eq!(generator.models(), DEFAULT_MODELS);
    }

    #[test]
    fn error_text_detection_is_prefix_only() {
        assert!(is_error_text("ERROR: nope"));
        assert!(!is_error_text("Day 1\nERROR: inside a plan"));
        assert!(!is_error_text("error: lowercase"));
    }
}
