//! The `TextGenerator` trait -- the adapter interface for generation APIs.

use anyhow::Result;
use async_trait::async_trait;

/// A backend that turns a prompt into text using a named model.
///
/// The trait is object-safe so the plan generator can hold an
/// `Arc<dyn TextGenerator>` and tests can swap in fakes.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable backend name (e.g. "gemini"), used in logs.
    fn name(&self) -> &str;

    /// Run one generation call against `model`.
    ///
    /// `Ok(None)` means the call succeeded but produced no text. Transport,
    /// quota, and validation failures are `Err`.
    async fn generate(&self, model: &str, prompt: &str) -> Result<Option<String>>;
}

// Compile-time assertion: TextGenerator must be usable as `dyn TextGenerator`.
const _: () = {
    fn _assert_object_safe(_: &dyn TextGenerator) {}
};
