//! Text-generation backends.
//!
//! The plan generator only needs one capability from the outside world:
//! given a model identifier and a prompt, return some text. That seam is
//! the [`TextGenerator`] trait; [`GeminiClient`] is the production
//! implementation and tests substitute scripted ones.
//!
//! ```text
//! PlanGenerator
//!     |  for model in chain:
//!     v
//! &dyn TextGenerator --generate(model, prompt)--> Result<Option<String>>
//! ```

pub mod gemini;
pub mod trait_def;

pub use gemini::{GeminiClient, GenerateError};
pub use trait_def::TextGenerator;
