//! Plan generation: request validation, prompt construction, and the model
//! fallback chain.

pub mod generate;
pub mod prompt;
pub mod request;

pub use generate::{DEFAULT_MODELS, ERROR_TAG, PlanGenerator, PlanResult, is_error_text};
pub use prompt::{SYLLABUS_CHAR_LIMIT, build_prompt, truncate_syllabus};
pub use request::{DAILY_HOURS_RANGE, DEFAULT_DAILY_HOURS, PlanRequest, PlanRequestError};
