//! Core logic for cram: syllabus extraction, plan generation with a model
//! fallback chain, and syncing generated tasks into the store.

pub mod extract;
pub mod generator;
pub mod plan;
pub mod planner;
pub mod sync;
