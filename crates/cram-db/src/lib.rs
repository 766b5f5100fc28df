//! Task Store for cram: SQLite pool, embedded migrations, models, and queries.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
