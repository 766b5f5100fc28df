//! Shared test utilities for cram integration tests.
//!
//! Each test gets its own SQLite file inside a fresh temporary directory,
//! with migrations applied. Nothing is shared between tests.

use sqlx::SqlitePool;
use tempfile::TempDir;

use cram_db::config::DbConfig;
use cram_db::pool;

/// Create a temporary database with migrations applied.
///
/// Returns `(pool, dir)`. The database file lives inside `dir`; keep the
/// `TempDir` alive for as long as the pool is in use and pass both to
/// [`drop_test_db`] when the test is done.
pub async fn create_test_db() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir for test database");
    let config = DbConfig::for_path(&dir.path().join("cram_test.db"));

    let pool = pool::create_pool(&config)
        .await
        .unwrap_or_else(|e| panic!("failed to open test database: {e:#}"));

    pool::run_migrations(&pool)
        .await
        .expect("migrations should succeed");

    (pool, dir)
}

/// Close the pool and delete the temporary database directory.
pub async fn drop_test_db(pool: SqlitePool, dir: TempDir) {
    pool.close().await;
    let _ = dir.close();
}
