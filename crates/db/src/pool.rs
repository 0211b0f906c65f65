//! Postgres pool for the run history.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::DbError;

pub type DbPool = PgPool;

/// Longest wait for a free connection before a store call fails.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect the run-history pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    info!("connecting run history database (max_connections={})", max_connections);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Create or upgrade the `workflow_runs` and `batch_attempts` tables from the
/// workspace `migrations/` directory, embedded at build time.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    info!("migrating run history schema");
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
