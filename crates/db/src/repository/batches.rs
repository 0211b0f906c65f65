//! Batch attempt repository functions.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{BatchAttemptRow, NewBatchAttempt},
    DbError,
};

/// Insert a finished batch attempt.
pub async fn insert_attempt(pool: &PgPool, attempt: &NewBatchAttempt) -> Result<BatchAttemptRow, DbError> {
    let status = if attempt.succeeded { "succeeded" } else { "failed" };

    let row = sqlx::query_as::<_, BatchAttemptRow>(
        r#"
        INSERT INTO batch_attempts
            (id, run_id, batch_index, schools, status, records_written, error, started_at, finished_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, run_id, batch_index, schools, status, records_written, error, started_at, finished_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(attempt.run_id)
    .bind(attempt.batch_index)
    .bind(&attempt.schools)
    .bind(status)
    .bind(attempt.records_written)
    .bind(&attempt.error)
    .bind(attempt.started_at)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// All attempts of a run in batch order.
pub async fn list_attempts(pool: &PgPool, run_id: Uuid) -> Result<Vec<BatchAttemptRow>, DbError> {
    let rows = sqlx::query_as::<_, BatchAttemptRow>(
        r#"
        SELECT id, run_id, batch_index, schools, status, records_written, error, started_at, finished_at
        FROM batch_attempts
        WHERE run_id = $1
        ORDER BY batch_index ASC, started_at ASC
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
