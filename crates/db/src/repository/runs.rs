//! Workflow run repository functions.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{NewRun, RunStatus, WorkflowRunRow},
    DbError,
};

const RUN_COLUMNS: &str =
    "id, state_machine, trigger, worker_version, status, current_batch, last_error, started_at, finished_at";

/// Create a new workflow run record in `RUNNING` status.
pub async fn create_run(pool: &PgPool, run: &NewRun) -> Result<WorkflowRunRow, DbError> {
    let sql = format!(
        "INSERT INTO workflow_runs (id, state_machine, trigger, worker_version, status, current_batch, started_at) \
         VALUES ($1, $2, $3, $4, $5, 0, $6) \
         RETURNING {RUN_COLUMNS}"
    );

    let row = sqlx::query_as::<_, WorkflowRunRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(&run.state_machine)
        .bind(&run.trigger)
        .bind(&run.worker_version)
        .bind(RunStatus::Running.to_string())
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Move the progress cursor of a run.
pub async fn update_cursor(pool: &PgPool, run_id: Uuid, current_batch: i32) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE workflow_runs SET current_batch = $1 WHERE id = $2")
        .bind(current_batch)
        .bind(run_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Set the terminal status (and last error) of a run.
pub async fn finish_run(
    pool: &PgPool,
    run_id: Uuid,
    status: RunStatus,
    last_error: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE workflow_runs SET status = $1, last_error = $2, finished_at = $3 WHERE id = $4",
    )
    .bind(status.to_string())
    .bind(last_error)
    .bind(Utc::now())
    .bind(run_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Fetch a single run by its primary key.
pub async fn get_run(pool: &PgPool, run_id: Uuid) -> Result<WorkflowRunRow, DbError> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM workflow_runs WHERE id = $1");

    sqlx::query_as::<_, WorkflowRunRow>(&sql)
        .bind(run_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Return the most recent runs, newest first.
pub async fn list_runs(pool: &PgPool, limit: i64) -> Result<Vec<WorkflowRunRow>, DbError> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM workflow_runs ORDER BY started_at DESC LIMIT $1");

    let rows = sqlx::query_as::<_, WorkflowRunRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
