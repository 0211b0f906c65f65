//! The `RunStore` seam and its two backends.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{BatchAttemptRow, NewBatchAttempt, NewRun, RunStatus, WorkflowRunRow};
use crate::repository::{batches, runs};
use crate::{DbError, DbPool};

/// Where the orchestrator records run progress.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: NewRun) -> Result<WorkflowRunRow, DbError>;

    async fn update_cursor(&self, run_id: Uuid, current_batch: i32) -> Result<(), DbError>;

    async fn record_batch(&self, attempt: NewBatchAttempt) -> Result<BatchAttemptRow, DbError>;

    async fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        last_error: Option<&str>,
    ) -> Result<(), DbError>;

    async fn get_run(&self, run_id: Uuid) -> Result<WorkflowRunRow, DbError>;

    /// Most recent runs first.
    async fn list_runs(&self, limit: i64) -> Result<Vec<WorkflowRunRow>, DbError>;

    async fn list_batches(&self, run_id: Uuid) -> Result<Vec<BatchAttemptRow>, DbError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    runs: HashMap<Uuid, WorkflowRunRow>,
    batches: Vec<BatchAttemptRow>,
}

/// Process-local run history, lost on restart.
#[derive(Default)]
pub struct MemoryRunStore {
    state: RwLock<MemoryState>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create_run(&self, run: NewRun) -> Result<WorkflowRunRow, DbError> {
        let row = WorkflowRunRow {
            id: Uuid::new_v4(),
            state_machine: run.state_machine,
            trigger: run.trigger,
            worker_version: run.worker_version,
            status: RunStatus::Running.to_string(),
            current_batch: 0,
            last_error: None,
            started_at: Utc::now(),
            finished_at: None,
        };
        self.state.write().await.runs.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_cursor(&self, run_id: Uuid, current_batch: i32) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        let run = state.runs.get_mut(&run_id).ok_or(DbError::NotFound)?;
        run.current_batch = current_batch;
        Ok(())
    }

    async fn record_batch(&self, attempt: NewBatchAttempt) -> Result<BatchAttemptRow, DbError> {
        let mut state = self.state.write().await;
        if !state.runs.contains_key(&attempt.run_id) {
            return Err(DbError::NotFound);
        }
        let row = BatchAttemptRow {
            id: Uuid::new_v4(),
            run_id: attempt.run_id,
            batch_index: attempt.batch_index,
            schools: attempt.schools,
            status: if attempt.succeeded { "succeeded" } else { "failed" }.to_string(),
            records_written: attempt.records_written,
            error: attempt.error,
            started_at: attempt.started_at,
            finished_at: Utc::now(),
        };
        state.batches.push(row.clone());
        Ok(row)
    }

    async fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        last_error: Option<&str>,
    ) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        let run = state.runs.get_mut(&run_id).ok_or(DbError::NotFound)?;
        run.status = status.to_string();
        run.last_error = last_error.map(str::to_owned);
        run.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<WorkflowRunRow, DbError> {
        self.state.read().await.runs.get(&run_id).cloned().ok_or(DbError::NotFound)
    }

    async fn list_runs(&self, limit: i64) -> Result<Vec<WorkflowRunRow>, DbError> {
        let state = self.state.read().await;
        let mut rows: Vec<WorkflowRunRow> = state.runs.values().cloned().collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn list_batches(&self, run_id: Uuid) -> Result<Vec<BatchAttemptRow>, DbError> {
        let state = self.state.read().await;
        let mut rows: Vec<BatchAttemptRow> =
            state.batches.iter().filter(|b| b.run_id == run_id).cloned().collect();
        rows.sort_by_key(|b| b.batch_index);
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// Run history persisted in Postgres through the repository functions.
#[derive(Clone)]
pub struct PgRunStore {
    pool: DbPool,
}

impl PgRunStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn create_run(&self, run: NewRun) -> Result<WorkflowRunRow, DbError> {
        runs::create_run(&self.pool, &run).await
    }

    async fn update_cursor(&self, run_id: Uuid, current_batch: i32) -> Result<(), DbError> {
        runs::update_cursor(&self.pool, run_id, current_batch).await
    }

    async fn record_batch(&self, attempt: NewBatchAttempt) -> Result<BatchAttemptRow, DbError> {
        batches::insert_attempt(&self.pool, &attempt).await
    }

    async fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        last_error: Option<&str>,
    ) -> Result<(), DbError> {
        runs::finish_run(&self.pool, run_id, status, last_error).await
    }

    async fn get_run(&self, run_id: Uuid) -> Result<WorkflowRunRow, DbError> {
        runs::get_run(&self.pool, run_id).await
    }

    async fn list_runs(&self, limit: i64) -> Result<Vec<WorkflowRunRow>, DbError> {
        runs::list_runs(&self.pool, limit).await
    }

    async fn list_batches(&self, run_id: Uuid) -> Result<Vec<BatchAttemptRow>, DbError> {
        batches::list_attempts(&self.pool, run_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_run(trigger: &str) -> NewRun {
        NewRun {
            state_machine: "syllabus-scraper".into(),
            trigger: trigger.into(),
            worker_version: "12".into(),
        }
    }

    #[tokio::test]
    async fn run_lifecycle_is_recorded() {
        let store = MemoryRunStore::new();
        let run = store.create_run(new_run("manual")).await.unwrap();
        assert_eq!(run.run_status().unwrap(), RunStatus::Running);

        store.update_cursor(run.id, 3).await.unwrap();
        store
            .record_batch(NewBatchAttempt {
                run_id: run.id,
                batch_index: 3,
                schools: vec!["ASE".into(), "CSE".into()],
                succeeded: false,
                records_written: 0,
                error: Some("worker failed: boom".into()),
                started_at: Utc::now(),
            })
            .await
            .unwrap();
        store.finish_run(run.id, RunStatus::Failed, Some("worker failed: boom")).await.unwrap();

        let stored = store.get_run(run.id).await.unwrap();
        assert_eq!(stored.current_batch, 3);
        assert_eq!(stored.run_status().unwrap(), RunStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("worker failed: boom"));
        assert!(stored.finished_at.is_some());

        let batches = store.list_batches(run.id).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].status, "failed");
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let store = MemoryRunStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(store.get_run(missing).await, Err(DbError::NotFound)));
        assert!(matches!(store.update_cursor(missing, 1).await, Err(DbError::NotFound)));
        assert!(matches!(
            store.finish_run(missing, RunStatus::Succeeded, None).await,
            Err(DbError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_runs_is_newest_first_and_limited() {
        let store = MemoryRunStore::new();
        let first = store.create_run(new_run("schedule:regular")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create_run(new_run("manual")).await.unwrap();

        let rows = store.list_runs(10).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second.id, first.id]);
        assert_eq!(store.list_runs(1).await.unwrap().len(), 1);
    }
}
