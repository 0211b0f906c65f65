//! The `BatchWorker` trait — the contract every worker invoker must fulfil.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::WorkerError;

/// Per-invocation context handed to the worker by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    /// ID of the workflow run this invocation belongs to.
    pub run_id: Uuid,
    /// Sequence index of the batch being scraped.
    pub batch_index: usize,
    /// Worker build pinned for the whole run.
    pub worker_version: String,
}

/// Outcome reported by the worker itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Ok,
    Error,
}

/// Response body of a `scrape` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResult {
    pub status: WorkerStatus,
    #[serde(default)]
    pub records_written: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerResult {
    pub fn ok(records_written: u64) -> Self {
        Self { status: WorkerStatus::Ok, records_written, error: None }
    }

    /// Turn a self-reported failure into a `WorkerError`.
    pub fn into_result(self) -> Result<Self, WorkerError> {
        match self.status {
            WorkerStatus::Ok => Ok(self),
            WorkerStatus::Error => Err(WorkerError::Failed(
                self.error.unwrap_or_else(|| "worker reported an error without a cause".into()),
            )),
        }
    }
}

/// The core worker trait.
///
/// Implementations are invoked once per batch, strictly one at a time.
#[async_trait]
pub trait BatchWorker: Send + Sync {
    /// Human-readable worker name, used in logs.
    fn name(&self) -> &str;

    /// Resolve the worker build to pin for a new run.
    ///
    /// Called once when a run starts; every batch of that run is invoked with
    /// the returned version.
    fn version(&self) -> String;

    /// Scrape the given schools and report completion.
    async fn scrape(
        &self,
        schools: &[String],
        ctx: &InvocationContext,
    ) -> Result<WorkerResult, WorkerError>;
}
