//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no orchestration behaviour.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// workflow_runs
// ---------------------------------------------------------------------------

/// Terminal status of a workflow run (`RUNNING` until it terminates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running   => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed    => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = DbError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING"   => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED"    => Ok(Self::Failed),
            other       => Err(DbError::InvalidStatus(other.to_string())),
        }
    }
}

/// Values needed to open a new run.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub state_machine: String,
    /// Rendered trigger, e.g. `schedule:fall-reg1` or `manual`.
    pub trigger: String,
    pub worker_version: String,
}

/// A persisted workflow run row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct WorkflowRunRow {
    pub id: Uuid,
    pub state_machine: String,
    pub trigger: String,
    pub worker_version: String,
    pub status: String,
    /// Index of the batch currently (or last) executing.
    pub current_batch: i32,
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowRunRow {
    pub fn run_status(&self) -> Result<RunStatus, DbError> {
        self.status.parse()
    }
}

// ---------------------------------------------------------------------------
// batch_attempts
// ---------------------------------------------------------------------------

/// Values recorded once a batch invocation returns.
#[derive(Debug, Clone)]
pub struct NewBatchAttempt {
    pub run_id: Uuid,
    pub batch_index: i32,
    pub schools: Vec<String>,
    pub succeeded: bool,
    pub records_written: i64,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// A persisted batch attempt row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BatchAttemptRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub batch_index: i32,
    pub schools: Vec<String>,
    /// `succeeded` or `failed`.
    pub status: String,
    pub records_written: i64,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_text_round_trip() {
        for status in [RunStatus::Running, RunStatus::Succeeded, RunStatus::Failed] {
            assert_eq!(status.to_string().parse::<RunStatus>().unwrap(), status);
        }
        assert!(matches!("DONE".parse::<RunStatus>(), Err(DbError::InvalidStatus(s)) if s == "DONE"));
    }

    #[test]
    fn only_running_is_non_terminal() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
