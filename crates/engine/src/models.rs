//! Core domain models for the orchestrator.
//!
//! The partition plan and the work domain are fixed when the state machine is
//! defined; runs only ever read them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use db::{DbError, RunStatus, WorkflowRunRow};

// ---------------------------------------------------------------------------
// WorkDomain
// ---------------------------------------------------------------------------

/// Ordered set of school codes to scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkDomain(Vec<String>);

impl WorkDomain {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(codes.into_iter().map(Into::into).collect())
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Batch / PartitionPlan
// ---------------------------------------------------------------------------

/// Schools handed to one worker invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Sequence index, `0..N-1`.
    pub index: usize,
    pub schools: Vec<String>,
}

/// Hand-authored grouping of school codes by expected scrape cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionPlan {
    pub batches: Vec<Vec<String>>,
}

impl PartitionPlan {
    pub fn new<S: Into<String>>(batches: Vec<Vec<S>>) -> Self {
        Self {
            batches: batches
                .into_iter()
                .map(|batch| batch.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// The syllabus scraper's plan. Membership and order are load-bearing:
    /// a code missing here is never scraped.
    pub fn syllabus() -> Self {
        Self::new(vec![
            vec!["GEC"],
            vec!["CMS", "HSS"],
            vec!["EDU", "FSE"],
            vec!["ASE", "CSE"],
            vec!["PSE", "G_ASE", "LAW"],
            vec!["G_FSE", "SOC", "SSS"],
            vec!["G_LAS", "G_CSE", "G_EDU", "HUM"],
            vec!["SILS", "G_HUM", "CJL", "SPS", "G_WBS", "G_PS"],
            vec![
                "G_SPS", "G_IPS", "G_WLS", "G_E", "G_SSS", "G_SC", "G_LAW", "G_SAPS",
                "G_SA", "G_SJAL", "G_SICCS", "G_SEEE", "EHUM", "ART", "CIE", "G_ITS",
            ],
        ])
    }

    /// Every code of the plan, in plan order.
    pub fn domain(&self) -> WorkDomain {
        WorkDomain::new(self.batches.iter().flatten().cloned())
    }
}

impl Default for PartitionPlan {
    fn default() -> Self {
        Self::syllabus()
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// How a run was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// A calendar rule fired.
    Schedule {
        /// Name of the rule.
        rule: String,
    },
    /// Started by an operator.
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schedule { rule } => write!(f, "schedule:{rule}"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowRun
// ---------------------------------------------------------------------------

/// One execution of the orchestrator's state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub state_machine: String,
    pub trigger: String,
    pub worker_version: String,
    pub status: RunStatus,
    pub current_batch: usize,
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<WorkflowRunRow> for WorkflowRun {
    type Error = DbError;

    fn try_from(row: WorkflowRunRow) -> Result<Self, Self::Error> {
        let current_batch =
            usize::try_from(row.current_batch).map_err(|_| DbError::InvalidCursor(row.current_batch))?;
        Ok(Self {
            status: row.run_status()?,
            id: row.id,
            state_machine: row.state_machine,
            trigger: row.trigger,
            worker_version: row.worker_version,
            current_batch,
            last_error: row.last_error,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syllabus_plan_has_nine_batches_of_one_to_sixteen() {
        let plan = PartitionPlan::syllabus();
        assert_eq!(plan.batches.len(), 9);
        let sizes: Vec<usize> = plan.batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![1, 2, 2, 2, 3, 3, 4, 6, 16]);
        assert_eq!(plan.domain().len(), 39);
    }

    #[test]
    fn trigger_renders_for_history() {
        assert_eq!(Trigger::Schedule { rule: "fall-reg1".into() }.to_string(), "schedule:fall-reg1");
        assert_eq!(Trigger::Manual.to_string(), "manual");
    }

    #[test]
    fn run_row_converts_to_domain_run() {
        let row = WorkflowRunRow {
            id: Uuid::new_v4(),
            state_machine: "syllabus-scraper".into(),
            trigger: "manual".into(),
            worker_version: "4".into(),
            status: "FAILED".into(),
            current_batch: 5,
            last_error: Some("worker failed: boom".into()),
            started_at: Utc::now(),
            finished_at: Some(Utc::now()),
        };
        let run = WorkflowRun::try_from(row.clone()).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.current_batch, 5);

        let corrupt = WorkflowRunRow { current_batch: -1, ..row };
        assert!(matches!(WorkflowRun::try_from(corrupt), Err(DbError::InvalidCursor(-1))));
    }
}
