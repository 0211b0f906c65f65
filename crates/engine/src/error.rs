//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the engine (definition, scheduling and execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Partition plan errors ------

    /// The same school code appears in two batches (or twice in one).
    #[error("school '{0}' appears more than once in the partition plan")]
    DuplicateSchool(String),

    /// A batch of the plan has no school in it.
    #[error("batch {0} of the partition plan is empty")]
    EmptyBatch(usize),

    /// The work domain holds codes no batch covers.
    #[error("schools not covered by the partition plan: {}", .0.join(", "))]
    UncoveredSchools(Vec<String>),

    // ------ Schedule errors ------

    /// A cron field of a rule does not parse.
    #[error("schedule rule '{rule}' has an invalid {field} field: '{value}'")]
    InvalidCron {
        rule: String,
        field: &'static str,
        value: String,
    },

    /// Two rules share a name.
    #[error("duplicate schedule rule name: '{0}'")]
    DuplicateRule(String),

    // ------ Execution errors ------

    /// The state machine has no transition for this step outcome.
    #[error("no transition from state {from} on {outcome}")]
    InvalidTransition { from: String, outcome: String },

    /// A worker invocation failed; the run terminated in ERROR.
    #[error("batch {index} failed: {cause}")]
    BatchInvocation { index: usize, cause: String },

    /// Run history error from the db crate.
    #[error("run store error: {0}")]
    Store(#[from] db::DbError),

    // ------ Configuration errors ------

    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}
