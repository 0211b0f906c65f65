//! `db` crate — workflow run history.
//!
//! Provides the [`RunStore`] seam the orchestrator records progress through,
//! an in-memory implementation, and Postgres repository functions behind
//! [`PgRunStore`]. No orchestration logic lives here.

pub mod error;
pub mod models;
pub mod pool;
pub mod repository;
pub mod store;

pub use error::DbError;
pub use models::{BatchAttemptRow, NewBatchAttempt, NewRun, RunStatus, WorkflowRunRow};
pub use pool::DbPool;
pub use store::{MemoryRunStore, PgRunStore, RunStore};
