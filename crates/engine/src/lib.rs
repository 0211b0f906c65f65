//! `engine` crate — batch partitioning, the schedule, the workflow state
//! machine and the orchestrator that drives it.

pub mod models;
pub mod error;
pub mod partition;
pub mod schedule;
pub mod scheduler;
pub mod machine;
pub mod executor;
pub mod config;

pub use models::{Batch, PartitionPlan, Trigger, WorkDomain, WorkflowRun};
pub use error::EngineError;
pub use partition::{partition, validate_plan};
pub use schedule::{CronSpec, ScheduleRule};
pub use scheduler::Scheduler;
pub use machine::{Outcome, State, StateMachineDefinition};
pub use executor::{Orchestrator, OrchestratorConfig, RunReport, StartRun};
pub use config::PipelineConfig;
pub use db::RunStatus;
