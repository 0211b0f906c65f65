//! Workflow execution engine.
//!
//! `Orchestrator` is the driver loop over a [`StateMachineDefinition`]:
//! 1. Opens a run in the store, pinning the worker version for its lifetime.
//! 2. Interprets states from `START`, suspending on every worker invocation.
//! 3. Publishes lifecycle events and execution status changes to the topic.
//! 4. Routes the first batch failure to `ERROR`; no retries, remaining
//!    batches are not invoked.
//! 5. A run-store failure also ends in `ERROR` and is returned to the caller.
//!
//! Overlapping runs are not prevented; each trigger gets an independent run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use db::{NewBatchAttempt, NewRun, RunStatus, RunStore, WorkflowRunRow};
use status::{
    ExecutionStatus, ExecutionStatusChange, LifecycleMessages, Notification, StatusEvent,
    StatusEventKind, StatusTopic,
};
use workers::{BatchWorker, InvocationContext, WorkerResult};

use crate::machine::{Outcome, State, StateMachineDefinition};
use crate::models::{Batch, Trigger};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Region reported in execution status changes.
    pub region: String,
    pub messages: LifecycleMessages,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            region: "ap-northeast-1".into(),
            messages: LifecycleMessages::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output of a completed run
// ---------------------------------------------------------------------------

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    /// Terminal state reached: `END` or `ERROR`.
    pub final_state: State,
    /// Batch indices invoked, in order; includes the failing one.
    pub executed: Vec<usize>,
    pub records_written: u64,
    /// Cause of the failure, verbatim from the worker.
    pub last_error: Option<String>,
}

impl RunReport {
    /// Turn a failed run into [`EngineError::BatchInvocation`].
    pub fn into_result(self) -> Result<Self, EngineError> {
        match (self.status, &self.last_error) {
            (RunStatus::Failed, Some(cause)) => Err(EngineError::BatchInvocation {
                index: self.executed.last().copied().unwrap_or_default(),
                cause: cause.clone(),
            }),
            _ => Ok(self),
        }
    }
}

// ---------------------------------------------------------------------------
// StartRun
// ---------------------------------------------------------------------------

/// The trigger interface: start a run and return its id without waiting.
#[async_trait]
pub trait StartRun: Send + Sync {
    async fn start_run(&self, trigger: Trigger) -> Result<Uuid, EngineError>;
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives runs of one state machine definition.
///
/// Cheap to clone; clones share the definition, the worker, the store, the
/// topic and the in-flight counter.
#[derive(Clone)]
pub struct Orchestrator {
    definition: Arc<StateMachineDefinition>,
    worker: Arc<dyn BatchWorker>,
    store: Arc<dyn RunStore>,
    topic: StatusTopic,
    config: OrchestratorConfig,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight counter when a run ends, however it ends.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mutable progress of one run inside the driver loop.
struct Progress {
    executed: Vec<usize>,
    records_written: u64,
    last_error: Option<String>,
}

impl Orchestrator {
    pub fn new(
        definition: StateMachineDefinition,
        worker: Arc<dyn BatchWorker>,
        store: Arc<dyn RunStore>,
        topic: StatusTopic,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            definition: Arc::new(definition),
            worker,
            store,
            topic,
            config,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn definition(&self) -> &StateMachineDefinition {
        &self.definition
    }

    pub fn store(&self) -> Arc<dyn RunStore> {
        Arc::clone(&self.store)
    }

    /// Number of runs currently executing.
    pub fn runs_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Start a run and drive it to a terminal state.
    ///
    /// # Errors
    /// Only run-store or definition errors; a failed batch is reported through
    /// [`RunReport::status`], not as an `Err`.
    pub async fn run(&self, trigger: Trigger) -> Result<RunReport, EngineError> {
        let run = self.open_run(&trigger).await?;
        self.drive(run, trigger).await
    }

    async fn open_run(&self, trigger: &Trigger) -> Result<WorkflowRunRow, EngineError> {
        let worker_version = self.worker.version();
        let run = self
            .store
            .create_run(NewRun {
                state_machine: self.definition.name().to_string(),
                trigger: trigger.to_string(),
                worker_version,
            })
            .await?;

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        if running > 1 {
            warn!(
                "{} runs of '{}' now in flight; overlapping runs are not prevented",
                running,
                self.definition.name()
            );
        }
        Ok(run)
    }

    #[instrument(skip(self, run, trigger), fields(run_id = %run.id, trigger = %trigger))]
    async fn drive(&self, run: WorkflowRunRow, trigger: Trigger) -> Result<RunReport, EngineError> {
        let _guard = InFlight(Arc::clone(&self.in_flight));
        let run_id = run.id;

        info!(
            "run started: {} batches, worker '{}' pinned at version {}",
            self.definition.batches().len(),
            self.worker.name(),
            run.worker_version
        );

        let mut progress = Progress { executed: Vec::new(), records_written: 0, last_error: None };
        match self.advance(run_id, &run.worker_version, &mut progress).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.abort(run_id, &progress, &e).await;
                Err(e)
            }
        }
    }

    /// Interpret states from `START` until a terminal state is reached.
    ///
    /// The terminal states write the run's final status before publishing, so
    /// an `Err` from here means no terminal notification went out yet.
    async fn advance(
        &self,
        run_id: Uuid,
        worker_version: &str,
        progress: &mut Progress,
    ) -> Result<RunReport, EngineError> {
        let messages = &self.config.messages;
        let mut state = self.definition.initial();

        loop {
            let outcome = match state {
                State::Start => {
                    self.publish_event(StatusEventKind::Start, messages.start(), run_id);
                    self.publish_execution(run_id, ExecutionStatus::Running);
                    Outcome::Succeeded
                }

                State::Batch(index) => {
                    let batch = self.definition.batch(index).ok_or_else(|| {
                        EngineError::InvalidTransition {
                            from: state.to_string(),
                            outcome: "missing batch".into(),
                        }
                    })?;

                    self.store.update_cursor(run_id, index as i32).await?;
                    progress.executed.push(index);

                    let ctx = InvocationContext {
                        run_id,
                        batch_index: index,
                        worker_version: worker_version.to_string(),
                    };
                    match self.invoke_batch(batch, &ctx).await? {
                        Ok(result) => {
                            progress.records_written += result.records_written;
                            Outcome::Succeeded
                        }
                        Err(cause) => {
                            progress.last_error = Some(cause);
                            Outcome::Failed
                        }
                    }
                }

                State::End => {
                    self.store.finish_run(run_id, RunStatus::Succeeded, None).await?;
                    self.publish_event(StatusEventKind::End, messages.end(), run_id);
                    self.publish_execution(run_id, ExecutionStatus::Succeeded);
                    info!(
                        "run finished: {} batches, {} records written",
                        progress.executed.len(),
                        progress.records_written
                    );
                    return Ok(self.report(run_id, RunStatus::Succeeded, state, progress));
                }

                State::Error => {
                    let cause = progress.last_error.clone().unwrap_or_default();
                    self.store.finish_run(run_id, RunStatus::Failed, Some(&cause)).await?;
                    self.publish_event(StatusEventKind::Error, messages.error(&cause), run_id);
                    self.publish_execution(run_id, ExecutionStatus::Failed);
                    error!(
                        "run failed after {} of {} batches: {}",
                        progress.executed.len(),
                        self.definition.batches().len(),
                        cause
                    );
                    return Ok(self.report(run_id, RunStatus::Failed, state, progress));
                }
            };

            state = self.definition.next(state, outcome).ok_or_else(|| {
                EngineError::InvalidTransition { from: state.to_string(), outcome: outcome.to_string() }
            })?;
        }
    }

    /// Take a run the driver could not finish to ERROR anyway.
    ///
    /// Publishes the ERROR event and the FAILED status change, then records the
    /// failure if the store still accepts writes.
    async fn abort(&self, run_id: Uuid, progress: &Progress, err: &EngineError) {
        let cause = progress.last_error.clone().unwrap_or_else(|| err.to_string());
        error!("run aborted after {} batches: {}", progress.executed.len(), err);

        self.publish_event(StatusEventKind::Error, self.config.messages.error(&cause), run_id);
        if let Err(e) = self.store.finish_run(run_id, RunStatus::Failed, Some(&cause)).await {
            warn!("could not record the aborted run as failed: {}", e);
        }
        self.publish_execution(run_id, ExecutionStatus::Failed);
    }

    /// Invoke the worker for one batch and record the attempt.
    ///
    /// The outer `Result` carries store errors; the inner one is the step
    /// outcome, with the failure cause as text.
    #[instrument(skip(self, batch, ctx), fields(batch = batch.index))]
    async fn invoke_batch(
        &self,
        batch: &Batch,
        ctx: &InvocationContext,
    ) -> Result<Result<WorkerResult, String>, EngineError> {
        info!("invoking worker for {:?}", batch.schools);
        let started_at = Utc::now();

        let outcome = self
            .worker
            .scrape(&batch.schools, ctx)
            .await
            .map_err(|e| e.to_string());

        let (records_written, error) = match &outcome {
            Ok(result) => {
                info!("batch {} succeeded, {} records written", batch.index, result.records_written);
                (result.records_written, None)
            }
            Err(cause) => {
                error!("batch {} failed: {}", batch.index, cause);
                (0, Some(cause.clone()))
            }
        };

        self.store
            .record_batch(NewBatchAttempt {
                run_id: ctx.run_id,
                batch_index: batch.index as i32,
                schools: batch.schools.clone(),
                succeeded: outcome.is_ok(),
                records_written: i64::try_from(records_written).unwrap_or(i64::MAX),
                error,
                started_at,
            })
            .await?;

        Ok(outcome)
    }

    fn publish_event(&self, kind: StatusEventKind, message: String, run_id: Uuid) {
        self.topic.publish(Notification::Lifecycle(StatusEvent::new(kind, message, run_id)));
    }

    fn publish_execution(&self, run_id: Uuid, status: ExecutionStatus) {
        self.topic.publish(Notification::Execution(ExecutionStatusChange {
            name: run_id.to_string(),
            status,
            execution_arn: format!("{}:{}", self.definition.name(), run_id),
            region: self.config.region.clone(),
        }));
    }

    fn report(&self, run_id: Uuid, status: RunStatus, final_state: State, progress: &mut Progress) -> RunReport {
        RunReport {
            run_id,
            status,
            final_state,
            executed: std::mem::take(&mut progress.executed),
            records_written: progress.records_written,
            last_error: progress.last_error.take(),
        }
    }
}

#[async_trait]
impl StartRun for Orchestrator {
    /// Open the run, then drive it on a background task.
    async fn start_run(&self, trigger: Trigger) -> Result<Uuid, EngineError> {
        let run = self.open_run(&trigger).await?;
        let run_id = run.id;

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.drive(run, trigger).await {
                error!("run {} aborted: {}", run_id, e);
            }
        });

        Ok(run_id)
    }
}
