//! `MockWorker` — a test double for `BatchWorker`.
//!
//! Records every batch it receives, together with the pinned version it was
//! invoked with, and the object keys a real scraper would have written.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{object_key, BatchWorker, InvocationContext, WorkerError, WorkerResult, DEFAULT_OBJECT_PREFIX};

/// Behaviour injected into `MockWorker` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Every batch succeeds, one record per school.
    Succeed,
    /// The batch with this sequence index fails, all others succeed.
    FailOnBatch { index: usize, error: WorkerError },
    /// Every batch fails.
    FailAlways(WorkerError),
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub batch_index: usize,
    pub schools: Vec<String>,
    pub worker_version: String,
}

/// A mock worker that records every call it receives and returns a
/// programmer-specified result.
pub struct MockWorker {
    pub name: String,
    pub behaviour: MockBehaviour,
    version: Mutex<String>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    written: Arc<Mutex<Vec<String>>>,
}

impl MockWorker {
    fn with_behaviour(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            version: Mutex::new("1".into()),
            calls: Arc::new(Mutex::new(Vec::new())),
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock whose every batch succeeds.
    pub fn succeeding(name: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::Succeed)
    }

    /// Create a mock that fails on the batch with sequence index `index`.
    pub fn failing_on(name: impl Into<String>, index: usize, msg: impl Into<String>) -> Self {
        Self::with_behaviour(
            name,
            MockBehaviour::FailOnBatch { index, error: WorkerError::Failed(msg.into()) },
        )
    }

    /// Create a mock that fails every batch with `error`.
    pub fn failing_always(name: impl Into<String>, error: WorkerError) -> Self {
        Self::with_behaviour(name, MockBehaviour::FailAlways(error))
    }

    /// Simulate a new worker build being deployed.
    pub fn set_version(&self, version: impl Into<String>) {
        *self.version.lock().unwrap() = version.into();
    }

    /// Number of times this worker has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// All invocations in call order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Batch indices in call order.
    pub fn invoked_batches(&self) -> Vec<usize> {
        self.calls.lock().unwrap().iter().map(|c| c.batch_index).collect()
    }

    /// Object keys written by successful invocations, in write order.
    pub fn written_keys(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchWorker for MockWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        self.version.lock().unwrap().clone()
    }

    async fn scrape(
        &self,
        schools: &[String],
        ctx: &InvocationContext,
    ) -> Result<WorkerResult, WorkerError> {
        self.calls.lock().unwrap().push(MockCall {
            batch_index: ctx.batch_index,
            schools: schools.to_vec(),
            worker_version: ctx.worker_version.clone(),
        });

        match &self.behaviour {
            MockBehaviour::FailOnBatch { index, error } if *index == ctx.batch_index => {
                Err(error.clone())
            }
            MockBehaviour::FailAlways(error) => Err(error.clone()),
            _ => {
                let mut written = self.written.lock().unwrap();
                for school in schools {
                    written.push(object_key(DEFAULT_OBJECT_PREFIX, school));
                }
                Ok(WorkerResult::ok(schools.len() as u64))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ctx(batch_index: usize) -> InvocationContext {
        InvocationContext { run_id: Uuid::new_v4(), batch_index, worker_version: "7".into() }
    }

    #[tokio::test]
    async fn failing_on_only_fails_the_chosen_batch() {
        let worker = MockWorker::failing_on("scraper", 1, "boom");
        let schools = vec!["GEC".to_string()];

        assert!(worker.scrape(&schools, &ctx(0)).await.is_ok());
        assert_eq!(
            worker.scrape(&schools, &ctx(1)).await,
            Err(WorkerError::Failed("boom".into()))
        );
        assert!(worker.scrape(&schools, &ctx(2)).await.is_ok());
        assert_eq!(worker.invoked_batches(), vec![0, 1, 2]);
        assert_eq!(worker.written_keys(), vec!["syllabus/GEC.json", "syllabus/GEC.json"]);
    }

    #[tokio::test]
    async fn records_pinned_version_from_context() {
        let worker = MockWorker::succeeding("scraper");
        worker.set_version("9");
        worker.scrape(&["CMS".into()], &ctx(0)).await.unwrap();

        assert_eq!(worker.version(), "9");
        assert_eq!(worker.calls()[0].worker_version, "7");
    }
}
