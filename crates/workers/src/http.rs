//! `HttpWorker` — invokes a remotely deployed scraper over HTTP.
//!
//! The request is `POST {endpoint}?qualifier={version}` with body
//! `{"schools": [...]}`; the response body must be a [`WorkerResult`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::{BatchWorker, InvocationContext, WorkerError, WorkerResult};

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    schools: &'a [String],
}

/// Request/response worker reached through an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpWorker {
    name: String,
    endpoint: String,
    version: String,
    client: reqwest::Client,
}

impl HttpWorker {
    /// Build a worker that calls `endpoint`, pinned to `version`.
    ///
    /// `timeout` bounds each invocation; a timed-out call surfaces as
    /// [`WorkerError::Timeout`].
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, WorkerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.into(),
            endpoint: endpoint.into(),
            version: version.into(),
            client,
        })
    }
}

#[async_trait]
impl BatchWorker for HttpWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    #[instrument(skip(self, schools), fields(worker = %self.name, batch = ctx.batch_index))]
    async fn scrape(
        &self,
        schools: &[String],
        ctx: &InvocationContext,
    ) -> Result<WorkerResult, WorkerError> {
        debug!("invoking {} for {:?}", self.endpoint, schools);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("qualifier", ctx.worker_version.as_str())])
            .header("x-run-id", ctx.run_id.to_string())
            .header("x-batch-index", ctx.batch_index.to_string())
            .json(&ScrapeRequest { schools })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::Failed(format!("HTTP {status}: {body}")));
        }

        let body = response.bytes().await?;
        let result: WorkerResult = serde_json::from_slice(&body)
            .map_err(|e| WorkerError::MalformedResponse(e.to_string()))?;

        result.into_result()
    }
}
