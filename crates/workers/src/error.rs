//! Worker-level error type.

use thiserror::Error;

/// Errors returned by a worker invocation.
///
/// The orchestrator does not retry any of these: every variant sends the run
/// to its ERROR state, and the display text becomes the published cause.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The host environment cut the invocation short.
    #[error("worker timed out: {0}")]
    Timeout(String),

    /// The worker ran and reported a failure.
    #[error("worker failed: {0}")]
    Failed(String),

    /// The worker answered with something that is not a `WorkerResult`.
    #[error("malformed worker response: {0}")]
    MalformedResponse(String),

    /// The invocation never reached the worker.
    #[error("worker transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for WorkerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
