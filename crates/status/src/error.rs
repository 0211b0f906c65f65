//! Delivery error type.

use thiserror::Error;

/// Failure to hand a message to the chat channel.
///
/// Never propagated past the publisher: delivery is fire-and-forget.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("chat webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat webhook rejected the message with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}
