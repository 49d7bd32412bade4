//! Compose error type.

use thiserror::Error;

/// A failure composing one recipient's digest.
///
/// Compose errors are isolated per recipient: the scheduler records them
/// in the batch result and moves on to the next unit of work.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The model endpoint could not be reached or answered non-2xx.
    #[error("summarization call failed: {0}")]
    CallFailed(String),

    /// The endpoint answered, but not in the shape we expect.
    #[error("malformed summarization response: {0}")]
    MalformedResponse(String),

    /// The request payload could not be serialized.
    #[error("failed to serialize digest request: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized Result type for compose operations.
pub type ComposeResult<T> = Result<T, ComposeError>;
