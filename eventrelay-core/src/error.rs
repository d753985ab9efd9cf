//! Error types for eventrelay-core.

use thiserror::Error;

/// Errors raised while building or parsing an [`Event`](crate::Event).
#[derive(Debug, Error)]
pub enum EventError {
    /// A constructor or method argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The textual form of an event could not be parsed.
    #[error("event JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EventError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Failure of a call against a [`RemoteEventService`](crate::RemoteEventService).
///
/// None of these ever reach callers of the observer API; the relay logs them
/// and answers with a retry.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request never produced a response (socket, connection, I/O).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("event service rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The response did not match the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),
}
