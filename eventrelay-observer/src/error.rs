use thiserror::Error;

use eventrelay_core::EventError;

/// Synchronous failures of the observer API.
///
/// Remote-path failures never show up here; the relay logs them instead.
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error("payload is not JSON-representable: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("attaching a remote service requires a running tokio runtime")]
    NoRuntime,
}

pub(crate) fn invalid(message: impl Into<String>) -> ObserverError {
    ObserverError::InvalidArgument(message.into())
}
