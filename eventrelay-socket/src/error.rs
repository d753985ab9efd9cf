use std::path::PathBuf;

use thiserror::Error;

use eventrelay_core::ServiceError;

/// Error surface of the Unix socket transport.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{route} answered with status {status}: {body}")]
    Status {
        route: &'static str,
        status: u16,
        body: String,
    },

    #[error("{route} timed out")]
    Timeout { route: &'static str },

    #[error("event service is not running (socket missing: {socket})")]
    ServiceNotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SocketError {
    SocketError::Io {
        path: path.into(),
        source,
    }
}

impl From<SocketError> for ServiceError {
    fn from(err: SocketError) -> Self {
        match err {
            SocketError::Status { status, body, .. } => ServiceError::Rejected { status, body },
            SocketError::Json(err) => ServiceError::Protocol(err.to_string()),
            other => ServiceError::Transport(other.to_string()),
        }
    }
}
