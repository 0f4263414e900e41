use std::time::Duration;

use thiserror::Error;

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport or HTTP-level failure, including timeouts and aborts.
    Network,
    /// The backend answered, but the JSON envelope was malformed or incomplete.
    Protocol,
    /// The backend explicitly reported `success=false`.
    NoData,
    /// The query parameter was blank; never surfaced to the user.
    EmptyInput,
}

/// Everything that can go wrong while fetching one dataset.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("failed to reach the backend: {0}")]
    Transport(String),

    #[error("backend responded with status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("request was aborted before it completed")]
    Aborted,

    #[error("invalid response structure: {0}")]
    Protocol(String),

    #[error("no data found")]
    NoData,

    #[error("query parameter is empty")]
    EmptyInput,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Transport(_)
            | FetchError::HttpStatus { .. }
            | FetchError::Timeout(_)
            | FetchError::Aborted => ErrorKind::Network,
            FetchError::Protocol(_) => ErrorKind::Protocol,
            FetchError::NoData => ErrorKind::NoData,
            FetchError::EmptyInput => ErrorKind::EmptyInput,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        FetchError::Protocol(message.into())
    }

    /// Whether this error should be shown to the user. Blank input is not.
    pub fn is_surfaced(&self) -> bool {
        self.kind() != ErrorKind::EmptyInput
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Protocol(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}
