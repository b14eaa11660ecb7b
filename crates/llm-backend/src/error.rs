use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected backend response: {0}")]
    Response(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid backend configuration: {0}")]
    Config(String),
}

impl BackendError {
    /// `true` when the call ran out of time rather than failing outright.
    pub fn is_timeout(&self) -> bool {
        match self {
            BackendError::Timeout(_) => true,
            BackendError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
