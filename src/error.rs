use reqwest::StatusCode;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    /// Status code reported by the server, if the failure came from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ConsoleError::Http { status, .. } => Some(*status),
            ConsoleError::Request(err) => err.status(),
            _ => None,
        }
    }

    /// Response body text, when there was one.
    pub fn body(&self) -> Option<&str> {
        match self {
            ConsoleError::Http { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Uniform failure handler for console requests: every failure is surfaced
/// the same way, with the status code and body text. Nothing is retried.
pub fn report(err: &ConsoleError) -> String {
    let message = match (err.status(), err.body()) {
        (Some(status), Some(body)) => format!("{}\n{}", status.as_u16(), body),
        (Some(status), None) => format!("{}\n{}", status.as_u16(), err),
        _ => err.to_string(),
    };
    error!(status = ?err.status(), "console request failed: {}", message);
    message
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
