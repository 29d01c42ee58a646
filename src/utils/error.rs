// src/utils/error.rs
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the proof-of-work cluster
///
/// This enum represents all possible error conditions that can occur
/// while searching, coordinating workers, or serving HTTP requests.
/// Each variant maps onto a plain-text HTTP response when returned
/// from a handler.
#[derive(Error, Debug)]
pub enum PowError {
    /// Invalid user input or parameter errors
    #[error("Invalid input: {0}")]
    InputError(String),

    /// The search was cancelled before any candidate qualified
    #[error("search cancelled before a solution was found")]
    Cancelled,

    /// The running search did not acknowledge a cancel request in time
    #[error("unable to cancel last request (no acknowledgement within {0:?})")]
    CancelTimeout(Duration),

    /// No worker reported a solution before the master gave up waiting
    #[error("no solution received within {0:?}")]
    SolutionTimeout(Duration),

    /// A newer search session replaced the one this caller was waiting on
    #[error("search session superseded by a newer start request")]
    Superseded,

    /// The master has no live workers to fan out to
    #[error("no healthy workers registered")]
    NoWorkers,

    /// Errors related to network connectivity
    #[error("Network connection error: {0}")]
    ConnectionError(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Configuration file or parameter errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Async task execution errors
    #[error("Task execution error: {0}")]
    TaskError(String),
}

impl PowError {
    /// HTTP status code reported to callers for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            PowError::InputError(_) | PowError::Cancelled => StatusCode::BAD_REQUEST,
            PowError::Superseded => StatusCode::CONFLICT,
            PowError::NoWorkers => StatusCode::SERVICE_UNAVAILABLE,
            PowError::SolutionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PowError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::debug!("Request rejected: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Converts TOML decoding errors into PowError
///
/// Used when a configuration file exists but cannot be parsed.
impl From<toml::de::Error> for PowError {
    fn from(e: toml::de::Error) -> Self {
        PowError::ConfigError(format!("Invalid config format: {}", e))
    }
}

/// Converts async task join errors into PowError
///
/// Used when a blocking search task or a background task fails
/// unexpectedly (panic or runtime shutdown).
impl From<tokio::task::JoinError> for PowError {
    fn from(e: tokio::task::JoinError) -> Self {
        PowError::TaskError(format!("Async task failed: {}", e))
    }
}
