//! Error types for the ATF runner
//!
//! Messages are written for the person at the terminal: each one says what
//! went wrong and, where it helps, what to set or check.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ATF runner
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Missing required environment variables: {}. Set them before running", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("Invalid instance URL '{url}': {reason}")]
    InvalidInstanceUrl { url: String, reason: String },

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("{0}")]
    Usage(String),

    // === Start Errors ===
    #[error("Failed to trigger test suite: {0}")]
    StartRequest(#[source] reqwest::Error),

    #[error("Failed to trigger test suite. Status code: {status}\nResponse: {body}")]
    StartRejected { status: u16, body: String },

    #[error("Empty response received from test suite trigger")]
    EmptyStartResponse,

    #[error("Invalid JSON in test suite trigger response: {0}")]
    InvalidStartResponse(#[source] serde_json::Error),

    // === Progress Errors ===
    #[error("Test suite did not finish within {0} seconds")]
    PollTimeout(u64),

    #[error("Monitoring cancelled before the test suite finished")]
    Cancelled,

    // === Remote API Errors ===
    #[error("Request to {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Empty response received from {0}")]
    EmptyResponse(String),

    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Parsing Errors ===
    #[error("Malformed selected result JSON: {0}")]
    SelectedResultParse(#[source] serde_json::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create an invalid instance URL error
    pub fn invalid_instance_url(url: &str, reason: impl ToString) -> Self {
        Self::InvalidInstanceUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a non-success status error for a request URL
    pub fn http_status(url: &str, status: u16) -> Self {
        Self::HttpStatus {
            url: url.to_string(),
            status,
        }
    }

    /// Create a start rejection error, keeping the raw body for the diagnostic
    pub fn start_rejected(status: u16, body: &str) -> Self {
        Self::StartRejected {
            status,
            body: body.to_string(),
        }
    }

    /// Whether this error comes from local setup (arguments, environment,
    /// config file) rather than from the instance; `main` follows these with
    /// a usage hint
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingCredentials(_)
                | Error::InvalidInstanceUrl { .. }
                | Error::ConfigParse(_)
                | Error::FileRead { .. }
                | Error::Usage(_)
        )
    }
}
