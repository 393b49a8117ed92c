//! Common utilities: errors, configuration, credentials and logging

pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod paths;

pub use config::Config;
pub use credentials::Credentials;
pub use error::{Error, Result};

/// Longest slice of a response body quoted in a diagnostic
const SNIPPET_LEN: usize = 200;

/// Shorten a response body for log output, respecting char boundaries
pub fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(SNIPPET_LEN) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
