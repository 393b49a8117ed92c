//! ATF Runner - trigger a ServiceNow Automated Test Framework suite and
//! report its results
//!
//! Starts a suite run through the CI/CD REST API, polls its progress until it
//! finishes, then fetches per-test and per-step results and prints a
//! summary.

pub mod api;
pub mod cli;
pub mod commands;
pub mod common;
pub mod monitor;
pub mod report;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use monitor::{RunMonitor, RunOutcome};
