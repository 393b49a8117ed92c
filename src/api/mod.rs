//! ATF REST API
//!
//! Wire types for the CI/CD trigger, progress, and result-table endpoints,
//! and the client that talks to them.

pub mod client;
pub mod types;

pub use client::{AtfApi, HttpApi, RawResponse};
pub use types::*;
