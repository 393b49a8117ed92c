//! CLI argument definitions
//!
//! Defines the clap arguments for the ATF runner.

use clap::Args;
use std::path::PathBuf;

/// Printed with every usage error
pub const USAGE_EXAMPLE: &str = "Example: atf-runner 1234567890abcdef1234567890abcdef";

#[derive(Args, Debug)]
pub struct RunArgs {
    /// sys_id of the test suite to run
    #[arg(value_name = "TEST_SUITE_SYS_ID")]
    pub suite_id: String,

    /// Seconds between progress checks (default: 5)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Stop monitoring after this many seconds (default: no limit)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_duration: Option<u64>,

    /// Configuration file (default: platform config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Stop as soon as a results link appears, without the detailed report
    #[arg(long)]
    pub early_exit: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
