//! CLI command handling
//!
//! Resolves credentials and configuration, then hands the run to the
//! monitor.

use std::time::Duration;

use crate::api::HttpApi;
use crate::commands::RunArgs;
use crate::common::{Config, Credentials, Result};
use crate::monitor::{CancelToken, PollSettings, RunMonitor, RunOutcome};
use crate::report::FilterNames;

/// Run the suite named in `args`
///
/// Credentials are checked before the config file is read and before any
/// request is made.
pub async fn dispatch(args: RunArgs, cancel: CancelToken) -> Result<RunOutcome> {
    let credentials = Credentials::from_env()?;
    tracing::debug!(instance = %credentials.instance_url, "credentials loaded");

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let mut settings = PollSettings::from(&config.poll);
    apply_overrides(&args, &mut settings);
    let filters = FilterNames::new(config.filter_names());

    let api = HttpApi::new(credentials, &config.http)?;
    let monitor = RunMonitor::new(api, settings, filters, cancel);
    monitor.run(&args.suite_id).await
}

/// Command-line flags take precedence over the config file
fn apply_overrides(args: &RunArgs, settings: &mut PollSettings) {
    if let Some(secs) = args.interval {
        settings.interval = Duration::from_secs(secs);
    }
    if let Some(secs) = args.max_duration {
        settings.max_duration = Some(Duration::from_secs(secs));
    }
    if args.early_exit {
        settings.early_exit_on_results_link = true;
    }
}
