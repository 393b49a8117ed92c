//! ATF Runner - trigger a ServiceNow ATF test suite and report its results
//!
//! Usage: atf-runner <TEST_SUITE_SYS_ID>

use atf_runner::commands::{RunArgs, USAGE_EXAMPLE};
use atf_runner::common::{credentials, logging};
use atf_runner::monitor::cancel_pair;
use atf_runner::{cli, Error};
use clap::error::ErrorKind;
use clap::Parser;

#[derive(Parser)]
#[command(name = "atf-runner", about = "Run a ServiceNow ATF test suite and report results")]
#[command(version, long_about = None, after_help = USAGE_EXAMPLE)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{USAGE_EXAMPLE}");
            std::process::exit(1);
        }
    };

    logging::init_cli(cli.run.verbose);

    // Variables already in the environment win over `.env`
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "could not load .env"),
    }

    let (cancel, token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping");
            cancel.cancel();
        }
    });

    match cli::dispatch(cli.run, token).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "run finished");
            println!("\nTest suite execution completed.");
        }
        Err(e) => {
            eprintln!("Error: {e}");
            if let Error::MissingCredentials(_) = e {
                eprintln!("Please ensure these are set in your environment or .env file:");
                for name in [
                    credentials::INSTANCE_URL_VAR,
                    credentials::USERNAME_VAR,
                    credentials::PASSWORD_VAR,
                ] {
                    eprintln!("  {name}");
                }
            }
            if e.is_configuration() {
                eprintln!("\nUsage: atf-runner <TEST_SUITE_SYS_ID>");
                eprintln!("{USAGE_EXAMPLE}");
            }
            std::process::exit(1);
        }
    }
}
