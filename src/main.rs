//! # Retarget - entry point
//!
//! Parses the command line, runs the command and maps its outcome to the
//! process exit code: 0 when every assignment and rollout succeeded, 1
//! otherwise. Ctrl+C aborts the run between API calls.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use retarget::cli::Cli;
use retarget::commands::execute_command;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    tokio::select! {
        result = execute_command(cli.command) => match result {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                error!("{e:#}");
                ExitCode::FAILURE
            }
        },
        _ = signal::ctrl_c() => {
            warn!("Interrupted, workloads may be partially reconciled");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing subscriber with environment filter.
///
/// Logs go to stderr so that `--json` output stays machine-readable.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
