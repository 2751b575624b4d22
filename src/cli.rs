//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Overrides;

/// Retarget - redirect telemetry endpoints across workloads
#[derive(Parser, Debug)]
#[command(name = "retarget")]
#[command(version)]
#[command(about = "Reconcile telemetry env variables on Kubernetes workloads")]
#[command(
    long_about = "Retarget sets environment variables such as OTEL_EXPORTER_OTLP_ENDPOINT on the containers of configured workloads, idempotently, then restarts the workloads that changed and waits for their rollout."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that loads the config.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Config file path (default: $RETARGET_CONFIG or retarget.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Namespace holding the workloads
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Collector endpoint substituted for {collector}
    #[arg(long)]
    pub collector: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile all configured env values, then restart changed workloads
    Apply {
        #[command(flatten)]
        target: TargetArgs,

        /// Stop at the first failed assignment
        #[arg(long, default_value_t = false)]
        fail_fast: bool,

        /// Do not restart workloads after changing them
        #[arg(long, default_value_t = false)]
        no_restart: bool,

        /// Rollout timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the run report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show what apply would change without writing anything
    Plan {
        #[command(flatten)]
        target: TargetArgs,

        /// Print the run report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Restart all configured workloads and wait for their rollout
    Restart {
        #[command(flatten)]
        target: TargetArgs,

        /// Rollout timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the rollout outcome as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Validate and print the effective configuration
    Config {
        #[command(flatten)]
        target: TargetArgs,
    },
}

impl TargetArgs {
    /// CLI-level overrides carried by these arguments.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            namespace: self.namespace.clone(),
            collector: self.collector.clone(),
            ..Overrides::default()
        }
    }
}
