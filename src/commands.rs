//! CLI command handlers.
//!
//! Every handler returns whether the run succeeded; `main` turns that into
//! the process exit code.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use retarget_kube::KubeCluster;
use retarget_reconciler::Reconciler;
use tracing::info;

use crate::cli::{Commands, TargetArgs};
use crate::config::{config_path, load_config, Config, Overrides};
use crate::driver::{Driver, Outcome, RolloutOutcome, RunOptions, RunReport};

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Execute a CLI command.
///
/// # Errors
///
/// Returns error if the config cannot be loaded or the cluster cannot be reached.
pub async fn execute_command(command: Commands) -> Result<bool> {
    match command {
        Commands::Apply {
            target,
            fail_fast,
            no_restart,
            timeout,
            json,
        } => {
            let overrides = Overrides {
                fail_fast,
                no_restart,
                timeout_secs: timeout,
                ..target.overrides()
            };
            cmd_run(&target, &overrides, false, json).await
        }

        Commands::Plan { target, json } => {
            cmd_run(&target, &target.overrides(), true, json).await
        }

        Commands::Restart {
            target,
            timeout,
            json,
        } => {
            let overrides = Overrides {
                timeout_secs: timeout,
                ..target.overrides()
            };
            cmd_restart(&target, &overrides, json).await
        }

        Commands::Config { target } => cmd_config(&target),
    }
}

fn load(target: &TargetArgs, overrides: &Overrides) -> Result<Config> {
    let path = config_path(target.config.clone(), env_lookup);
    load_config(&path, env_lookup, overrides)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

async fn connect(config: &Config, dry_run: bool) -> Result<Driver> {
    let cluster = Arc::new(
        KubeCluster::try_default()
            .await
            .context("Failed to create Kubernetes client")?,
    );
    let reconciler = Reconciler::builder()
        .with_store(cluster.clone())
        .namespace(config.namespace.clone())
        .build()
        .context("Failed to build reconciler")?;
    Ok(Driver::new(
        reconciler,
        cluster,
        RunOptions::from_config(config, dry_run),
    ))
}

/// Reconcile (or plan) every configured assignment.
async fn cmd_run(target: &TargetArgs, overrides: &Overrides, dry_run: bool, json: bool) -> Result<bool> {
    let config = load(target, overrides)?;
    let assignments = config.assignments();
    info!(
        namespace = %config.namespace,
        assignments = assignments.len(),
        dry_run,
        "Starting run"
    );

    let driver = connect(&config, dry_run).await?;
    let report = driver.run(&assignments).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(report.success())
}

/// Restart every configured workload and wait for the rollout.
async fn cmd_restart(target: &TargetArgs, overrides: &Overrides, json: bool) -> Result<bool> {
    let config = load(target, overrides)?;
    let driver = connect(&config, false).await?;
    let outcome = driver.restart_and_wait(&config.workload_refs()).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", render_rollout(&outcome));
    }
    Ok(outcome.is_success())
}

/// Validate the config and print it with placeholders resolved.
fn cmd_config(target: &TargetArgs) -> Result<bool> {
    let config = load(target, &target.overrides())?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
    print!("{rendered}");
    Ok(true)
}

/// Human-readable run summary.
#[must_use]
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    let mode = if report.dry_run { "plan" } else { "apply" };
    let _ = writeln!(out, "{mode} in namespace {}", report.namespace);

    for entry in &report.assignments {
        let detail = match &entry.outcome {
            Outcome::Applied { applied, attempts } if *attempts > 1 => {
                format!("ok      {applied} after {attempts} attempts")
            }
            Outcome::Applied { applied, .. } => format!("ok      {applied}"),
            Outcome::Planned {
                change,
                previous: Some(previous),
            } => format!("plan    {change} (was {previous})"),
            Outcome::Planned { change, .. } => format!("plan    {change}"),
            Outcome::Failed { error, .. } => format!("FAILED  {error}"),
            Outcome::Skipped => "skipped".to_string(),
        };
        let _ = writeln!(
            out,
            "  {} {} [{}]: {detail}",
            entry.workload, entry.variable, entry.container
        );
    }

    let _ = writeln!(out, "rollout: {}", render_rollout(&report.rollout));
    let failed = report.failed_count();
    if failed > 0 {
        let _ = writeln!(out, "{failed} of {} assignments failed", report.assignments.len());
    }
    out
}

#[must_use]
pub fn render_rollout(outcome: &RolloutOutcome) -> String {
    match outcome {
        RolloutOutcome::Skipped => "skipped".to_string(),
        RolloutOutcome::Converged { workloads } => {
            format!("complete ({})", workloads.join(", "))
        }
        RolloutOutcome::RestartFailed { workload, error } => {
            format!("restart of {workload} failed: {error}")
        }
        RolloutOutcome::Failed { workload, reason } => {
            format!("{workload} failed: {reason}")
        }
        RolloutOutcome::TimedOut { pending } => {
            format!("timed out waiting for {}", pending.join(", "))
        }
    }
}
