//! Run driver: reconcile every configured assignment, then roll the
//! workloads that changed and wait for them to converge.

use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use retarget_core::{ResultExt, RolloutControl, RolloutStatus, WorkloadRef};
use retarget_reconciler::{Applied, Decision, ReconcileError, ReconcileRequest, Reconciler};
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;

/// Knobs of one run, resolved from the config and the invoked command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
    pub fail_fast: bool,
    pub restart: bool,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    pub rollout_timeout: Duration,
    pub poll_interval: Duration,
}

impl RunOptions {
    #[must_use]
    pub const fn from_config(config: &Config, dry_run: bool) -> Self {
        Self {
            dry_run,
            fail_fast: config.fail_fast,
            restart: config.rollout.restart,
            retry_attempts: config.retry.attempts,
            retry_backoff: config.retry.backoff(),
            rollout_timeout: config.rollout.timeout(),
            poll_interval: config.rollout.poll_interval(),
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&Config::default(), false)
    }
}

/// What happened to one assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Applied { applied: Applied, attempts: u32 },
    Planned { change: String, previous: Option<String> },
    Failed { error: String, retryable: bool, attempts: u32 },
    /// Not attempted because an earlier assignment failed under fail-fast.
    Skipped,
}

impl Outcome {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentReport {
    pub workload: String,
    pub container: String,
    pub variable: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Result of the restart-and-wait phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RolloutOutcome {
    /// Restart disabled, dry run, or nothing changed.
    Skipped,
    Converged { workloads: Vec<String> },
    RestartFailed { workload: String, error: String },
    Failed { workload: String, reason: String },
    TimedOut { pending: Vec<String> },
}

impl RolloutOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Skipped | Self::Converged { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub namespace: String,
    pub dry_run: bool,
    pub assignments: Vec<AssignmentReport>,
    pub rollout: RolloutOutcome,
}

impl RunReport {
    /// No assignment failed and the rollout converged or was skipped.
    #[must_use]
    pub fn success(&self) -> bool {
        self.assignments.iter().all(|a| !a.outcome.is_failed()) && self.rollout.is_success()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.assignments
            .iter()
            .filter(|a| a.outcome.is_failed())
            .count()
    }
}

enum Step {
    Applied(Applied),
    Planned(Decision),
}

pub struct Driver {
    reconciler: Reconciler,
    control: Arc<dyn RolloutControl>,
    options: RunOptions,
}

impl Driver {
    #[must_use]
    pub fn new(
        reconciler: Reconciler,
        control: Arc<dyn RolloutControl>,
        options: RunOptions,
    ) -> Self {
        Self {
            reconciler,
            control,
            options,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        self.reconciler.namespace()
    }

    /// Reconcile `assignments` in order, then restart and await what changed.
    pub async fn run(&self, assignments: &[ReconcileRequest]) -> RunReport {
        let mut reports = Vec::with_capacity(assignments.len());
        let mut touched: Vec<WorkloadRef> = Vec::new();
        let mut halted = false;

        for request in assignments {
            let outcome = if halted {
                Outcome::Skipped
            } else {
                self.execute(request).await
            };

            if let Outcome::Applied { applied, .. } = &outcome {
                if !applied.was_noop(&request.value) {
                    touched.push(request.workload.clone());
                }
            }
            if outcome.is_failed() && self.options.fail_fast {
                warn!(assignment = %request, "Stopping after first failure");
                halted = true;
            }

            reports.push(AssignmentReport {
                workload: request.workload.to_string(),
                container: request.selector.to_string(),
                variable: request.variable.clone(),
                outcome,
            });
        }

        let rollout = if self.options.dry_run || !self.options.restart {
            RolloutOutcome::Skipped
        } else {
            let touched: Vec<WorkloadRef> = touched.into_iter().unique().collect();
            self.restart_and_wait(&touched).await
        };

        RunReport {
            namespace: self.namespace().to_string(),
            dry_run: self.options.dry_run,
            assignments: reports,
            rollout,
        }
    }

    async fn step(&self, request: &ReconcileRequest) -> Result<Step, ReconcileError> {
        if self.options.dry_run {
            self.reconciler.plan(request).await.map(Step::Planned)
        } else {
            self.reconciler.reconcile(request).await.map(Step::Applied)
        }
    }

    async fn execute(&self, request: &ReconcileRequest) -> Outcome {
        let max_attempts = self.options.retry_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            match self.step(request).await {
                Ok(Step::Applied(applied)) => {
                    return Outcome::Applied {
                        applied,
                        attempts: attempt,
                    };
                }
                Ok(Step::Planned(decision)) => {
                    return Outcome::Planned {
                        change: decision.patch.description(),
                        previous: decision.previous,
                    };
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    warn!(
                        assignment = %request,
                        attempt,
                        error = %error,
                        "Retrying after transient failure"
                    );
                    sleep(self.options.retry_backoff).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => {
                    return Outcome::Failed {
                        retryable: error.is_retryable(),
                        error: error.to_string(),
                        attempts: attempt,
                    };
                }
            }
        }
    }

    /// Restart each workload once, in order, then wait for all of them.
    pub async fn restart_and_wait(&self, workloads: &[WorkloadRef]) -> RolloutOutcome {
        if workloads.is_empty() {
            return RolloutOutcome::Skipped;
        }

        let namespace = self.namespace();
        for workload in workloads {
            if let Err(error) = self.control.restart(namespace, workload).await {
                warn!(workload = %workload, error = %error, "Restart failed");
                return RolloutOutcome::RestartFailed {
                    workload: workload.to_string(),
                    error: error.to_string(),
                };
            }
        }

        self.await_rollouts(workloads).await
    }

    async fn await_rollouts(&self, workloads: &[WorkloadRef]) -> RolloutOutcome {
        let namespace = self.namespace();
        // None when the timeout is too large to represent: wait without a deadline.
        let deadline = Instant::now().checked_add(self.options.rollout_timeout);
        let mut pending = workloads.to_vec();

        loop {
            let mut still_pending = Vec::new();
            for workload in pending {
                let status = match self.control.rollout_status(namespace, &workload).await {
                    Err(error) if !error.is_retryable() => {
                        return RolloutOutcome::Failed {
                            workload: workload.to_string(),
                            reason: error.to_string(),
                        };
                    }
                    result => result.into_option_logged(),
                };

                match status {
                    Some(RolloutStatus::Complete) => {
                        info!(workload = %workload, "Rollout complete");
                    }
                    Some(RolloutStatus::Failed { reason }) => {
                        warn!(workload = %workload, reason = %reason, "Rollout failed");
                        return RolloutOutcome::Failed {
                            workload: workload.to_string(),
                            reason,
                        };
                    }
                    Some(RolloutStatus::Progressing { reason }) => {
                        debug!(workload = %workload, reason = %reason, "Rollout in progress");
                        still_pending.push(workload);
                    }
                    None => still_pending.push(workload),
                }
            }

            if still_pending.is_empty() {
                return RolloutOutcome::Converged {
                    workloads: workloads.iter().map(ToString::to_string).collect(),
                };
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return RolloutOutcome::TimedOut {
                    pending: still_pending.iter().map(ToString::to_string).collect(),
                };
            }

            sleep(self.options.poll_interval).await;
            pending = still_pending;
        }
    }
}

#[cfg(test)]
mod tests {
    use retarget_core::memory::container;
    use retarget_core::{ContainerSelector, InMemoryCluster, StoreError};

    use super::*;

    const NS: &str = "otel-demo";

    fn request(workload: &str, variable: &str, value: &str) -> ReconcileRequest {
        ReconcileRequest::new(
            WorkloadRef::deployment(workload),
            ContainerSelector::First,
            variable,
            value,
        )
    }

    async fn driver_with(options: RunOptions, workloads: &[&str]) -> (Arc<InMemoryCluster>, Driver) {
        let cluster = InMemoryCluster::new_arc();
        for name in workloads {
            cluster
                .insert_workload(NS, &WorkloadRef::deployment(*name), vec![container(name, &[])])
                .await;
        }
        let reconciler = Reconciler::new(cluster.clone(), NS);
        let driver = Driver::new(reconciler, cluster.clone(), options);
        (cluster, driver)
    }

    #[tokio::test]
    async fn test_retryable_error_is_retried() {
        let options = RunOptions {
            retry_attempts: 3,
            retry_backoff: Duration::ZERO,
            restart: false,
            ..RunOptions::default()
        };
        let (cluster, driver) = driver_with(options, &["cart"]).await;
        cluster
            .fail_next_write(StoreError::conflict("deployment/cart", "object modified"))
            .await;

        let report = driver.run(&[request("cart", "A", "1")]).await;

        assert!(report.success());
        assert!(matches!(
            report.assignments.first().map(|a| &a.outcome),
            Some(Outcome::Applied { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_final_error_is_not_retried() {
        let options = RunOptions {
            retry_attempts: 3,
            retry_backoff: Duration::ZERO,
            ..RunOptions::default()
        };
        let (cluster, driver) = driver_with(options, &["cart"]).await;
        cluster
            .fail_next_write(StoreError::rejected("deployment/cart", "invalid"))
            .await;

        let report = driver.run(&[request("cart", "A", "1")]).await;

        assert!(!report.success());
        assert!(matches!(
            report.assignments.first().map(|a| &a.outcome),
            Some(Outcome::Failed { attempts: 1, retryable: false, .. })
        ));
        assert_eq!(report.rollout, RolloutOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };
        let (cluster, driver) = driver_with(options, &["cart"]).await;

        let report = driver.run(&[request("cart", "A", "1")]).await;

        assert!(report.success());
        assert!(report.dry_run);
        assert!(matches!(
            report.assignments.first().map(|a| &a.outcome),
            Some(Outcome::Planned { previous: None, .. })
        ));
        assert_eq!(cluster.write_count().await, 0);
        assert!(cluster.restarts().await.is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_workloads_are_not_restarted() {
        let (cluster, driver) = driver_with(RunOptions::default(), &["cart", "ads"]).await;
        cluster
            .insert_workload(
                NS,
                &WorkloadRef::deployment("ads"),
                vec![container("ads", &[("A", "1")])],
            )
            .await;

        let report = driver
            .run(&[request("cart", "A", "1"), request("ads", "A", "1")])
            .await;

        assert!(report.success());
        assert_eq!(cluster.restarts().await, vec![WorkloadRef::deployment("cart")]);
    }

    #[test]
    fn test_report_serializes_flat_outcome() {
        let report = AssignmentReport {
            workload: "deployment/cart".to_string(),
            container: "first container".to_string(),
            variable: "A".to_string(),
            outcome: Outcome::Skipped,
        };
        let json = serde_json::to_value(&report).ok();
        assert_eq!(
            json.as_ref().and_then(|v| v.get("outcome")).and_then(|v| v.as_str()),
            Some("skipped")
        );
    }
}
