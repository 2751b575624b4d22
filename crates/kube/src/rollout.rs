//! Rollout progress of pod-template owners.
//!
//! Mirrors the checks `kubectl rollout status` performs for each kind, so a
//! workload is only reported complete once every replica runs the current
//! template and is available.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use retarget_core::RolloutStatus;

/// Condition reason set by the deployment controller when progress stalls.
const PROGRESS_DEADLINE_EXCEEDED: &str = "ProgressDeadlineExceeded";

fn generation_observed(generation: Option<i64>, observed: Option<i64>) -> bool {
    match (generation, observed) {
        (Some(generation), Some(observed)) => observed >= generation,
        (Some(_), None) => false,
        (None, _) => true,
    }
}

/// Rollout status of a deployment.
#[must_use]
pub fn deployment_status(deployment: &Deployment) -> RolloutStatus {
    let Some(status) = deployment.status.as_ref() else {
        return RolloutStatus::progressing("waiting for status to be reported");
    };
    if !generation_observed(deployment.metadata.generation, status.observed_generation) {
        return RolloutStatus::progressing("waiting for spec update to be observed");
    }

    let stalled = status
        .conditions
        .iter()
        .flatten()
        .find(|c| c.type_ == "Progressing")
        .and_then(|c| c.reason.as_deref())
        == Some(PROGRESS_DEADLINE_EXCEEDED);
    if stalled {
        return RolloutStatus::failed("progress deadline exceeded");
    }

    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let updated = status.updated_replicas.unwrap_or(0);
    let total = status.replicas.unwrap_or(0);
    let available = status.available_replicas.unwrap_or(0);

    if updated < desired {
        RolloutStatus::progressing(format!("{updated} of {desired} updated replicas"))
    } else if total > updated {
        RolloutStatus::progressing(format!(
            "{} old replicas pending termination",
            total.saturating_sub(updated)
        ))
    } else if available < updated {
        RolloutStatus::progressing(format!("{available} of {updated} updated replicas available"))
    } else {
        RolloutStatus::Complete
    }
}

/// Rollout status of a stateful set.
///
/// `OnDelete` sets never roll on their own and count as complete once the
/// spec is observed.
#[must_use]
pub fn stateful_set_status(set: &StatefulSet) -> RolloutStatus {
    let Some(status) = set.status.as_ref() else {
        return RolloutStatus::progressing("waiting for status to be reported");
    };
    if !generation_observed(set.metadata.generation, status.observed_generation) {
        return RolloutStatus::progressing("waiting for spec update to be observed");
    }

    let spec = set.spec.as_ref();
    let strategy = spec.and_then(|s| s.update_strategy.as_ref());
    if strategy.and_then(|u| u.type_.as_deref()) == Some("OnDelete") {
        return RolloutStatus::Complete;
    }

    let desired = spec.and_then(|s| s.replicas).unwrap_or(1);
    let ready = status.ready_replicas.unwrap_or(0);
    if ready < desired {
        return RolloutStatus::progressing(format!("{ready} of {desired} pods ready"));
    }

    let partition = strategy
        .and_then(|u| u.rolling_update.as_ref())
        .and_then(|r| r.partition)
        .unwrap_or(0);
    let updated = status.updated_replicas.unwrap_or(0);
    if partition > 0 {
        let expected = desired.saturating_sub(partition).max(0);
        return if updated < expected {
            RolloutStatus::progressing(format!("{updated} of {expected} partitioned pods updated"))
        } else {
            RolloutStatus::Complete
        };
    }

    if status.update_revision != status.current_revision {
        return RolloutStatus::progressing(format!("{updated} of {desired} pods updated"));
    }
    RolloutStatus::Complete
}

/// Rollout status of a daemon set.
#[must_use]
pub fn daemon_set_status(set: &DaemonSet) -> RolloutStatus {
    let Some(status) = set.status.as_ref() else {
        return RolloutStatus::progressing("waiting for status to be reported");
    };
    if !generation_observed(set.metadata.generation, status.observed_generation) {
        return RolloutStatus::progressing("waiting for spec update to be observed");
    }

    let desired = status.desired_number_scheduled;
    let updated = status.updated_number_scheduled.unwrap_or(0);
    let available = status.number_available.unwrap_or(0);
    if updated < desired {
        RolloutStatus::progressing(format!("{updated} of {desired} updated pods scheduled"))
    } else if available < desired {
        RolloutStatus::progressing(format!("{available} of {desired} updated pods available"))
    } else {
        RolloutStatus::Complete
    }
}
