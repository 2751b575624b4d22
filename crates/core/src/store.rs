//! Typed interfaces over the orchestrator's workload state.

use async_trait::async_trait;
use serde_json::Value;

use crate::patch::EnvPatch;
use crate::result::Result;
use crate::types::{RolloutStatus, WorkloadRef};

/// Read/patch access to the container specs of a workload.
///
/// Implementations must apply each [`EnvPatch`] as one atomic operation:
/// either every operation of the patch lands or none does.
#[async_trait]
pub trait EnvStore: Send + Sync {
    /// Read the live container list of `workload`, in spec order.
    ///
    /// The list is returned raw (`Value::Null` when the template has none) so
    /// that shape problems surface to the caller instead of being dropped by a
    /// lenient parser.
    async fn get_containers(&self, namespace: &str, workload: &WorkloadRef) -> Result<Value>;

    /// Apply one structural patch.
    async fn apply_patch(
        &self,
        namespace: &str,
        workload: &WorkloadRef,
        patch: &EnvPatch,
    ) -> Result<()>;
}

/// Restart and rollout-progress access, used after reconciliation.
#[async_trait]
pub trait RolloutControl: Send + Sync {
    /// Trigger a rolling restart of the workload's pods.
    async fn restart(&self, namespace: &str, workload: &WorkloadRef) -> Result<()>;

    /// Current rollout progress of the workload.
    async fn rollout_status(&self, namespace: &str, workload: &WorkloadRef)
    -> Result<RolloutStatus>;
}
