//! Live cluster access through the Kubernetes API server.

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::discovery::ApiResource;
use kube::Client;
use retarget_core::{
    restart_patch, EnvPatch, EnvStore, Result, ResultExt, RolloutControl, RolloutStatus,
    StoreError, WorkloadKind, WorkloadRef, CONTAINERS_PATH,
};
use serde_json::Value;

use crate::rollout::{daemon_set_status, deployment_status, stateful_set_status};

/// Env store and rollout control backed by a kube [`Client`].
///
/// Workloads are read and patched as untyped objects so that the container
/// list is seen exactly as the API server stores it. Typed objects are only
/// used to evaluate rollout status.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient kubeconfig or in-cluster service account.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if no usable configuration is found.
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| StoreError::transport("connect", e.to_string()))?;
        Ok(Self::new(client))
    }

    fn dynamic_api(&self, namespace: &str, kind: WorkloadKind) -> Api<DynamicObject> {
        let resource = match kind {
            WorkloadKind::Deployment => ApiResource::erase::<Deployment>(&()),
            WorkloadKind::StatefulSet => ApiResource::erase::<StatefulSet>(&()),
            WorkloadKind::DaemonSet => ApiResource::erase::<DaemonSet>(&()),
        };
        Api::namespaced_with(self.client.clone(), namespace, &resource)
    }
}

/// Map an API failure onto the store's error taxonomy.
fn store_error(
    operation: &str,
    namespace: &str,
    workload: &WorkloadRef,
    error: kube::Error,
) -> StoreError {
    match error {
        kube::Error::Api(response) => match response.code {
            404 => StoreError::workload_not_found(namespace, workload.to_string()),
            401 | 403 => {
                StoreError::unauthorized(operation, workload.to_string(), response.message)
            }
            409 => StoreError::conflict(workload.to_string(), response.message),
            400 | 422 => StoreError::rejected(workload.to_string(), response.message),
            _ => StoreError::transport(
                operation,
                format!("{} ({})", response.message, response.code),
            ),
        },
        other => StoreError::transport(operation, other.to_string()),
    }
}

fn log_failure(error: &StoreError) {
    tracing::debug!(error = %error, retryable = error.is_retryable(), "API call failed");
}

#[async_trait]
impl EnvStore for KubeCluster {
    async fn get_containers(&self, namespace: &str, workload: &WorkloadRef) -> Result<Value> {
        let object = self
            .dynamic_api(namespace, workload.kind)
            .get(&workload.name)
            .await
            .map_err(|e| store_error("get", namespace, workload, e))
            .inspect_error(log_failure)?;

        Ok(object
            .data
            .pointer(CONTAINERS_PATH)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn apply_patch(
        &self,
        namespace: &str,
        workload: &WorkloadRef,
        patch: &EnvPatch,
    ) -> Result<()> {
        let document = patch
            .to_json_patch()
            .map_err(|e| StoreError::rejected(workload.to_string(), e.to_string()))?;

        tracing::debug!(
            namespace,
            workload = %workload,
            change = %patch.description(),
            "Submitting env patch"
        );
        self.dynamic_api(namespace, workload.kind)
            .patch(
                &workload.name,
                &PatchParams::default(),
                &Patch::Json::<()>(document),
            )
            .await
            .map_err(|e| store_error("patch", namespace, workload, e))
            .inspect_error(log_failure)?;
        Ok(())
    }
}

#[async_trait]
impl RolloutControl for KubeCluster {
    async fn restart(&self, namespace: &str, workload: &WorkloadRef) -> Result<()> {
        let stamp = Utc::now().to_rfc3339();
        self.dynamic_api(namespace, workload.kind)
            .patch(
                &workload.name,
                &PatchParams::default(),
                &Patch::Merge(restart_patch(&stamp)),
            )
            .await
            .map_err(|e| store_error("restart", namespace, workload, e))
            .inspect_error(log_failure)?;

        tracing::info!(namespace, workload = %workload, restarted_at = %stamp, "Restart requested");
        Ok(())
    }

    async fn rollout_status(
        &self,
        namespace: &str,
        workload: &WorkloadRef,
    ) -> Result<RolloutStatus> {
        let client = self.client.clone();
        let name = workload.name.as_str();
        let to_store = |e| store_error("status", namespace, workload, e);

        let status = match workload.kind {
            WorkloadKind::Deployment => Api::<Deployment>::namespaced(client, namespace)
                .get(name)
                .await
                .map(|d| deployment_status(&d)),
            WorkloadKind::StatefulSet => Api::<StatefulSet>::namespaced(client, namespace)
                .get(name)
                .await
                .map(|s| stateful_set_status(&s)),
            WorkloadKind::DaemonSet => Api::<DaemonSet>::namespaced(client, namespace)
                .get(name)
                .await
                .map(|d| daemon_set_status(&d)),
        };
        status.map_err(to_store).inspect_error(log_failure)
    }
}
