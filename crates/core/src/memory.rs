//! In-memory cluster for tests and offline runs.
//!
//! Each workload is kept as a JSON document shaped like the orchestrator's
//! own object, and patches are applied with the same JSON Patch rendering the
//! live store sends, so behavior differences between the two stay minimal.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::patch::{restart_patch, EnvPatch, CONTAINERS_PATH};
use crate::result::Result;
use crate::store::{EnvStore, RolloutControl};
use crate::types::{RolloutStatus, WorkloadRef};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    namespace: String,
    workload: WorkloadRef,
}

impl Key {
    fn new(namespace: &str, workload: &WorkloadRef) -> Self {
        Self {
            namespace: namespace.to_string(),
            workload: workload.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    next_read: Option<StoreError>,
    next_write: Option<StoreError>,
}

/// Build a raw container object with literal env entries.
#[must_use]
pub fn container(name: &str, env: &[(&str, &str)]) -> Value {
    let entries: Vec<Value> = env
        .iter()
        .map(|(n, v)| json!({"name": n, "value": v}))
        .collect();
    json!({"name": name, "image": format!("{name}:latest"), "env": entries})
}

/// In-memory [`EnvStore`] and [`RolloutControl`].
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    workloads: RwLock<HashMap<Key, Value>>,
    rollouts: RwLock<HashMap<Key, VecDeque<RolloutStatus>>>,
    restarts: RwLock<Vec<WorkloadRef>>,
    faults: RwLock<Faults>,
    writes: RwLock<usize>,
}

impl InMemoryCluster {
    /// Create an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cluster wrapped in an Arc.
    #[must_use]
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a workload with the given raw container objects.
    pub async fn insert_workload(&self, namespace: &str, workload: &WorkloadRef, containers: Vec<Value>) {
        let document = json!({
            "metadata": {"name": workload.name, "namespace": namespace},
            "spec": {"template": {"metadata": {}, "spec": {"containers": containers}}},
        });
        self.insert_document(namespace, workload, document).await;
    }

    /// Register a workload from a complete raw document.
    pub async fn insert_document(&self, namespace: &str, workload: &WorkloadRef, document: Value) {
        self.workloads
            .write()
            .await
            .insert(Key::new(namespace, workload), document);
    }

    /// Current raw container list of a workload.
    pub async fn containers(&self, namespace: &str, workload: &WorkloadRef) -> Option<Vec<Value>> {
        self.workloads
            .read()
            .await
            .get(&Key::new(namespace, workload))
            .and_then(|doc| doc.pointer(CONTAINERS_PATH))
            .and_then(Value::as_array)
            .cloned()
    }

    /// Env of the named container as `(name, value)` pairs.
    pub async fn env_of(
        &self,
        namespace: &str,
        workload: &WorkloadRef,
        container_name: &str,
    ) -> Option<Vec<(String, Option<String>)>> {
        let containers = self.containers(namespace, workload).await?;
        let found = containers
            .iter()
            .find(|c| c.get("name").and_then(Value::as_str) == Some(container_name))?;
        let pairs = found
            .get("env")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| {
                        (
                            e.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                            e.get("value").and_then(Value::as_str).map(str::to_string),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        Some(pairs)
    }

    /// Make the next read fail with `error`.
    pub async fn fail_next_read(&self, error: StoreError) {
        self.faults.write().await.next_read = Some(error);
    }

    /// Make the next write fail with `error`.
    pub async fn fail_next_write(&self, error: StoreError) {
        self.faults.write().await.next_write = Some(error);
    }

    /// Number of patches successfully applied.
    pub async fn write_count(&self) -> usize {
        *self.writes.read().await
    }

    /// Workloads restarted so far, in call order.
    pub async fn restarts(&self) -> Vec<WorkloadRef> {
        self.restarts.read().await.clone()
    }

    /// Script the statuses returned by successive `rollout_status` calls.
    ///
    /// The last status is repeated once the script is exhausted. Unscripted
    /// workloads report `Complete`.
    pub async fn script_rollout(&self, namespace: &str, workload: &WorkloadRef, statuses: Vec<RolloutStatus>) {
        self.rollouts
            .write()
            .await
            .insert(Key::new(namespace, workload), statuses.into());
    }
}

#[async_trait]
impl EnvStore for InMemoryCluster {
    async fn get_containers(&self, namespace: &str, workload: &WorkloadRef) -> Result<Value> {
        if let Some(error) = self.faults.write().await.next_read.take() {
            return Err(error);
        }

        let workloads = self.workloads.read().await;
        let document = workloads
            .get(&Key::new(namespace, workload))
            .ok_or_else(|| StoreError::workload_not_found(namespace, workload.to_string()))?;

        // Handed back as-is; the reconciler decides whether the shape is acceptable.
        Ok(document.pointer(CONTAINERS_PATH).cloned().unwrap_or(Value::Null))
    }

    async fn apply_patch(
        &self,
        namespace: &str,
        workload: &WorkloadRef,
        patch: &EnvPatch,
    ) -> Result<()> {
        if let Some(error) = self.faults.write().await.next_write.take() {
            return Err(error);
        }

        let rendered = patch
            .to_json_patch()
            .map_err(|e| StoreError::rejected(workload.to_string(), e.to_string()))?;

        let mut workloads = self.workloads.write().await;
        let document = workloads
            .get_mut(&Key::new(namespace, workload))
            .ok_or_else(|| StoreError::workload_not_found(namespace, workload.to_string()))?;

        // Patch a copy and swap it in, so a failing operation leaves no trace.
        let mut updated = document.clone();
        json_patch::patch(&mut updated, &rendered.0)
            .map_err(|e| StoreError::rejected(workload.to_string(), e.to_string()))?;
        *document = updated;
        drop(workloads);

        let mut writes = self.writes.write().await;
        *writes = writes.saturating_add(1);
        Ok(())
    }
}

#[async_trait]
impl RolloutControl for InMemoryCluster {
    async fn restart(&self, namespace: &str, workload: &WorkloadRef) -> Result<()> {
        if let Some(error) = self.faults.write().await.next_write.take() {
            return Err(error);
        }

        let mut restarts = self.restarts.write().await;
        let stamp = format!("restart-{}", restarts.len());

        let mut workloads = self.workloads.write().await;
        let document = workloads
            .get_mut(&Key::new(namespace, workload))
            .ok_or_else(|| StoreError::workload_not_found(namespace, workload.to_string()))?;
        json_patch::merge(document, &restart_patch(&stamp));

        restarts.push(workload.clone());
        Ok(())
    }

    async fn rollout_status(
        &self,
        namespace: &str,
        workload: &WorkloadRef,
    ) -> Result<RolloutStatus> {
        let key = Key::new(namespace, workload);
        if !self.workloads.read().await.contains_key(&key) {
            return Err(StoreError::workload_not_found(namespace, workload.to_string()));
        }

        let mut rollouts = self.rollouts.write().await;
        let status = match rollouts.get_mut(&key) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().cloned(),
            None => None,
        };
        Ok(status.unwrap_or(RolloutStatus::Complete))
    }
}
