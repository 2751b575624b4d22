//! Reconciler implementation.

use std::sync::Arc;

use itertools::Itertools;
use retarget_core::{ContainerSelector, ContainerSpec, EnvEntry, EnvPatch, EnvStore, WorkloadRef};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ReconcileError, Result};
use crate::types::{Applied, Decision, ReconcileRequest};

/// Brings one env entry of one container to a desired value.
///
/// Holds no state between calls: every call reads the live container list,
/// decides append or replace, and submits a single patch addressed by the
/// positions observed in that same read.
pub struct Reconciler {
    store: Arc<dyn EnvStore>,
    namespace: String,
}

impl Reconciler {
    /// Create a reconciler bound to one namespace.
    pub fn new(store: Arc<dyn EnvStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Start building a reconciler.
    #[must_use]
    pub fn builder() -> ReconcilerBuilder {
        ReconcilerBuilder::new()
    }

    /// Namespace every call is addressed to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Reconcile `variable=value` in the selected container of `workload`.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::reconcile`].
    pub async fn reconcile_env(
        &self,
        workload: &WorkloadRef,
        selector: &ContainerSelector,
        variable: &str,
        value: &str,
    ) -> Result<Applied> {
        let request = ReconcileRequest::new(workload.clone(), selector.clone(), variable, value);
        self.reconcile(&request).await
    }

    /// Read, decide and apply one request.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the request breaks a precondition (nothing is read)
    /// - `ContainerNotFound` if the selector does not resolve
    /// - `MalformedState` if the live container list has an unexpected shape
    /// - `ExternalStore` if the read or the write fails
    pub async fn reconcile(&self, request: &ReconcileRequest) -> Result<Applied> {
        let decision = self.plan(request).await?;

        debug!(
            workload = %request.workload,
            patch = %decision.patch.description(),
            "Applying env patch"
        );

        self.store
            .apply_patch(&self.namespace, &request.workload, &decision.patch)
            .await
            .map_err(|e| {
                warn!(
                    workload = %request.workload,
                    variable = %request.variable,
                    error = %e,
                    "Env patch failed"
                );
                ReconcileError::from(e)
            })?;

        let applied = decision.applied();
        info!(
            workload = %request.workload,
            container = %decision.container_name,
            variable = %request.variable,
            outcome = %applied,
            "Env entry reconciled"
        );
        Ok(applied)
    }

    /// Read and decide without writing anything.
    ///
    /// # Errors
    ///
    /// Same as [`Reconciler::reconcile`], minus write failures.
    pub async fn plan(&self, request: &ReconcileRequest) -> Result<Decision> {
        request.validate()?;
        let (index, container) = self
            .container_env(&request.workload, &request.selector)
            .await?;
        Ok(decide(request, index, &container))
    }

    /// Resolve `selector` against the live spec and return the container with
    /// its position.
    ///
    /// # Errors
    ///
    /// `ContainerNotFound`, `MalformedState` or `ExternalStore`.
    pub async fn container_env(
        &self,
        workload: &WorkloadRef,
        selector: &ContainerSelector,
    ) -> Result<(usize, ContainerSpec)> {
        let raw = self.store.get_containers(&self.namespace, workload).await?;
        let containers = parse_containers(workload, &raw)?;
        let index = resolve(workload, selector, &containers)?;
        containers
            .into_iter()
            .nth(index)
            .map(|c| (index, c))
            .ok_or_else(|| ReconcileError::container_not_found(workload, selector))
    }
}

/// Parse the raw container list, rejecting anything that is not a list of
/// well-formed containers.
fn parse_containers(workload: &WorkloadRef, raw: &Value) -> Result<Vec<ContainerSpec>> {
    let items = raw
        .as_array()
        .ok_or_else(|| ReconcileError::malformed(workload, "pod template has no container list"))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            ContainerSpec::from_value(item)
                .map_err(|reason| ReconcileError::malformed(workload, format!("container #{i}: {reason}")))
        })
        .collect()
}

/// Resolve a selector to exactly one container index.
fn resolve(
    workload: &WorkloadRef,
    selector: &ContainerSelector,
    containers: &[ContainerSpec],
) -> Result<usize> {
    match selector {
        ContainerSelector::First if containers.is_empty() => {
            Err(ReconcileError::container_not_found(workload, selector))
        }
        ContainerSelector::First => Ok(0),
        ContainerSelector::Named(name) => {
            let matches = containers
                .iter()
                .positions(|c| &c.name == name)
                .collect_vec();
            match matches.as_slice() {
                [] => Err(ReconcileError::container_not_found(workload, selector)),
                [index] => Ok(*index),
                many => Err(ReconcileError::malformed(
                    workload,
                    format!("container name '{name}' matches {} containers", many.len()),
                )),
            }
        }
    }
}

/// Pick the minimal patch: replace at the first match, otherwise append.
fn decide(request: &ReconcileRequest, index: usize, container: &ContainerSpec) -> Decision {
    let patch = match container.position_of(&request.variable) {
        Some(position) => {
            let existing = container.entries().get(position);
            EnvPatch::ReplaceValue {
                container: index,
                index: position,
                value: request.value.clone(),
                has_literal: existing.is_some_and(|e| e.value.is_some()),
                clears_value_from: existing.is_some_and(|e| e.value_from.is_some()),
            }
        }
        None => {
            let entry = EnvEntry::literal(&request.variable, &request.value);
            if container.env.is_some() {
                EnvPatch::Append {
                    container: index,
                    entry,
                }
            } else {
                EnvPatch::CreateList {
                    container: index,
                    entry,
                }
            }
        }
    };

    let previous = container
        .position_of(&request.variable)
        .and_then(|p| container.entries().get(p))
        .and_then(|e| e.value.clone());

    Decision {
        container_name: container.name.clone(),
        previous,
        patch,
    }
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    store: Option<Arc<dyn EnvStore>>,
    namespace: Option<String>,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            store: None,
            namespace: None,
        }
    }

    /// Set the store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn EnvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the store or a non-empty namespace is missing.
    pub fn build(self) -> Result<Reconciler> {
        let store = self
            .store
            .ok_or_else(|| ReconcileError::invalid_input("store", "a store is required"))?;
        let namespace = self
            .namespace
            .filter(|ns| !ns.is_empty())
            .ok_or_else(|| ReconcileError::invalid_input("namespace", "namespace is required"))?;
        Ok(Reconciler::new(store, namespace))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
