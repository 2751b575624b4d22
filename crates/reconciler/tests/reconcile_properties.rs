//! Behavioral tests for env reconciliation against the in-memory cluster.
//!
//! These tests verify that:
//! - Repeated calls converge and take the replace path
//! - Unrelated entries keep their values and positions
//! - Only the first of duplicate entries is touched
//! - Container selection never leaks into other containers
//! - Failed writes leave the observed state unchanged

#![forbid(clippy::unwrap_used)]
#![forbid(clippy::expect_used)]

use std::sync::Arc;

use retarget_core::memory::container;
use retarget_core::{ContainerSelector, InMemoryCluster, StoreError, WorkloadRef};
use retarget_reconciler::{Applied, ReconcileError, Reconciler};
use serde_json::json;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const NS: &str = "otel-demo";

fn pairs(items: &[(&str, &str)]) -> Vec<(String, Option<String>)> {
    items
        .iter()
        .map(|(n, v)| ((*n).to_string(), Some((*v).to_string())))
        .collect()
}

async fn setup(workload: &WorkloadRef, containers: Vec<serde_json::Value>) -> (Arc<InMemoryCluster>, Reconciler) {
    let cluster = InMemoryCluster::new_arc();
    cluster.insert_workload(NS, workload, containers).await;
    let reconciler = Reconciler::new(cluster.clone(), NS);
    (cluster, reconciler)
}

/// # GIVEN
/// A container without the variable
///
/// # WHEN
/// The same reconciliation runs twice
///
/// # THEN
/// The first call appends, the second replaces, and the state matches a single call
#[tokio::test]
async fn test_idempotence_second_call_replaces() -> TestResult {
    // GIVEN
    let workload = WorkloadRef::deployment("checkout");
    let (cluster, reconciler) = setup(&workload, vec![container("checkout", &[("A", "1")])]).await;

    // WHEN
    let first = reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "C", "3")
        .await?;
    let after_first = cluster.containers(NS, &workload).await;
    let second = reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "C", "3")
        .await?;

    // THEN
    assert!(first.is_append());
    assert!(!second.is_append());
    assert!(second.was_noop("3"));
    assert_eq!(cluster.containers(NS, &workload).await, after_first);
    assert_eq!(
        cluster.env_of(NS, &workload, "checkout").await,
        Some(pairs(&[("A", "1"), ("C", "3")]))
    );
    Ok(())
}

#[tokio::test]
async fn test_isolation_append_keeps_existing_order() -> TestResult {
    let workload = WorkloadRef::deployment("checkout");
    let (cluster, reconciler) =
        setup(&workload, vec![container("checkout", &[("A", "1"), ("B", "2")])]).await;

    reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "C", "3")
        .await?;

    assert_eq!(
        cluster.env_of(NS, &workload, "checkout").await,
        Some(pairs(&[("A", "1"), ("B", "2"), ("C", "3")]))
    );
    Ok(())
}

#[tokio::test]
async fn test_overwrite_in_place() -> TestResult {
    let workload = WorkloadRef::deployment("checkout");
    let (cluster, reconciler) =
        setup(&workload, vec![container("checkout", &[("A", "1"), ("B", "2")])]).await;

    let applied = reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "B", "9")
        .await?;

    assert_eq!(
        applied,
        Applied::Replaced {
            container: "checkout".to_string(),
            container_index: 0,
            index: 1,
            previous: Some("2".to_string()),
        }
    );
    assert_eq!(
        cluster.env_of(NS, &workload, "checkout").await,
        Some(pairs(&[("A", "1"), ("B", "9")]))
    );
    Ok(())
}

#[tokio::test]
async fn test_first_match_policy() -> TestResult {
    let workload = WorkloadRef::deployment("checkout");
    let (cluster, reconciler) =
        setup(&workload, vec![container("checkout", &[("A", "1"), ("A", "2")])]).await;

    reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "A", "9")
        .await?;

    assert_eq!(
        cluster.env_of(NS, &workload, "checkout").await,
        Some(pairs(&[("A", "9"), ("A", "2")]))
    );
    Ok(())
}

/// # GIVEN
/// A workload with containers `main` and `sidecar`
///
/// # WHEN
/// `sidecar` is selected by name, then a missing name is selected
///
/// # THEN
/// Only `sidecar` changes; the missing name fails and changes nothing
#[tokio::test]
async fn test_container_selector_correctness() -> TestResult {
    // GIVEN
    let workload = WorkloadRef::deployment("frontend");
    let (cluster, reconciler) = setup(
        &workload,
        vec![
            container("main", &[("A", "1")]),
            container("sidecar", &[("A", "1")]),
        ],
    )
    .await;

    // WHEN
    let applied = reconciler
        .reconcile_env(
            &workload,
            &ContainerSelector::Named("sidecar".to_string()),
            "A",
            "2",
        )
        .await?;

    // THEN
    assert!(matches!(applied, Applied::Replaced { container_index: 1, .. }));
    assert_eq!(cluster.env_of(NS, &workload, "main").await, Some(pairs(&[("A", "1")])));
    assert_eq!(cluster.env_of(NS, &workload, "sidecar").await, Some(pairs(&[("A", "2")])));

    // WHEN
    let before = cluster.containers(NS, &workload).await;
    let missing = reconciler
        .reconcile_env(
            &workload,
            &ContainerSelector::Named("proxy".to_string()),
            "A",
            "3",
        )
        .await;

    // THEN
    assert!(matches!(missing, Err(ReconcileError::ContainerNotFound { .. })));
    assert_eq!(cluster.containers(NS, &workload).await, before);
    Ok(())
}

#[tokio::test]
async fn test_atomicity_on_write_failure() -> TestResult {
    let workload = WorkloadRef::deployment("checkout");
    let (cluster, reconciler) =
        setup(&workload, vec![container("checkout", &[("A", "1"), ("B", "2")])]).await;
    let before = cluster.containers(NS, &workload).await;
    cluster
        .fail_next_write(StoreError::unauthorized("patch", "deployment/checkout", "forbidden"))
        .await;

    let result = reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "B", "9")
        .await;

    assert!(matches!(
        result,
        Err(ReconcileError::ExternalStore(StoreError::Unauthorized { .. }))
    ));
    assert_eq!(cluster.containers(NS, &workload).await, before);
    assert_eq!(cluster.write_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_read_failure_propagates_unmodified() -> TestResult {
    let workload = WorkloadRef::deployment("checkout");
    let (cluster, reconciler) = setup(&workload, vec![container("checkout", &[])]).await;
    let injected = StoreError::transport("get", "connection refused");
    cluster.fail_next_read(injected.clone()).await;

    let result = reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "A", "1")
        .await;

    assert_eq!(result, Err(ReconcileError::ExternalStore(injected)));
    Ok(())
}

#[tokio::test]
async fn test_unknown_workload_is_store_error() -> TestResult {
    let cluster = InMemoryCluster::new_arc();
    let reconciler = Reconciler::new(cluster, NS);

    let result = reconciler
        .reconcile_env(
            &WorkloadRef::deployment("ghost"),
            &ContainerSelector::First,
            "A",
            "1",
        )
        .await;

    assert!(matches!(
        result,
        Err(ReconcileError::ExternalStore(StoreError::WorkloadNotFound { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_missing_env_list_is_treated_as_empty() -> TestResult {
    let workload = WorkloadRef::deployment("worker");
    let (cluster, reconciler) =
        setup(&workload, vec![json!({"name": "worker", "image": "worker:1"})]).await;

    let first = reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "A", "1")
        .await?;
    let second = reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "B", "2")
        .await?;

    assert!(first.is_append());
    assert!(second.is_append());
    assert_eq!(
        cluster.env_of(NS, &workload, "worker").await,
        Some(pairs(&[("A", "1"), ("B", "2")]))
    );
    Ok(())
}

#[tokio::test]
async fn test_null_env_list_is_replaced_by_new_list() -> TestResult {
    let workload = WorkloadRef::deployment("worker");
    let (cluster, reconciler) = setup(
        &workload,
        vec![
            json!({"name": "worker", "image": "worker:1", "env": null}),
            container("sidecar", &[("S", "1")]),
        ],
    )
    .await;

    let applied = reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "A", "1")
        .await?;

    assert!(applied.is_append());
    assert_eq!(cluster.write_count().await, 1);
    assert_eq!(
        cluster.env_of(NS, &workload, "worker").await,
        Some(pairs(&[("A", "1")]))
    );
    assert_eq!(
        cluster.env_of(NS, &workload, "sidecar").await,
        Some(pairs(&[("S", "1")]))
    );
    Ok(())
}

#[tokio::test]
async fn test_value_from_entry_becomes_literal() -> TestResult {
    let workload = WorkloadRef::deployment("api");
    let (cluster, reconciler) = setup(
        &workload,
        vec![json!({
            "name": "api",
            "env": [
                {"name": "A", "value": "1"},
                {"name": "ENDPOINT", "valueFrom": {"configMapKeyRef": {"name": "otel", "key": "endpoint"}}}
            ]
        })],
    )
    .await;

    reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "ENDPOINT", "http://gw:4317")
        .await?;

    let containers = cluster.containers(NS, &workload).await.unwrap_or_default();
    let entry = containers
        .first()
        .and_then(|c| c.pointer("/env/1"))
        .cloned();
    assert_eq!(entry, Some(json!({"name": "ENDPOINT", "value": "http://gw:4317"})));
    Ok(())
}

#[tokio::test]
async fn test_malformed_entry_is_fatal() -> TestResult {
    let workload = WorkloadRef::deployment("api");
    let (cluster, reconciler) = setup(
        &workload,
        vec![json!({"name": "api", "env": [{"value": "no-name"}]})],
    )
    .await;

    let result = reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "A", "1")
        .await;

    assert!(matches!(result, Err(ReconcileError::MalformedState { .. })));
    assert_eq!(cluster.write_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_value_stored_verbatim() -> TestResult {
    let workload = WorkloadRef::deployment("api");
    let (cluster, reconciler) = setup(&workload, vec![container("api", &[])]).await;

    reconciler
        .reconcile_env(&workload, &ContainerSelector::First, "A", " Http://GW:4317 ")
        .await?;

    assert_eq!(
        cluster.env_of(NS, &workload, "api").await,
        Some(pairs(&[("A", " Http://GW:4317 ")]))
    );
    Ok(())
}
