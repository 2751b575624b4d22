//! Idempotent environment-variable reconciliation for container workloads.
//!
//! Given a workload, a container selector, a variable name and a desired
//! value, the [`Reconciler`]:
//!
//! 1. Reads the live container list (one read, no cache)
//! 2. Resolves the selector to exactly one container
//! 3. Finds the first env entry with the variable's name
//! 4. Appends the entry if absent, otherwise overwrites only its value
//! 5. Submits that change as one position-addressed, atomic patch
//!
//! Unrelated entries keep their values and positions. Calling twice with the
//! same input leaves the same state as calling once; the second call takes
//! the replace path.
//!
//! # Example
//!
//! ```ignore
//! use retarget_core::{ContainerSelector, InMemoryCluster, WorkloadRef};
//! use retarget_reconciler::Reconciler;
//!
//! let cluster = InMemoryCluster::new_arc();
//! let reconciler = Reconciler::new(cluster, "otel-demo");
//! let applied = reconciler
//!     .reconcile_env(
//!         &WorkloadRef::deployment("checkout"),
//!         &ContainerSelector::First,
//!         "OTEL_EXPORTER_OTLP_ENDPOINT",
//!         "http://otel-gateway:4317",
//!     )
//!     .await?;
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod reconciler;
pub mod types;

// Re-export main types
pub use error::{ReconcileError, Result};
pub use reconciler::{Reconciler, ReconcilerBuilder};
pub use types::{Applied, Decision, ReconcileRequest};
