//! Error types for the reconciler crate.

use retarget_core::{ContainerSelector, StoreError, WorkloadRef};
use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Why a single reconciliation call failed.
///
/// Every variant aborts only the call that produced it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// The selector did not resolve to a container of the live spec.
    #[error("{selector} not found in {workload}")]
    ContainerNotFound {
        workload: WorkloadRef,
        selector: ContainerSelector,
    },

    /// Read or write against the orchestrator failed; passed through as-is.
    #[error("external store error: {0}")]
    ExternalStore(#[from] StoreError),

    /// Live state does not have the expected container/env shape.
    #[error("malformed state in {workload}: {reason}")]
    MalformedState { workload: WorkloadRef, reason: String },

    /// A call argument violates its precondition.
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

impl ReconcileError {
    /// Create a container not found error.
    pub fn container_not_found(workload: &WorkloadRef, selector: &ContainerSelector) -> Self {
        Self::ContainerNotFound {
            workload: workload.clone(),
            selector: selector.clone(),
        }
    }

    /// Create a malformed state error.
    pub fn malformed(workload: &WorkloadRef, reason: impl Into<String>) -> Self {
        Self::MalformedState {
            workload: workload.clone(),
            reason: reason.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call could succeed without operator action.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ExternalStore(e) => e.is_retryable(),
            Self::ContainerNotFound { .. }
            | Self::MalformedState { .. }
            | Self::InvalidInput { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReconcileError::container_not_found(
            &WorkloadRef::deployment("checkout"),
            &ContainerSelector::Named("sidecar".to_string()),
        );
        assert!(err.to_string().contains("sidecar"));
        assert!(err.to_string().contains("deployment/checkout"));
    }

    #[test]
    fn test_store_errors_convert_unmodified() {
        let store_err = StoreError::transport("get", "connection refused");
        let err: ReconcileError = store_err.clone().into();
        assert_eq!(err, ReconcileError::ExternalStore(store_err));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_shape_errors_are_not_retryable() {
        let workload = WorkloadRef::deployment("cart");
        assert!(!ReconcileError::malformed(&workload, "env is a string").is_retryable());
        assert!(!ReconcileError::container_not_found(&workload, &ContainerSelector::First)
            .is_retryable());
    }
}
