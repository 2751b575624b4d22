//! Core error types for orchestrator store operations.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use thiserror::Error;

/// Failure reported by an [`EnvStore`](crate::store::EnvStore) or
/// [`RolloutControl`](crate::store::RolloutControl) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("workload '{workload}' not found in namespace '{namespace}'")]
    WorkloadNotFound { namespace: String, workload: String },

    #[error("not authorized to {operation} '{workload}': {reason}")]
    Unauthorized {
        operation: String,
        workload: String,
        reason: String,
    },

    #[error("transport error during {operation}: {reason}")]
    Transport { operation: String, reason: String },

    #[error("patch rejected for '{workload}': {reason}")]
    Rejected { workload: String, reason: String },

    #[error("conflicting update on '{workload}': {reason}")]
    Conflict { workload: String, reason: String },
}

impl StoreError {
    /// Create a workload not found error.
    pub fn workload_not_found(namespace: impl Into<String>, workload: impl Into<String>) -> Self {
        Self::WorkloadNotFound {
            namespace: namespace.into(),
            workload: workload.into(),
        }
    }

    /// Create an unauthorized error.
    pub fn unauthorized(
        operation: impl Into<String>,
        workload: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Unauthorized {
            operation: operation.into(),
            workload: workload.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a rejected patch error.
    pub fn rejected(workload: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            workload: workload.into(),
            reason: reason.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(workload: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conflict {
            workload: workload.into(),
            reason: reason.into(),
        }
    }

    /// Whether a caller may reasonably try the same operation again.
    ///
    /// Only transient failures qualify; the core itself never retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Conflict { .. })
    }
}
