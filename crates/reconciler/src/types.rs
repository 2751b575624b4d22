//! Core types for the reconciler.

use std::fmt;

use retarget_core::{ContainerSelector, EnvPatch, WorkloadRef};
use serde::Serialize;

use crate::error::{ReconcileError, Result};

/// One desired `(workload, container, variable, value)` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    pub workload: WorkloadRef,
    pub selector: ContainerSelector,
    pub variable: String,
    pub value: String,
}

impl ReconcileRequest {
    /// Create a request.
    pub fn new(
        workload: WorkloadRef,
        selector: ContainerSelector,
        variable: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            workload,
            selector,
            variable: variable.into(),
            value: value.into(),
        }
    }

    /// Check the call preconditions.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty workload name, container name,
    /// variable name or value.
    pub fn validate(&self) -> Result<()> {
        if self.workload.name.is_empty() {
            return Err(ReconcileError::invalid_input("workload", "name is empty"));
        }
        if matches!(&self.selector, ContainerSelector::Named(name) if name.is_empty()) {
            return Err(ReconcileError::invalid_input("container", "name is empty"));
        }
        if self.variable.is_empty() {
            return Err(ReconcileError::invalid_input("variable", "name is empty"));
        }
        if self.value.is_empty() {
            return Err(ReconcileError::invalid_input("value", "desired value is empty"));
        }
        Ok(())
    }
}

impl fmt::Display for ReconcileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {} ({})", self.variable, self.workload, self.selector)
    }
}

/// What a reconciliation call decided to write, before writing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Name of the resolved container.
    pub container_name: String,
    /// Value found at the first matching entry, if there was one.
    pub previous: Option<String>,
    /// The structural patch to submit.
    pub patch: EnvPatch,
}

impl Decision {
    /// The outcome reported once `patch` has been applied.
    #[must_use]
    pub fn applied(&self) -> Applied {
        match &self.patch {
            EnvPatch::Append { container, .. } | EnvPatch::CreateList { container, .. } => {
                Applied::Appended {
                    container: self.container_name.clone(),
                    container_index: *container,
                }
            }
            EnvPatch::ReplaceValue {
                container, index, ..
            } => Applied::Replaced {
                container: self.container_name.clone(),
                container_index: *container,
                index: *index,
                previous: self.previous.clone(),
            },
        }
    }
}

/// Successful outcome of a reconciliation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum Applied {
    /// The variable was absent and has been appended.
    Appended {
        container: String,
        container_index: usize,
    },
    /// The first entry with the variable's name had its value overwritten.
    Replaced {
        container: String,
        container_index: usize,
        index: usize,
        previous: Option<String>,
    },
}

impl Applied {
    #[must_use]
    pub const fn is_append(&self) -> bool {
        matches!(self, Self::Appended { .. })
    }

    /// Whether the write left the stored value as it already was.
    #[must_use]
    pub fn was_noop(&self, desired: &str) -> bool {
        matches!(self, Self::Replaced { previous: Some(prev), .. } if prev == desired)
    }
}

impl fmt::Display for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Appended { container, .. } => write!(f, "appended to {container}"),
            Self::Replaced {
                container, index, ..
            } => write!(f, "replaced env #{index} of {container}"),
        }
    }
}
