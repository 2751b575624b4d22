//! Domain types shared by the reconciler, the stores and the driver.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of pod-template owning workload.
///
/// Deserializes through [`FromStr`], so config files accept the same
/// short names (`deploy`, `sts`, `ds`) as the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum WorkloadKind {
    #[default]
    Deployment,
    StatefulSet,
    DaemonSet,
}

impl WorkloadKind {
    /// Lowercase kind name as used in `kind/name` references.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::StatefulSet => "statefulset",
            Self::DaemonSet => "daemonset",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deployment" | "deploy" => Ok(Self::Deployment),
            "statefulset" | "sts" => Ok(Self::StatefulSet),
            "daemonset" | "ds" => Ok(Self::DaemonSet),
            other => Err(format!("unknown workload kind '{other}'")),
        }
    }
}

impl TryFrom<String> for WorkloadKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Reference to a workload inside the run's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub kind: WorkloadKind,
    pub name: String,
}

impl WorkloadRef {
    /// Create a workload reference.
    pub fn new(kind: WorkloadKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Shorthand for a deployment reference.
    pub fn deployment(name: impl Into<String>) -> Self {
        Self::new(WorkloadKind::Deployment, name)
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Rule used to pick a container inside a workload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerSelector {
    /// Index 0, the convention for single-container workloads.
    #[default]
    First,
    /// Exact container name, for workloads with several containers.
    Named(String),
}

impl ContainerSelector {
    /// Selector for an optional container name; `None` picks the first container.
    pub fn from_name(name: Option<impl Into<String>>) -> Self {
        name.map_or(Self::First, |n| Self::Named(n.into()))
    }
}

impl fmt::Display for ContainerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("<first container>"),
            Self::Named(name) => write!(f, "container '{name}'"),
        }
    }
}

/// One environment entry of a container.
///
/// `value` is absent for entries sourced through `valueFrom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<Value>,
}

impl EnvEntry {
    /// Literal `name=value` entry.
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        }
    }
}

/// The parts of a live container spec the reconciler cares about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    /// `None` when the container has no env list at all (or an explicit null).
    #[serde(default)]
    pub env: Option<Vec<EnvEntry>>,
}

impl ContainerSpec {
    /// Parse one raw container object as returned by a store.
    ///
    /// # Errors
    ///
    /// Returns the parser message when the object lacks a name or an env entry
    /// does not have the `{name, value}` shape.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        Self::deserialize(value).map_err(|e| e.to_string())
    }

    /// Env entries, treating a missing list as empty.
    #[must_use]
    pub fn entries(&self) -> &[EnvEntry] {
        self.env.as_deref().unwrap_or_default()
    }

    /// Position of the first entry named `name`.
    #[must_use]
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.name == name)
    }
}

/// Observed progress of a workload rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RolloutStatus {
    Complete,
    Progressing { reason: String },
    Failed { reason: String },
}

impl RolloutStatus {
    /// Create a progressing status.
    pub fn progressing(reason: impl Into<String>) -> Self {
        Self::Progressing {
            reason: reason.into(),
        }
    }

    /// Create a failed status.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for RolloutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => f.write_str("complete"),
            Self::Progressing { reason } => write!(f, "progressing ({reason})"),
            Self::Failed { reason } => write!(f, "failed ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use super::*;
    use serde_json::json;

    #[test]
    fn test_workload_ref_display() {
        let workload = WorkloadRef::new(WorkloadKind::StatefulSet, "kafka");
        assert_eq!(workload.to_string(), "statefulset/kafka");
    }

    #[test]
    fn test_workload_kind_parse_aliases() {
        assert_eq!("Deployment".parse::<WorkloadKind>(), Ok(WorkloadKind::Deployment));
        assert_eq!("sts".parse::<WorkloadKind>(), Ok(WorkloadKind::StatefulSet));
        assert_eq!("ds".parse::<WorkloadKind>(), Ok(WorkloadKind::DaemonSet));
        assert!("cronjob".parse::<WorkloadKind>().is_err());
    }

    #[test]
    fn test_selector_from_name() {
        assert_eq!(ContainerSelector::from_name(None::<String>), ContainerSelector::First);
        assert_eq!(
            ContainerSelector::from_name(Some("sidecar")),
            ContainerSelector::Named("sidecar".to_string())
        );
    }

    #[test]
    fn test_container_without_env_is_empty() {
        let spec = ContainerSpec::from_value(&json!({"name": "main", "image": "app:1"})).unwrap();
        assert!(spec.env.is_none());
        assert!(spec.entries().is_empty());

        let spec = ContainerSpec::from_value(&json!({"name": "main", "env": null})).unwrap();
        assert!(spec.entries().is_empty());
    }

    #[test]
    fn test_container_parses_value_from_entries() {
        let spec = ContainerSpec::from_value(&json!({
            "name": "main",
            "env": [
                {"name": "A", "value": "1"},
                {"name": "POD_IP", "valueFrom": {"fieldRef": {"fieldPath": "status.podIP"}}}
            ]
        }))
        .unwrap();

        assert_eq!(spec.entries().len(), 2);
        assert_eq!(spec.position_of("POD_IP"), Some(1));
        assert!(spec.entries()[1].value.is_none());
        assert!(spec.entries()[1].value_from.is_some());
    }

    #[test]
    fn test_entry_without_name_is_rejected() {
        let result = ContainerSpec::from_value(&json!({
            "name": "main",
            "env": [{"value": "orphan"}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_position_of_returns_first_match() {
        let spec = ContainerSpec {
            name: "main".to_string(),
            env: Some(vec![EnvEntry::literal("A", "1"), EnvEntry::literal("A", "2")]),
        };
        assert_eq!(spec.position_of("A"), Some(0));
        assert_eq!(spec.position_of("B"), None);
    }
}
