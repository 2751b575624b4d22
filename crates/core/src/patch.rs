//! Position-addressed structural patches over a workload's env lists.
//!
//! An [`EnvPatch`] is rendered as an RFC 6902 JSON Patch document so that the
//! live store and the in-memory store apply exactly the same operations.

use serde_json::{json, Value};

use crate::types::EnvEntry;

/// JSON pointer to the container list of any pod-template owner.
pub const CONTAINERS_PATH: &str = "/spec/template/spec/containers";

/// Annotation written by a restart, same key `kubectl rollout restart` uses.
pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// RFC 7396 merge patch that stamps the pod template with `stamp`.
///
/// Any change to the template makes the controller roll every pod.
#[must_use]
pub fn restart_patch(stamp: &str) -> Value {
    json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": { RESTARTED_AT_ANNOTATION: stamp }
                }
            }
        }
    })
}

/// A single atomic change to one container's env list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvPatch {
    /// Append `entry` to the end of an existing env list.
    Append { container: usize, entry: EnvEntry },
    /// The container has no env list yet: create it holding only `entry`.
    CreateList { container: usize, entry: EnvEntry },
    /// Overwrite the value of the entry at `index`.
    ReplaceValue {
        container: usize,
        index: usize,
        value: String,
        /// Whether the entry currently carries a literal `value` member.
        has_literal: bool,
        /// Whether the entry currently carries `valueFrom`, which must go.
        clears_value_from: bool,
    },
}

impl EnvPatch {
    /// Append a literal entry to an existing list.
    pub fn append(container: usize, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Append {
            container,
            entry: EnvEntry::literal(name, value),
        }
    }

    /// Replace the literal value of the entry at `index`.
    pub fn replace_value(container: usize, index: usize, value: impl Into<String>) -> Self {
        Self::ReplaceValue {
            container,
            index,
            value: value.into(),
            has_literal: true,
            clears_value_from: false,
        }
    }

    /// Whether this patch adds a new entry rather than overwriting one.
    #[must_use]
    pub const fn is_append(&self) -> bool {
        matches!(self, Self::Append { .. } | Self::CreateList { .. })
    }

    /// Raw JSON Patch operations, in application order.
    #[must_use]
    pub fn operations(&self) -> Vec<Value> {
        match self {
            Self::Append { container, entry } => vec![json!({
                "op": "add",
                "path": format!("{CONTAINERS_PATH}/{container}/env/-"),
                "value": entry,
            })],
            Self::CreateList { container, entry } => vec![json!({
                "op": "add",
                "path": format!("{CONTAINERS_PATH}/{container}/env"),
                "value": [entry],
            })],
            Self::ReplaceValue {
                container,
                index,
                value,
                has_literal,
                clears_value_from,
            } => {
                let entry_path = format!("{CONTAINERS_PATH}/{container}/env/{index}");
                let op = if *has_literal { "replace" } else { "add" };
                let mut ops = vec![json!({
                    "op": op,
                    "path": format!("{entry_path}/value"),
                    "value": value,
                })];
                if *clears_value_from {
                    ops.push(json!({
                        "op": "remove",
                        "path": format!("{entry_path}/valueFrom"),
                    }));
                }
                ops
            }
        }
    }

    /// Render as a typed JSON Patch document.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the operations do not form a valid patch.
    pub fn to_json_patch(&self) -> Result<json_patch::Patch, serde_json::Error> {
        serde_json::from_value(Value::Array(self.operations()))
    }

    /// Short human readable description.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Append { container, entry } => {
                format!("append {} to container #{container}", entry.name)
            }
            Self::CreateList { container, entry } => {
                format!("create env list with {} in container #{container}", entry.name)
            }
            Self::ReplaceValue {
                container, index, ..
            } => format!("replace value of env #{index} in container #{container}"),
        }
    }
}
