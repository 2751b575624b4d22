//! Run configuration.
//!
//! # Hierarchy
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Config file (`retarget.toml`, or `RETARGET_CONFIG`)
//! 3. Environment variables: `RETARGET_*`
//! 4. CLI flags
//!
//! # Example Config
//!
//! ```toml
//! namespace = "otel-demo"
//!
//! [collector]
//! endpoint = "http://otel-gateway.observability.svc:4317"
//!
//! [[workloads]]
//! name = "checkout"
//! container = "checkout"
//! [workloads.env]
//! OTEL_EXPORTER_OTLP_ENDPOINT = "{collector}"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use retarget_core::{ContainerSelector, WorkloadKind, WorkloadRef};
use retarget_reconciler::ReconcileRequest;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Placeholder replaced by the collector endpoint in env values.
pub const COLLECTOR_PLACEHOLDER: &str = "{collector}";

/// Config file used when neither `-c` nor `RETARGET_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "retarget.toml";

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub namespace: String,
    pub fail_fast: bool,
    pub collector: CollectorConfig,
    pub rollout: RolloutConfig,
    pub retry: RetryConfig,
    pub workloads: Vec<WorkloadConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollectorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RolloutConfig {
    pub restart: bool,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub backoff_ms: u64,
}

/// One workload and the env values its container should carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub name: String,
    #[serde(default)]
    pub kind: WorkloadKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            fail_fast: false,
            collector: CollectorConfig::default(),
            rollout: RolloutConfig::default(),
            retry: RetryConfig::default(),
            workloads: Vec::new(),
        }
    }
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            restart: true,
            timeout_secs: 300,
            poll_interval_secs: 5,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 1,
            backoff_ms: 500,
        }
    }
}

impl WorkloadConfig {
    #[must_use]
    pub fn workload_ref(&self) -> WorkloadRef {
        WorkloadRef::new(self.kind, self.name.clone())
    }
}

/// Values given on the command line; `None`/`false` leaves the config as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub namespace: Option<String>,
    pub collector: Option<String>,
    pub fail_fast: bool,
    pub no_restart: bool,
    pub timeout_secs: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════════════════════════════════════

/// Resolve the config file path: explicit flag, then `RETARGET_CONFIG`, then default.
pub fn config_path<F>(explicit: Option<PathBuf>, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .or_else(|| lookup("RETARGET_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from all sources with hierarchy
///
/// # Errors
///
/// Returns error if:
/// - The config file cannot be read or is malformed TOML
/// - An environment override cannot be parsed
/// - The resulting values fail validation
pub fn load_config<F>(path: &Path, lookup: F, overrides: &Overrides) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::from_file(path)?;
    config.apply_env(lookup)?;
    config.apply_overrides(overrides);
    config.validate()?;
    config.substitute_placeholders();

    tracing::debug!(
        path = %path.display(),
        namespace = %config.namespace,
        workloads = config.workloads.len(),
        "Configuration loaded"
    );
    Ok(config)
}

impl Config {
    /// Parse a TOML file; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is malformed TOML
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Io(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))
    }

    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML decoding error
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `RETARGET_*` overrides, reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns error if a boolean or numeric override does not parse
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("RETARGET_NAMESPACE") {
            self.namespace = value;
        }

        if let Some(value) = lookup("RETARGET_COLLECTOR_ENDPOINT") {
            self.collector.endpoint = Some(value);
        }

        if let Some(value) = lookup("RETARGET_FAIL_FAST") {
            self.fail_fast = value.parse().map_err(|e| {
                ConfigError::invalid(format!("Invalid RETARGET_FAIL_FAST value: {e}"))
            })?;
        }

        if let Some(value) = lookup("RETARGET_ROLLOUT_TIMEOUT_SECS") {
            self.rollout.timeout_secs = value.parse().map_err(|e| {
                ConfigError::invalid(format!("Invalid RETARGET_ROLLOUT_TIMEOUT_SECS value: {e}"))
            })?;
        }

        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(namespace) = &overrides.namespace {
            self.namespace.clone_from(namespace);
        }
        if let Some(endpoint) = &overrides.collector {
            self.collector.endpoint = Some(endpoint.clone());
        }
        if overrides.fail_fast {
            self.fail_fast = true;
        }
        if overrides.no_restart {
            self.rollout.restart = false;
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.rollout.timeout_secs = timeout;
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error on the first value that cannot drive a run
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::invalid("namespace must not be empty"));
        }
        if self.workloads.is_empty() {
            return Err(ConfigError::invalid("at least one workload is required"));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::invalid("retry.attempts must be at least 1"));
        }
        if self.rollout.poll_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "rollout.poll_interval_secs must be greater than 0",
            ));
        }

        let has_endpoint = self
            .collector
            .endpoint
            .as_deref()
            .is_some_and(|e| !e.is_empty());
        let mut seen = HashSet::new();

        for workload in &self.workloads {
            let reference = workload.workload_ref();
            if workload.name.is_empty() {
                return Err(ConfigError::invalid("workload name must not be empty"));
            }
            if !seen.insert(reference.clone()) {
                return Err(ConfigError::invalid(format!(
                    "{reference} is listed more than once"
                )));
            }
            if workload.container.as_deref() == Some("") {
                return Err(ConfigError::invalid(format!(
                    "{reference}: container name must not be empty"
                )));
            }
            for (variable, value) in &workload.env {
                if variable.is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "{reference}: env variable name must not be empty"
                    )));
                }
                if value.is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "{reference}: value of {variable} must not be empty"
                    )));
                }
                if value.contains(COLLECTOR_PLACEHOLDER) && !has_endpoint {
                    return Err(ConfigError::invalid(format!(
                        "{reference}: {variable} uses {COLLECTOR_PLACEHOLDER} but collector.endpoint is not set"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Replace `{collector}` in every env value with the collector endpoint.
    pub fn substitute_placeholders(&mut self) {
        let Some(endpoint) = self.collector.endpoint.clone() else {
            return;
        };
        for value in self.workloads.iter_mut().flat_map(|w| w.env.values_mut()) {
            *value = value.replace(COLLECTOR_PLACEHOLDER, &endpoint);
        }
    }

    /// Flatten into reconcile requests: workloads in file order, variables
    /// in lexical order.
    #[must_use]
    pub fn assignments(&self) -> Vec<ReconcileRequest> {
        self.workloads
            .iter()
            .flat_map(|workload| {
                let selector = ContainerSelector::from_name(workload.container.clone());
                workload.env.iter().map(move |(variable, value)| {
                    ReconcileRequest::new(
                        workload.workload_ref(),
                        selector.clone(),
                        variable.clone(),
                        value.clone(),
                    )
                })
            })
            .collect()
    }

    #[must_use]
    pub fn workload_refs(&self) -> Vec<WorkloadRef> {
        self.workloads.iter().map(WorkloadConfig::workload_ref).collect()
    }
}

impl RolloutConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════
