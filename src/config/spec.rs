//! Configuration specification types for the operator.
//!
//! This module defines the structs that map to the `ensemble-operator.yaml`
//! file. Every section is optional; missing fields take their defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::rollout::{RestartRules, DEFAULT_GENERATION_ANNOTATION};

/// The root configuration structure of the operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OperatorConfig {
    /// Operator-level settings.
    pub operator: OperatorSettings,
    /// Retry settings of the reconciliation driver.
    pub reconcile: ReconcileConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Local workload store settings.
    pub store: StoreConfig,
    /// Restart rules per workload kind.
    pub workloads: BTreeMap<String, RestartRules>,
}

/// Operator-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OperatorSettings {
    /// Namespace used for manifests that do not set one.
    pub namespace: String,
    /// Pod template annotation holding the generation marker.
    pub generation_annotation: String,
    /// Upper bound for each API call, in milliseconds.
    pub operation_timeout_ms: u64,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            generation_annotation: DEFAULT_GENERATION_ANNOTATION.to_string(),
            operation_timeout_ms: 300_000,
        }
    }
}

/// Retry settings of the reconciliation driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Maximum attempts per pass.
    pub max_attempts: u32,
    /// Delay between attempts after a timeout or unavailability, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 2_000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            json: false,
        }
    }
}

/// Local workload store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Store directory; defaults to `.ensemble/workloads` beside the config file.
    pub path: Option<String>,
}

fn default_namespace() -> String {
    String::from("default")
}
