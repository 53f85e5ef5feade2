//! Configuration validation for the operator.
//!
//! This module checks an [`OperatorConfig`] for values the reconciler cannot
//! work with, collecting every problem before reporting the first one.

use crate::error::{ConfigError, OperatorError, Result};
use crate::rollout::{RestartMode, ZOOKEEPER_KIND};
use tracing::debug;

use super::spec::{OperatorConfig, OperatorSettings, ReconcileConfig};

/// Log levels accepted in `logging.level`.
const KNOWN_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for `reconcile.max_attempts`.
const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Validator for operator configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates an operator configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, config: &OperatorConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if let Some(first_error) = result.errors.first() {
            return Err(OperatorError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }));
        }

        debug!("Configuration validation passed");
        Ok(result)
    }

    /// Runs every check and returns all findings without failing.
    #[must_use]
    pub fn check(&self, config: &OperatorConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_operator(&config.operator, &mut result);
        Self::validate_reconcile(&config.reconcile, &mut result);
        Self::validate_logging(&config.logging.level, &mut result);
        Self::validate_workloads(config, &mut result);

        result
    }

    fn validate_operator(operator: &OperatorSettings, result: &mut ValidationResult) {
        if !is_dns_label(&operator.namespace) {
            result.error(
                "operator.namespace",
                format!(
                    "Namespace '{}' is invalid. Must be a lowercase DNS label of at most 63 characters.",
                    operator.namespace
                ),
            );
        }

        if !is_annotation_key(&operator.generation_annotation) {
            result.error(
                "operator.generation_annotation",
                format!(
                    "'{}' is not a valid annotation key",
                    operator.generation_annotation
                ),
            );
        }

        if operator.operation_timeout_ms == 0 {
            result.error(
                "operator.operation_timeout_ms",
                "Operation timeout must be greater than zero",
            );
        }
    }

    fn validate_reconcile(reconcile: &ReconcileConfig, result: &mut ValidationResult) {
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&reconcile.max_attempts) {
            result.error(
                "reconcile.max_attempts",
                format!(
                    "Max attempts must be between 1 and {MAX_ATTEMPTS_LIMIT}, got {}",
                    reconcile.max_attempts
                ),
            );
        } else if reconcile.max_attempts == 1 {
            result
                .warnings
                .push(String::from("reconcile.max_attempts is 1: conflicts will not be retried"));
        }
    }

    fn validate_logging(level: &str, result: &mut ValidationResult) {
        if !KNOWN_LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            result.error(
                "logging.level",
                format!(
                    "Unknown log level '{level}'. Expected one of: {}",
                    KNOWN_LOG_LEVELS.join(", ")
                ),
            );
        }
    }

    fn validate_workloads(config: &OperatorConfig, result: &mut ValidationResult) {
        for (kind, rules) in &config.workloads {
            let field = format!("workloads.{kind}");

            if !is_dns_label(kind) {
                result.error(
                    &field,
                    format!("Workload kind '{kind}' is invalid. Must be a lowercase DNS label."),
                );
            }

            if kind == ZOOKEEPER_KIND {
                result
                    .warnings
                    .push(format!("{field} overrides the built-in '{ZOOKEEPER_KIND}' rules"));
            }

            if [rules.labels, rules.pod_template, rules.volume_claim_templates]
                .iter()
                .all(|mode| *mode == RestartMode::InPlace)
            {
                result
                    .warnings
                    .push(format!("{field}: no change will ever trigger a rolling restart"));
            }
        }
    }
}

/// Checks for an RFC 1123 label: lowercase alphanumerics and hyphens,
/// starting and ending with an alphanumeric, at most 63 characters.
pub(crate) fn is_dns_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= 63
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        }
        _ => false,
    }
}

/// Checks for an RFC 1123 subdomain: dot-separated labels, at most 253
/// characters.
pub(crate) fn is_dns_subdomain(name: &str) -> bool {
    name.len() <= 253 && name.split('.').all(is_dns_label)
}

/// Checks for a qualified annotation key: an optional DNS subdomain prefix
/// followed by `/`, then a name of at most 63 characters.
fn is_annotation_key(key: &str) -> bool {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix
        && !is_dns_subdomain(prefix)
    {
        return false;
    }

    let bytes = name.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= 63
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

impl ValidationResult {
    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
