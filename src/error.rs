//! Error types for the ensemble set operator.
//!
//! This module provides the error hierarchy for every stage of a
//! reconciliation pass: configuration, workload API access, diff
//! computation, and the reconciliation driver itself.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the ensemble set operator.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Workload API errors.
    #[error("Workload API error: {0}")]
    Api(#[from] ApiError),

    /// Diff computation errors.
    #[error("Diff error: {0}")]
    Diff(#[from] DiffError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration or manifest could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// An environment override could not be interpreted.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// Workload API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The object does not exist.
    #[error("Workload not found: {key}")]
    NotFound {
        /// Key of the missing workload.
        key: String,
    },

    /// The object already exists.
    #[error("Workload already exists: {key}")]
    AlreadyExists {
        /// Key of the existing workload.
        key: String,
    },

    /// The write was based on a stale resource version.
    #[error("Conflict writing {key}: expected resource version {expected}, found {found}")]
    Conflict {
        /// Key of the workload.
        key: String,
        /// Resource version the writer based its change on.
        expected: String,
        /// Resource version currently stored.
        found: String,
    },

    /// An API call did not complete in time.
    #[error("Timed out after {timeout_ms}ms during {operation} of {key}")]
    Timeout {
        /// Operation that timed out.
        operation: String,
        /// Key of the workload.
        key: String,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The backend is temporarily unavailable.
    #[error("Workload API unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// Stored data could not be read back.
    #[error("Stored workload is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("Workload serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },
}

/// Diff computation errors.
#[derive(Debug, Error)]
pub enum DiffError {
    /// A snapshot could not be converted for comparison.
    #[error("Failed to serialize {side} snapshot: {message}")]
    Serialization {
        /// Which snapshot failed (`current` or `desired`).
        side: &'static str,
        /// Description of the serialization error.
        message: String,
    },

    /// A path pattern failed to compile.
    #[error("Invalid path pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Description of the compile error.
        message: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Maximum retry attempts exceeded.
    #[error("Maximum retry attempts ({attempts}) exceeded for {resource}: {last_error}")]
    MaxRetriesExceeded {
        /// Number of attempts made.
        attempts: u32,
        /// Resource that failed.
        resource: String,
        /// Last error observed.
        last_error: String,
    },

    /// No specialization is registered for a workload kind.
    #[error("No rollout specialization registered for workload kind '{kind}'")]
    UnknownKind {
        /// The requested kind.
        kind: String,
    },

    /// The desired object cannot be reconciled.
    #[error("Invalid workload {resource}: {reason}")]
    InvalidWorkload {
        /// Resource being reconciled.
        resource: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Reconciliation was aborted.
    #[error("Reconciliation aborted: {reason}")]
    Aborted {
        /// Reason for abort.
        reason: String,
    },
}

/// Result type alias for operator operations.
pub type Result<T> = std::result::Result<T, OperatorError>;

impl OperatorError {
    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Api(
                ApiError::Conflict { .. } | ApiError::Timeout { .. } | ApiError::Unavailable { .. }
            )
        )
    }

    /// Returns the suggested retry delay in milliseconds, if applicable.
    ///
    /// Conflicts are retried right away since the next attempt re-reads
    /// the object; other retryable errors use the configured backoff.
    #[must_use]
    pub const fn retry_delay_ms(&self, backoff_ms: u64) -> Option<u64> {
        match self {
            Self::Api(ApiError::Conflict { .. }) => Some(0),
            Self::Api(ApiError::Timeout { .. } | ApiError::Unavailable { .. }) => Some(backoff_ms),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error with an optional location.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: Option<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location,
        }
    }
}

impl ApiError {
    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an unavailability error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_and_timeouts_are_retryable() {
        let conflict = OperatorError::Api(ApiError::Conflict {
            key: String::from("zk/zk"),
            expected: String::from("1"),
            found: String::from("2"),
        });
        let timeout = OperatorError::Api(ApiError::Timeout {
            operation: String::from("get"),
            key: String::from("zk/zk"),
            timeout_ms: 10,
        });

        assert!(conflict.is_retryable());
        assert_eq!(conflict.retry_delay_ms(500), Some(0));
        assert!(timeout.is_retryable());
        assert_eq!(timeout.retry_delay_ms(500), Some(500));
    }

    #[test]
    fn test_fatal_errors_are_not_retryable() {
        let not_found = OperatorError::Api(ApiError::NotFound {
            key: String::from("zk/zk"),
        });
        let diff = OperatorError::Diff(DiffError::Serialization {
            side: "current",
            message: String::from("bad"),
        });

        assert!(!not_found.is_retryable());
        assert!(!diff.is_retryable());
        assert_eq!(diff.retry_delay_ms(500), None);
    }
}
