//! Configuration module for the ensemble set operator.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `ensemble-operator.yaml`
//! - Environment overrides and `.env` loading
//! - Validation of configuration values
//! - Loading `StatefulSet` manifests

mod parser;
mod spec;
mod validator;

pub use parser::{
    find_config_file, load_manifest, ConfigParser, DEFAULT_CONFIG_FILES, ENV_LOG_LEVEL,
    ENV_NAMESPACE, ENV_OPERATION_TIMEOUT_MS, ENV_STORE_PATH,
};
pub use spec::{LoggingConfig, OperatorConfig, OperatorSettings, ReconcileConfig, StoreConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
pub(crate) use validator::{is_dns_label, is_dns_subdomain};
