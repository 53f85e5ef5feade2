//! Configuration parser for loading configuration files and manifests.
//!
//! This module handles loading the operator configuration from YAML files and
//! environment variables, and reading `StatefulSet` manifests from disk.

use crate::error::{ConfigError, OperatorError, Result};
use k8s_openapi::api::apps::v1::StatefulSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use super::spec::OperatorConfig;

/// Overrides `operator.namespace`.
pub const ENV_NAMESPACE: &str = "ENSEMBLE_OPERATOR_NAMESPACE";
/// Overrides `store.path`.
pub const ENV_STORE_PATH: &str = "ENSEMBLE_OPERATOR_STORE_PATH";
/// Overrides `logging.level`.
pub const ENV_LOG_LEVEL: &str = "ENSEMBLE_OPERATOR_LOG_LEVEL";
/// Overrides `operator.operation_timeout_ms`.
pub const ENV_OPERATION_TIMEOUT_MS: &str = "ENSEMBLE_OPERATOR_OPERATION_TIMEOUT_MS";

/// Configuration parser for loading operator configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<OperatorConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = read_file(path)?;
        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<OperatorConfig> {
        debug!("Parsing YAML configuration");

        let config: OperatorConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ConfigError::parse(format!("YAML parse error: {e}"), location)
        })?;

        debug!(
            "Parsed configuration with {} workload kind(s)",
            config.workloads.len()
        );
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Environment variables are named `ENSEMBLE_OPERATOR_<KEY>`
    /// (e.g., `ENSEMBLE_OPERATOR_NAMESPACE`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if an
    /// override holds an invalid value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<OperatorConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override cannot be parsed.
    pub fn apply_env_overrides(
        config: &mut OperatorConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            debug!("Overriding operator.namespace from environment");
            config.operator.namespace = namespace;
        }

        if let Some(path) = lookup(ENV_STORE_PATH) {
            debug!("Overriding store.path from environment");
            config.store.path = Some(path);
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            debug!("Overriding logging.level from environment");
            config.logging.level = level;
        }

        if let Some(timeout) = lookup(ENV_OPERATION_TIMEOUT_MS) {
            debug!("Overriding operator.operation_timeout_ms from environment");
            config.operator.operation_timeout_ms = parse_env(ENV_OPERATION_TIMEOUT_MS, &timeout)?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ConfigError::parse(
                    format!("Failed to load .env file: {e}"),
                    Some(env_path.display().to_string()),
                )
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Resolves the store directory: `store.path` relative to the base path,
    /// or the default store directory beside the configuration file.
    #[must_use]
    pub fn store_dir(&self, config: &OperatorConfig) -> PathBuf {
        let base = self.base_path.clone().unwrap_or_default();
        config
            .store
            .path
            .as_ref()
            .map_or_else(|| base.join(crate::store::DEFAULT_STORE_DIR), |p| base.join(p))
    }
}

/// Loads a `StatefulSet` manifest written in YAML or JSON.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a `StatefulSet`.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<StatefulSet> {
    let path = path.as_ref();
    debug!("Loading manifest from: {}", path.display());

    let content = read_file(path)?;
    let object: StatefulSet = serde_yaml::from_str(&content).map_err(|e| {
        ConfigError::parse(
            format!("Invalid StatefulSet manifest: {e}"),
            Some(path.display().to_string()),
        )
    })?;

    Ok(object)
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["ensemble-operator.yaml", "ensemble-operator.yml"];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(OperatorError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(OperatorError::Config(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        }));
    }

    std::fs::read_to_string(path).map_err(|e| {
        OperatorError::Config(ConfigError::parse(
            format!("Failed to read file: {e}"),
            Some(path.display().to_string()),
        ))
    })
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        OperatorError::Config(ConfigError::InvalidEnvVar {
            name: name.to_string(),
            value: value.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollout::RestartMode;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_parse_empty_config() {
        let parser = ConfigParser::new();
        let config = parser.parse_yaml("{}", None).expect("empty config");
        assert_eq!(config, OperatorConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
operator:
  namespace: kafka
  generation_annotation: example.com/pod-generation
  operation_timeout_ms: 60000

reconcile:
  max_attempts: 5
  retry_backoff_ms: 500

logging:
  level: debug
  json: true

store:
  path: state/workloads

workloads:
  zookeeper: {}
  etcd:
    labels: in_place
    volume_claim_templates: in_place
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).expect("full config");

        assert_eq!(config.operator.namespace, "kafka");
        assert_eq!(config.operator.generation_annotation, "example.com/pod-generation");
        assert_eq!(config.reconcile.max_attempts, 5);
        assert!(config.logging.json);
        assert_eq!(config.store.path.as_deref(), Some("state/workloads"));
        assert_eq!(config.workloads.len(), 2);
        assert_eq!(
            config.workloads["etcd"].volume_claim_templates,
            RestartMode::InPlace
        );
    }

    #[test]
    fn test_parse_error_has_location() {
        let parser = ConfigParser::new();
        let err = parser
            .parse_yaml("reconcile: [", Some(Path::new("broken.yaml")))
            .expect_err("invalid yaml");
        assert!(matches!(
            err,
            OperatorError::Config(ConfigError::ParseError { location: Some(ref l), .. }) if l == "broken.yaml"
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_NAMESPACE, "analytics"),
            (ENV_STORE_PATH, "/var/lib/ensemble"),
            (ENV_LOG_LEVEL, "trace"),
            (ENV_OPERATION_TIMEOUT_MS, " 1500 "),
        ]
        .into_iter()
        .collect();

        let mut config = OperatorConfig::default();
        ConfigParser::apply_env_overrides(&mut config, |name| {
            vars.get(name).map(ToString::to_string)
        })
        .expect("overrides");

        assert_eq!(config.operator.namespace, "analytics");
        assert_eq!(config.store.path.as_deref(), Some("/var/lib/ensemble"));
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.operator.operation_timeout_ms, 1500);
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = OperatorConfig::default();
        let err = ConfigParser::apply_env_overrides(&mut config, |name| {
            (name == ENV_OPERATION_TIMEOUT_MS).then(|| String::from("soon"))
        })
        .expect_err("non-numeric timeout");

        assert!(matches!(
            err,
            OperatorError::Config(ConfigError::InvalidEnvVar { ref value, .. }) if value == "soon"
        ));
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let temp = TempDir::new().expect("temp dir");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(temp.path().join("ensemble-operator.yaml"), "{}").expect("write");

        let found = find_config_file(&nested).expect("config found");
        assert_eq!(found, temp.path().join("ensemble-operator.yaml"));
    }

    #[test]
    fn test_load_with_env_reads_file() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("ensemble-operator.yaml");
        std::fs::write(&path, "reconcile:\n  retry_backoff_ms: 250\n").expect("write");

        let config = ConfigParser::new()
            .with_base_path(temp.path())
            .load_with_env(&path)
            .expect("config");
        assert_eq!(config.reconcile.retry_backoff_ms, 250);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigParser::new()
            .load_file("/nonexistent/ensemble-operator.yaml")
            .expect_err("missing file");
        assert!(matches!(err, OperatorError::Config(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_store_dir_resolution() {
        let parser = ConfigParser::new().with_base_path("/etc/ensemble");
        let mut config = OperatorConfig::default();
        assert_eq!(
            parser.store_dir(&config),
            PathBuf::from("/etc/ensemble/.ensemble/workloads")
        );

        config.store.path = Some(String::from("/var/lib/ensemble"));
        assert_eq!(parser.store_dir(&config), PathBuf::from("/var/lib/ensemble"));
    }

    #[test]
    fn test_load_manifest() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("zk.yaml");
        std::fs::write(
            &path,
            r"
apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: zk
  labels:
    app: zk
spec:
  replicas: 3
  selector:
    matchLabels:
      app: zk
  template:
    spec:
      containers:
        - name: zookeeper
          image: zookeeper:3.9
",
        )
        .expect("write");

        let object = load_manifest(&path).expect("manifest");
        assert_eq!(object.metadata.name.as_deref(), Some("zk"));
        assert_eq!(object.spec.and_then(|s| s.replicas), Some(3));
    }

    #[test]
    fn test_load_manifest_rejects_other_kinds() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("cm.yaml");
        std::fs::write(&path, "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\n")
            .expect("write");

        assert!(load_manifest(&path).is_err());
    }
}
