//! Workload API trait definition.
//!
//! This module defines the interface the reconciler uses to read and write
//! `StatefulSet` objects, together with the write admission rules shared by
//! every backend.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use serde::{Deserialize, Serialize};

use crate::config::{is_dns_label, is_dns_subdomain};
use crate::error::{ApiError, ReconcileError, Result};

/// Identity of a workload set; passes are serialized per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkloadKey {
    /// Namespace of the workload.
    pub namespace: String,
    /// Name of the workload.
    pub name: String,
}

impl WorkloadKey {
    /// Creates a new workload key.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Derives the key of an object, falling back to `default_namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the object has no name, or if the name or
    /// namespace is not a valid object name.
    pub fn for_object(object: &StatefulSet, default_namespace: &str) -> Result<Self> {
        let name = object
            .metadata
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ReconcileError::InvalidWorkload {
                resource: String::from("<unnamed>"),
                reason: String::from("metadata.name is required"),
            })?;
        let namespace = object
            .metadata
            .namespace
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(default_namespace);

        let key = Self::new(namespace, name);
        key.validate()?;
        Ok(key)
    }

    /// Checks that the name is a DNS-1123 subdomain and the namespace a
    /// DNS-1123 label.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWorkload` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let reason = if !is_dns_subdomain(&self.name) {
            "metadata.name must be a lowercase RFC 1123 subdomain"
        } else if !is_dns_label(&self.namespace) {
            "metadata.namespace must be a lowercase RFC 1123 label"
        } else {
            return Ok(());
        };

        Err(ReconcileError::InvalidWorkload {
            resource: self.to_string(),
            reason: String::from(reason),
        }
        .into())
    }
}

impl std::fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Trait for workload API backends.
///
/// Writes are atomic: a `create` or `replace` either stores the whole object
/// or nothing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkloadApi: Send + Sync {
    /// Fetches a workload.
    ///
    /// Returns `None` if it does not exist.
    async fn get(&self, key: &WorkloadKey) -> Result<Option<StatefulSet>>;

    /// Creates a workload that must not exist yet.
    async fn create(&self, key: &WorkloadKey, object: StatefulSet) -> Result<StatefulSet>;

    /// Replaces a workload.
    ///
    /// If the object carries a resource version, it must match the stored one.
    async fn replace(&self, key: &WorkloadKey, object: StatefulSet) -> Result<StatefulSet>;

    /// Deletes a workload if it exists.
    async fn delete(&self, key: &WorkloadKey) -> Result<()>;

    /// Lists all stored workloads.
    async fn list(&self) -> Result<Vec<StatefulSet>>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

/// Prepares a new object for storage.
pub(crate) fn admit_create(key: &WorkloadKey, mut object: StatefulSet) -> StatefulSet {
    object.metadata.name = Some(key.name.clone());
    object.metadata.namespace = Some(key.namespace.clone());
    object.metadata.resource_version = Some(String::from("1"));
    object.metadata.generation = Some(1);
    object
}

/// Checks a replacement against the stored object and prepares it for storage.
///
/// `metadata.generation` only moves when the spec changes, like the real
/// API server; status is owned by the stored object.
pub(crate) fn admit_replace(
    key: &WorkloadKey,
    stored: &StatefulSet,
    mut object: StatefulSet,
) -> Result<StatefulSet> {
    let found = stored.metadata.resource_version.clone().unwrap_or_default();
    if let Some(expected) = object.metadata.resource_version.as_deref()
        && expected != found
    {
        return Err(ApiError::Conflict {
            key: key.to_string(),
            expected: expected.to_string(),
            found,
        }
        .into());
    }

    let next_version = found.parse::<u64>().unwrap_or(0).saturating_add(1);
    let stored_generation = stored.metadata.generation.unwrap_or(1);

    object.metadata.generation = Some(if object.spec == stored.spec {
        stored_generation
    } else {
        stored_generation.saturating_add(1)
    });
    object.metadata.name = Some(key.name.clone());
    object.metadata.namespace = Some(key.namespace.clone());
    object.metadata.resource_version = Some(next_version.to_string());
    object.status.clone_from(&stored.status);

    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperatorError;
    use k8s_openapi::api::apps::v1::StatefulSetSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn named(name: Option<&str>, namespace: Option<&str>) -> StatefulSet {
        StatefulSet {
            metadata: ObjectMeta {
                name: name.map(String::from),
                namespace: namespace.map(String::from),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_key_uses_object_namespace() {
        let key = WorkloadKey::for_object(&named(Some("zk"), Some("kafka")), "default").expect("key");
        assert_eq!(key, WorkloadKey::new("kafka", "zk"));
        assert_eq!(key.to_string(), "kafka/zk");
    }

    #[test]
    fn test_key_falls_back_to_default_namespace() {
        let key = WorkloadKey::for_object(&named(Some("zk"), None), "default").expect("key");
        assert_eq!(key.namespace, "default");
    }

    #[test]
    fn test_key_requires_name() {
        assert!(WorkloadKey::for_object(&named(None, Some("kafka")), "default").is_err());
    }

    #[test]
    fn test_key_rejects_path_segments() {
        for (name, namespace) in [
            ("../../escaped", Some("kafka")),
            ("zk/data", Some("kafka")),
            ("Zk", Some("kafka")),
            ("zk", Some("..")),
            ("zk", Some("kafka.prod")),
        ] {
            let err = WorkloadKey::for_object(&named(Some(name), namespace), "default")
                .expect_err("invalid key");
            assert!(
                matches!(err, OperatorError::Reconcile(ReconcileError::InvalidWorkload { .. })),
                "{namespace:?}/{name}"
            );
        }
    }

    #[test]
    fn test_key_accepts_dotted_name() {
        let key = WorkloadKey::for_object(&named(Some("zk.ensemble"), None), "kafka").expect("key");
        assert_eq!(key.to_string(), "kafka/zk.ensemble");
    }

    #[test]
    fn test_replace_rejects_stale_version() {
        let key = WorkloadKey::new("kafka", "zk");
        let stored = admit_create(&key, named(Some("zk"), None));
        let mut update = stored.clone();
        update.metadata.resource_version = Some(String::from("0"));

        assert!(admit_replace(&key, &stored, update).is_err());
    }

    #[test]
    fn test_replace_bumps_versions() {
        let key = WorkloadKey::new("kafka", "zk");
        let stored = admit_create(&key, named(Some("zk"), None));

        let unchanged = admit_replace(&key, &stored, stored.clone()).expect("admitted");
        assert_eq!(unchanged.metadata.resource_version.as_deref(), Some("2"));
        assert_eq!(unchanged.metadata.generation, Some(1));

        let mut scaled = unchanged.clone();
        scaled.spec = Some(StatefulSetSpec {
            replicas: Some(5),
            ..Default::default()
        });
        let scaled = admit_replace(&key, &unchanged, scaled).expect("admitted");
        assert_eq!(scaled.metadata.resource_version.as_deref(), Some("3"));
        assert_eq!(scaled.metadata.generation, Some(2));
    }
}
