//! In-memory workload API backend.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ApiError, Result};

use super::api::{admit_create, admit_replace, WorkloadApi, WorkloadKey};

/// Workload API backed by a map, for embedding and tests.
#[derive(Debug, Default)]
pub struct InMemoryWorkloadApi {
    objects: RwLock<BTreeMap<WorkloadKey, StatefulSet>>,
}

impl InMemoryWorkloadApi {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkloadApi for InMemoryWorkloadApi {
    async fn get(&self, key: &WorkloadKey) -> Result<Option<StatefulSet>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn create(&self, key: &WorkloadKey, object: StatefulSet) -> Result<StatefulSet> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Err(ApiError::AlreadyExists {
                key: key.to_string(),
            }
            .into());
        }

        let admitted = admit_create(key, object);
        objects.insert(key.clone(), admitted.clone());
        debug!("Created workload {key}");
        Ok(admitted)
    }

    async fn replace(&self, key: &WorkloadKey, object: StatefulSet) -> Result<StatefulSet> {
        let mut objects = self.objects.write().await;
        let stored = objects.get(key).ok_or_else(|| ApiError::NotFound {
            key: key.to_string(),
        })?;

        let admitted = admit_replace(key, stored, object)?;
        objects.insert(key.clone(), admitted.clone());
        debug!(
            "Replaced workload {key} at resource version {}",
            admitted.metadata.resource_version.as_deref().unwrap_or("?")
        );
        Ok(admitted)
    }

    async fn delete(&self, key: &WorkloadKey) -> Result<()> {
        if self.objects.write().await.remove(key).is_some() {
            debug!("Deleted workload {key}");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StatefulSet>> {
        Ok(self.objects.read().await.values().cloned().collect())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_delete() {
        let api = InMemoryWorkloadApi::new();
        let key = WorkloadKey::new("kafka", "zk");

        assert!(api.get(&key).await.expect("get").is_none());

        let created = api.create(&key, StatefulSet::default()).await.expect("create");
        assert_eq!(created.metadata.name.as_deref(), Some("zk"));
        assert!(api.create(&key, StatefulSet::default()).await.is_err());

        api.delete(&key).await.expect("delete");
        assert!(api.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_replace_missing_is_not_found() {
        let api = InMemoryWorkloadApi::new();
        let key = WorkloadKey::new("kafka", "zk");

        let err = api
            .replace(&key, StatefulSet::default())
            .await
            .expect_err("missing object");
        assert!(!err.is_retryable());
    }
}
