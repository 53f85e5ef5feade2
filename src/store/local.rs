//! Local file-based workload API backend.
//!
//! Each workload is stored as `<base>/<namespace>/<name>.json`. Writes go to
//! a temporary file that is renamed over the target, so an interrupted write
//! never leaves a partially updated object behind.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ApiError, Result};

use super::api::{admit_create, admit_replace, WorkloadApi, WorkloadKey};

/// Default store directory, relative to the configuration file.
pub const DEFAULT_STORE_DIR: &str = ".ensemble/workloads";

/// Local file-based workload store.
#[derive(Debug)]
pub struct LocalWorkloadStore {
    /// Base directory for workload files.
    base_dir: PathBuf,
    /// Serializes read-check-write sequences within this process.
    write_lock: Mutex<()>,
}

impl LocalWorkloadStore {
    /// Creates a store rooted at `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Base directory of the store.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the object file; keys that are not valid object names are
    /// rejected so every path stays under the base directory.
    fn object_path(&self, key: &WorkloadKey) -> Result<PathBuf> {
        key.validate()?;
        Ok(self
            .base_dir
            .join(&key.namespace)
            .join(format!("{}.json", key.name)))
    }

    async fn read_object(path: &Path) -> Result<Option<StatefulSet>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            ApiError::unavailable(format!("Failed to read {}: {e}", path.display()))
        })?;

        let object: StatefulSet = serde_json::from_str(&content).map_err(|e| {
            ApiError::corrupted(format!("Failed to parse {}: {e}", path.display()))
        })?;

        Ok(Some(object))
    }

    async fn write_object(&self, key: &WorkloadKey, object: &StatefulSet) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ApiError::unavailable(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let content = serde_json::to_string_pretty(object)
            .map_err(|e| ApiError::serialization(format!("Failed to serialize {key}: {e}")))?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            ApiError::unavailable(format!("Failed to create {}: {e}", temp_path.display()))
        })?;

        file.write_all(content.as_bytes()).await.map_err(|e| {
            ApiError::unavailable(format!("Failed to write {}: {e}", temp_path.display()))
        })?;

        file.sync_all().await.map_err(|e| {
            ApiError::unavailable(format!("Failed to sync {}: {e}", temp_path.display()))
        })?;

        fs::rename(&temp_path, &path).await.map_err(|e| {
            ApiError::unavailable(format!("Failed to rename into {}: {e}", path.display()))
        })?;

        debug!("Wrote workload {key} to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl WorkloadApi for LocalWorkloadStore {
    async fn get(&self, key: &WorkloadKey) -> Result<Option<StatefulSet>> {
        Self::read_object(&self.object_path(key)?).await
    }

    async fn create(&self, key: &WorkloadKey, object: StatefulSet) -> Result<StatefulSet> {
        let _guard = self.write_lock.lock().await;

        if self.object_path(key)?.exists() {
            return Err(ApiError::AlreadyExists {
                key: key.to_string(),
            }
            .into());
        }

        let admitted = admit_create(key, object);
        self.write_object(key, &admitted).await?;
        info!("Created workload {key}");
        Ok(admitted)
    }

    async fn replace(&self, key: &WorkloadKey, object: StatefulSet) -> Result<StatefulSet> {
        let _guard = self.write_lock.lock().await;

        let stored = Self::read_object(&self.object_path(key)?)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                key: key.to_string(),
            })?;

        let admitted = admit_replace(key, &stored, object)?;
        self.write_object(key, &admitted).await?;
        info!(
            "Replaced workload {key} at resource version {}",
            admitted.metadata.resource_version.as_deref().unwrap_or("?")
        );
        Ok(admitted)
    }

    async fn delete(&self, key: &WorkloadKey) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let path = self.object_path(key)?;
        if path.exists() {
            fs::remove_file(&path).await.map_err(|e| {
                ApiError::unavailable(format!("Failed to delete {}: {e}", path.display()))
            })?;
            info!("Deleted workload {key}");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StatefulSet>> {
        let mut objects = Vec::new();
        if !self.base_dir.exists() {
            return Ok(objects);
        }

        let mut namespaces = fs::read_dir(&self.base_dir).await?;
        while let Some(namespace) = namespaces.next_entry().await? {
            if !namespace.file_type().await?.is_dir() {
                continue;
            }

            let mut entries = fs::read_dir(namespace.path()).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json")
                    && let Some(object) = Self::read_object(&path).await?
                {
                    objects.push(object);
                }
            }
        }

        objects.sort_by(|a, b| {
            (&a.metadata.namespace, &a.metadata.name).cmp(&(&b.metadata.namespace, &b.metadata.name))
        });
        Ok(objects)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
