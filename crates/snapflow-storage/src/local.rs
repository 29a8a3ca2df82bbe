//! Local filesystem storage backend.

use crate::traits::{Locator, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Local filesystem storage implementation
///
/// Objects are written under `base_path/media/` with uuid-derived names and
/// served as `{base_url}/media/{name}`.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for artifact storage
    /// * `base_url` - Base URL for serving artifacts (e.g. "http://localhost:3000")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(base_path.join("media"))
            .await
            .map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    base_path.display(),
                    e
                ))
            })?;

        Ok(LocalStorage {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Collision-resistant object key, independent of any original filename.
    fn generate_key(extension: &str) -> String {
        format!("media/{}.{}", Uuid::new_v4(), extension)
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Map one of our own locators back to a storage key, rejecting anything
    /// this backend did not produce or that escapes the base directory.
    fn locator_to_key(&self, locator: &Locator) -> StorageResult<String> {
        let key = locator
            .as_str()
            .strip_prefix(&format!("{}/", self.base_url))
            .ok_or_else(|| StorageError::InvalidLocator(locator.to_string()))?;

        if key.contains("..") || key.starts_with('/') || !key.starts_with("media/") {
            return Err(StorageError::InvalidLocator(locator.to_string()));
        }

        Ok(key.to_string())
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn store(
        &self,
        data: Vec<u8>,
        extension: &str,
        _content_type: &str,
    ) -> StorageResult<Locator> {
        let key = Self::generate_key(extension);
        let path = self.key_to_path(&key);
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        let url = self.generate_url(&key);

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(Locator::new(url))
    }

    async fn delete(&self, locator: &Locator) -> StorageResult<()> {
        let key = self.locator_to_key(locator)?;
        let path = self.key_to_path(&key);
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }
}
