//! In-memory storage backend, for tests and embedded use.

use crate::traits::{Locator, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

const MEMORY_URL_PREFIX: &str = "memory://";

/// Storage backend keeping all objects in a process-local map. Same contract
/// as the filesystem backend; locators use a `memory://` scheme.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn get(&self, locator: &Locator) -> Option<Vec<u8>> {
        let key = locator.as_str().strip_prefix(MEMORY_URL_PREFIX)?;
        self.objects.read().ok()?.get(key).cloned()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store(
        &self,
        data: Vec<u8>,
        extension: &str,
        _content_type: &str,
    ) -> StorageResult<Locator> {
        let key = format!("{}.{}", Uuid::new_v4(), extension);
        let size = data.len();

        self.objects
            .write()
            .map_err(|_| StorageError::WriteFailed("storage lock poisoned".to_string()))?
            .insert(key.clone(), data);

        tracing::debug!(key = %key, size_bytes = size, "Memory storage write");

        Ok(Locator::new(format!("{}{}", MEMORY_URL_PREFIX, key)))
    }

    async fn delete(&self, locator: &Locator) -> StorageResult<()> {
        let key = locator
            .as_str()
            .strip_prefix(MEMORY_URL_PREFIX)
            .ok_or_else(|| StorageError::InvalidLocator(locator.to_string()))?;

        self.objects
            .write()
            .map_err(|_| StorageError::DeleteFailed("storage lock poisoned".to_string()))?
            .remove(key);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_and_get_roundtrip() {
        let storage = MemoryStorage::new();
        let locator = storage
            .store(b"payload".to_vec(), "webp", "image/webp")
            .await
            .unwrap();

        assert!(locator.as_str().starts_with("memory://"));
        assert_eq!(storage.get(&locator).unwrap(), b"payload");
        assert_eq!(storage.object_count(), 1);
    }

    #[tokio::test]
    async fn delete_removes_object() {
        let storage = MemoryStorage::new();
        let locator = storage
            .store(b"payload".to_vec(), "webp", "image/webp")
            .await
            .unwrap();

        storage.delete(&locator).await.unwrap();
        assert!(storage.get(&locator).is_none());
        assert_eq!(storage.object_count(), 0);
    }

    #[tokio::test]
    async fn delete_unknown_is_ok() {
        let storage = MemoryStorage::new();
        let locator = Locator::new("memory://missing.webp");
        assert!(storage.delete(&locator).await.is_ok());
    }

    #[tokio::test]
    async fn foreign_scheme_rejected() {
        let storage = MemoryStorage::new();
        let locator = Locator::new("http://example.com/x.webp");
        assert!(matches!(
            storage.delete(&locator).await,
            Err(StorageError::InvalidLocator(_))
        ));
    }
}
