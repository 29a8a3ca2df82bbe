//! Storage abstraction trait
//!
//! All storage backends (local filesystem, in-memory) implement [`Storage`].
//! Callers treat the returned [`Locator`] as an opaque, durable, publicly
//! resolvable string and never interpret its structure.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Storage operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Invalid storage locator: {0}")]
    InvalidLocator(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Opaque reference to a stored artifact, resolvable by external consumers
/// (a URL or path). Only the backend that produced it may interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage abstraction trait
///
/// `store` must generate a collision-resistant object name independent of the
/// original filename. `delete` is best-effort from the caller's perspective:
/// the caller logs failures and moves on, accepting orphaned remote objects
/// as a separately reconciled failure mode.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist an encoded buffer and return its public locator.
    async fn store(
        &self,
        data: Vec<u8>,
        extension: &str,
        content_type: &str,
    ) -> StorageResult<Locator>;

    /// Delete a previously stored artifact by its locator.
    async fn delete(&self, locator: &Locator) -> StorageResult<()>;
}
