//! Snapflow Storage Library
//!
//! Storage abstraction for encoded artifacts. The orchestrator only ever sees
//! the narrow [`Storage`] trait and opaque [`Locator`]s; backends generate
//! collision-resistant object names themselves so original filenames never
//! leak into storage.

pub mod local;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use traits::{Locator, Storage, StorageError, StorageResult};
