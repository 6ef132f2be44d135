//! Durable Store Module
//!
//! The byte-oriented key-value collaborator the cache persists entries into,
//! plus the in-memory and file-backed implementations.

mod file;
mod memory;

use async_trait::async_trait;

use crate::error::StoreError;

pub use file::FileStore;
pub use memory::MemoryStore;

// == Durable Store ==
/// Key-value persistence shared with the cache.
///
/// Implementations may be shared with unrelated clients, so `keys` can list
/// keys the cache never wrote.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Returns the bytes stored under `key`, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stores `value` under `key`, replacing any previous bytes.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Removes `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Lists every key currently stored.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Longest key in bytes this store can hold, `None` when unbounded.
    fn max_key_length(&self) -> Option<usize> {
        None
    }
}
