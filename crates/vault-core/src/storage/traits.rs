//! Storage trait definitions

use std::collections::HashMap;

use crate::error::Result;
use async_trait::async_trait;

/// Key-value persistence used by the credential store
///
/// Writes are not durable until `flush` returns. Implementations must make
/// each key's value visible atomically: readers see the old value or the
/// new one, never a partial write.
#[async_trait]
pub trait Preferences: Send + Sync {
    /// Store a value with the given key, replacing any previous value
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a value by key
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Snapshot of every stored entry
    async fn get_all(&self) -> Result<HashMap<String, String>>;

    /// Delete a value by key (no-op when absent)
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Durability barrier for preceding `put`/`delete` calls
    async fn flush(&self) -> Result<()>;

    /// Get a human-readable name for this storage backend
    fn backend_name(&self) -> &'static str;
}
