//! In-process preferences backend

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::Preferences;
use crate::error::Result;

/// Volatile map-backed preferences, mostly useful for tests and previews
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    entries: RwLock<HashMap<String, String>>,
    flushes: AtomicUsize,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `flush` calls observed so far
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Preferences for MemoryPreferences {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn get_all(&self) -> Result<HashMap<String, String>> {
        Ok(self.entries.read().await.clone())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "In-Memory Preferences"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let prefs = MemoryPreferences::new();

        prefs.put("a", "1").await.unwrap();
        assert_eq!(prefs.get("a").await.unwrap(), Some("1".to_string()));
        assert!(prefs.contains("a").await.unwrap());

        prefs.delete("a").await.unwrap();
        assert_eq!(prefs.get("a").await.unwrap(), None);
        assert!(prefs.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let prefs = MemoryPreferences::new();

        prefs.put("a", "1").await.unwrap();
        prefs.put("a", "2").await.unwrap();

        assert_eq!(prefs.len().await, 1);
        assert_eq!(prefs.get("a").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_flush_is_counted() {
        let prefs = MemoryPreferences::new();
        assert_eq!(prefs.flush_count(), 0);

        prefs.flush().await.unwrap();
        prefs.flush().await.unwrap();
        assert_eq!(prefs.flush_count(), 2);
    }
}
