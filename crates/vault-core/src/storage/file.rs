//! JSON file preferences backend
//!
//! Stores all entries of one named preferences set in a single JSON file in
//! the user's data directory. Values are written as given; the credential
//! store only ever hands this backend sealed envelopes.

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::Preferences;
use crate::error::{Result, VaultError};
use crate::settings::SETTINGS_FILE_STEM;

/// Current on-disk file version
const FILE_VERSION: u32 = 1;

/// File-backed preferences with an explicit flush
pub struct FilePreferences {
    /// Directory for storage files
    storage_dir: PathBuf,
    /// Name of this preferences set (file stem)
    name: String,
    /// In-memory view of the storage
    cache: Arc<RwLock<PreferencesCache>>,
}

/// In-memory representation of stored data
#[derive(Debug, Default)]
struct PreferencesCache {
    /// Map of key -> value
    entries: HashMap<String, String>,
    /// Whether the cache has been modified since last flush
    dirty: bool,
}

/// File format for persistent storage
#[derive(Debug, Serialize, Deserialize)]
struct PreferencesFile {
    version: u32,
    entries: HashMap<String, String>,
}

impl FilePreferences {
    /// Open the named preferences set in the default data directory
    pub async fn new(name: &str) -> Result<Self> {
        Self::with_dir(Self::default_storage_dir()?, name).await
    }

    /// Open the named preferences set in a custom directory
    ///
    /// Existing data is loaded immediately. The settings file's name is
    /// reserved and cannot be opened as a preferences set.
    pub async fn with_dir(storage_dir: PathBuf, name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(VaultError::StorageError(format!(
                "Invalid preferences name: {:?}",
                name
            )));
        }
        if name.eq_ignore_ascii_case(SETTINGS_FILE_STEM) {
            return Err(VaultError::StorageError(format!(
                "Preferences name {:?} is reserved",
                name
            )));
        }

        tokio::fs::create_dir_all(&storage_dir).await?;

        let prefs = Self {
            storage_dir,
            name: name.to_string(),
            cache: Arc::new(RwLock::new(PreferencesCache::default())),
        };
        prefs.load().await?;

        debug!("File preferences '{}' opened at: {:?}", prefs.name, prefs.storage_dir);
        Ok(prefs)
    }

    /// Get the default storage directory
    pub fn default_storage_dir() -> Result<PathBuf> {
        ProjectDirs::from("com", "vaultai", "password-vault")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                VaultError::StorageError("Could not determine data directory".to_string())
            })
    }

    /// Get the path to the storage file
    pub fn file_path(&self) -> PathBuf {
        self.storage_dir.join(format!("{}.json", self.name))
    }

    /// Reload entries from disk, discarding unflushed changes
    pub async fn load(&self) -> Result<()> {
        let path = self.file_path();

        if !tokio::fs::try_exists(&path).await? {
            debug!("No existing preferences file found");
            return Ok(());
        }

        let contents = tokio::fs::read_to_string(&path).await?;
        let file: PreferencesFile = serde_json::from_str(&contents)?;

        if file.version != FILE_VERSION {
            return Err(VaultError::StorageError(format!(
                "Unsupported preferences file version: {}",
                file.version
            )));
        }

        let mut cache = self.cache.write().await;
        cache.entries = file.entries;
        cache.dirty = false;

        debug!("Loaded {} entries from preferences", cache.entries.len());
        Ok(())
    }

    /// Get the storage directory path
    pub fn storage_dir(&self) -> &PathBuf {
        &self.storage_dir
    }
}

#[async_trait]
impl Preferences for FilePreferences {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut cache = self.cache.write().await;
        cache.entries.insert(key.to_string(), value.to_string());
        cache.dirty = true;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cache.read().await.entries.get(key).cloned())
    }

    async fn get_all(&self) -> Result<HashMap<String, String>> {
        Ok(self.cache.read().await.entries.clone())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut cache = self.cache.write().await;
        if cache.entries.remove(key).is_some() {
            cache.dirty = true;
        }
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.cache.read().await.entries.contains_key(key))
    }

    async fn flush(&self) -> Result<()> {
        // Hold the write lock so no put lands between serialising and clearing `dirty`
        let mut cache = self.cache.write().await;

        if !cache.dirty {
            return Ok(());
        }

        let file = PreferencesFile {
            version: FILE_VERSION,
            entries: cache.entries.clone(),
        };

        let contents = serde_json::to_string_pretty(&file)?;
        let path = self.file_path();

        // Write atomically using a temp file
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        cache.dirty = false;
        debug!("Flushed {} entries to preferences", cache.entries.len());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "JSON File Preferences"
    }
}
