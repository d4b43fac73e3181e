//! Vault settings management
//!
//! Stores non-sensitive configuration in a plain JSON file next to the
//! preferences data. KDF parameters are not configurable: they are fixed by
//! the envelope version tag.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, VaultError};

/// Settings file version
const SETTINGS_VERSION: u32 = 1;

/// Default preferences set holding sealed records
pub const DEFAULT_STORE_NAME: &str = "vault-passwords";

/// Default namespace prefix for record keys
pub const DEFAULT_KEY_PREFIX: &str = "password_";

/// File stem of the settings file, reserved in the storage directory
pub const SETTINGS_FILE_STEM: &str = "settings";

/// Vault settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultSettings {
    /// Settings file version
    pub version: u32,
    /// Name of the preferences set that holds sealed records
    pub store_name: String,
    /// Namespace prefix for record keys
    pub key_prefix: String,
}

impl VaultSettings {
    /// Create default settings
    pub fn new() -> Self {
        Self {
            version: SETTINGS_VERSION,
            store_name: DEFAULT_STORE_NAME.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Check that the settings describe a usable vault
    ///
    /// The store name must not be empty, must not contain path separators
    /// and must not collide with the settings file. The key prefix must not
    /// be empty.
    pub fn validate(&self) -> Result<()> {
        if self.key_prefix.is_empty() {
            return Err(VaultError::ConfigError(
                "Record key prefix must not be empty".to_string(),
            ));
        }
        if self.store_name.is_empty() || self.store_name.contains(['/', '\\']) {
            return Err(VaultError::ConfigError(format!(
                "Invalid store name: {:?}",
                self.store_name
            )));
        }
        if self.store_name.eq_ignore_ascii_case(SETTINGS_FILE_STEM) {
            return Err(VaultError::ConfigError(format!(
                "Store name {:?} is reserved for the settings file",
                self.store_name
            )));
        }
        Ok(())
    }
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: VaultSettings,
}

impl SettingsManager {
    /// Create a new settings manager, falling back to defaults when the file
    /// is missing or unreadable
    pub fn new(storage_dir: &Path) -> Self {
        let settings_file = storage_dir.join(format!("{}.json", SETTINGS_FILE_STEM));
        let settings = Self::load_from_file(&settings_file).unwrap_or_else(|e| {
            debug!("Ignoring unreadable settings file: {}", e);
            VaultSettings::new()
        });

        Self {
            settings_file,
            settings,
        }
    }

    /// Load settings from file
    fn load_from_file(path: &Path) -> Result<VaultSettings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(VaultSettings::new());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: VaultSettings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    ///
    /// Invalid settings are rejected with `ConfigError` and nothing is written.
    pub async fn save(&self) -> Result<()> {
        self.settings.validate()?;
        let contents = serde_json::to_string_pretty(&self.settings)?;

        // Write atomically using temp file
        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.settings_file).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &VaultSettings {
        &self.settings
    }

    /// Get mutable settings
    pub fn get_mut(&mut self) -> &mut VaultSettings {
        &mut self.settings
    }

    /// Update settings and save
    pub async fn update(&mut self, settings: VaultSettings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        self.save().await
    }

    /// Reset settings to defaults and delete settings file
    pub async fn reset(&mut self) -> Result<()> {
        self.settings = VaultSettings::new();

        if tokio::fs::try_exists(&self.settings_file).await? {
            tokio::fs::remove_file(&self.settings_file).await?;
        }

        Ok(())
    }
}
