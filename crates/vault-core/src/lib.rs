//! # vault-core
//!
//! Core password vault functionality including:
//! - PBKDF2-HMAC-SHA256 key derivation from a master password
//! - A versioned AES-GCM envelope (`v2:` wire format)
//! - A credential store that seals records under site/username lookup keys
//! - Pluggable key-value persistence with an explicit flush
//! - Zeroize-on-drop handling for keys and decrypted records

pub mod credential;
pub mod crypto;
pub mod error;
pub mod settings;
pub mod storage;

pub use credential::{CredentialRecord, CredentialStore, LookupKey, ReEncryptReport};
pub use crypto::{decrypt, derive_key, encrypt, Envelope, SecretString};
pub use error::{Result, VaultError};
pub use settings::{SettingsManager, VaultSettings};
pub use storage::{FilePreferences, MemoryPreferences, Preferences};
