//! Error types for vault-core

use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    /// The stored value does not carry a recognised envelope version tag
    #[error("Unsupported envelope format")]
    UnsupportedFormat,

    /// The envelope body could not be decoded
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    /// AES-GCM tag verification failed (wrong password or corrupted data)
    #[error("Authentication failed - wrong password or corrupted data")]
    AuthenticationFailed,

    /// Decrypted bytes are not valid UTF-8
    #[error("Decrypted data is not valid UTF-8")]
    EncodingError,

    #[error("Key derivation failed: {0}")]
    KeyDerivationError(String),

    /// Failure inside a cryptographic primitive (RNG, cipher setup, worker)
    #[error("Crypto error: {0}")]
    CryptoError(String),

    #[error("Invalid credential record: {0}")]
    InvalidRecord(String),

    #[error("Invalid settings: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl VaultError {
    /// Whether this error means a single stored entry cannot be recovered
    /// with the given password.
    pub fn is_unrecoverable_entry(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat
                | Self::Malformed(_)
                | Self::AuthenticationFailed
                | Self::EncodingError
        )
    }
}
