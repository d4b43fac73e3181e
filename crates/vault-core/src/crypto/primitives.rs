//! Platform cryptographic capabilities used by the envelope codec
//!
//! The envelope only needs a secure random source and an AEAD. Keeping them
//! behind a trait lets tests pin the random source and check the exact wire
//! layout.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use super::envelope::IV_LEN;
use crate::error::{Result, VaultError};

/// Capability interface over secure randomness and AES-GCM
pub trait CryptoPrimitives: Send + Sync {
    /// Fill `buf` from a cryptographically secure random source
    fn fill_random(&self, buf: &mut [u8]) -> Result<()>;

    /// AES-GCM encrypt with no associated data; the tag is appended
    fn aead_encrypt(&self, key: &[u8], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>>;

    /// AES-GCM decrypt with no associated data; fails unless the tag verifies
    fn aead_decrypt(&self, key: &[u8], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// OS RNG plus the RustCrypto AES-GCM implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPrimitives;

impl CryptoPrimitives for SystemPrimitives {
    fn fill_random(&self, buf: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| VaultError::CryptoError(format!("Secure random source failed: {}", e)))
    }

    fn aead_encrypt(&self, key: &[u8], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from_slice(iv);

        let sealed = match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map_err(|e| VaultError::CryptoError(e.to_string()))?
                .encrypt(nonce, plaintext),
            32 => Aes256Gcm::new_from_slice(key)
                .map_err(|e| VaultError::CryptoError(e.to_string()))?
                .encrypt(nonce, plaintext),
            other => return Err(unsupported_key_length(other)),
        };

        sealed.map_err(|_| VaultError::CryptoError("AES-GCM encryption failed".to_string()))
    }

    fn aead_decrypt(&self, key: &[u8], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from_slice(iv);

        let opened = match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map_err(|e| VaultError::CryptoError(e.to_string()))?
                .decrypt(nonce, ciphertext),
            32 => Aes256Gcm::new_from_slice(key)
                .map_err(|e| VaultError::CryptoError(e.to_string()))?
                .decrypt(nonce, ciphertext),
            other => return Err(unsupported_key_length(other)),
        };

        opened.map_err(|_| VaultError::AuthenticationFailed)
    }
}

fn unsupported_key_length(len: usize) -> VaultError {
    VaultError::CryptoError(format!(
        "Unsupported AES key length: expected 16 or 32 bytes, got {}",
        len
    ))
}
