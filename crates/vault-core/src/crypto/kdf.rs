//! Password-based key derivation using PBKDF2-HMAC-SHA256 (RFC 8018 §5.2)

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use super::DerivedKey;
use crate::error::{Result, VaultError};

type HmacSha256 = Hmac<Sha256>;

/// Iteration count used by the `v2` envelope format
pub const PBKDF2_ITERATIONS: u32 = 120_000;

/// Derived key length used by the `v2` envelope format (AES-128)
pub const KEY_LEN: usize = 16;

/// HMAC-SHA256 output size
const BLOCK_LEN: usize = 32;

/// Derive `key_len` bytes from a password with PBKDF2-HMAC-SHA256
///
/// # Arguments
/// * `password` - Raw password bytes (UTF-8 for user passphrases)
/// * `salt` - Per-envelope random salt
/// * `iterations` - Number of chained HMAC evaluations per output block
/// * `key_len` - Requested output length in bytes
///
/// # Returns
/// The derived key. Identical inputs always produce identical output.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    key_len: usize,
) -> Result<DerivedKey> {
    if iterations == 0 {
        return Err(VaultError::KeyDerivationError(
            "Iteration count must be at least 1".to_string(),
        ));
    }
    if key_len == 0 {
        return Err(VaultError::KeyDerivationError(
            "Requested key length must be at least 1".to_string(),
        ));
    }

    let block_count = key_len.div_ceil(BLOCK_LEN);
    let block_count = u32::try_from(block_count)
        .map_err(|_| VaultError::KeyDerivationError("Derived key too long".to_string()))?;

    // Keyed once; each HMAC below starts from a clone of this state
    let prf = <HmacSha256 as Mac>::new_from_slice(password)
        .map_err(|e| VaultError::KeyDerivationError(e.to_string()))?;

    let mut derived = Vec::with_capacity(block_count as usize * BLOCK_LEN);
    for index in 1..=block_count {
        let mut mac = prf.clone();
        mac.update(salt);
        mac.update(&index.to_be_bytes());

        let mut u = [0u8; BLOCK_LEN];
        u.copy_from_slice(&mac.finalize().into_bytes());
        let mut t = u;

        for _ in 1..iterations {
            let mut mac = prf.clone();
            mac.update(&u);
            u.copy_from_slice(&mac.finalize().into_bytes());
            t.iter_mut().zip(u.iter()).for_each(|(t, u)| *t ^= u);
        }

        derived.extend_from_slice(&t);
        u.zeroize();
        t.zeroize();
    }

    derived.truncate(key_len);
    Ok(DerivedKey::new(derived))
}
