//! Cryptographic envelope for password-protected records
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 key derivation from passwords
//! - The versioned AES-GCM envelope (`v2:` wire format)
//! - A narrow capability trait over secure randomness and AES-GCM
//! - Secure memory handling with zeroize

mod envelope;
mod kdf;
mod primitives;
mod secure_memory;

pub use envelope::{
    decrypt, encrypt, open, seal, Envelope, HEADER_LEN, IV_LEN, SALT_LEN, VERSION_TAG,
};
pub use kdf::{derive_key, KEY_LEN, PBKDF2_ITERATIONS};
pub use primitives::{CryptoPrimitives, SystemPrimitives};
pub use secure_memory::{DerivedKey, SecretString};
