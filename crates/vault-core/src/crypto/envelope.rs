//! Versioned password envelope: PBKDF2-HMAC-SHA256 key + AES-128-GCM
//!
//! Wire format: `v2:{base64(salt || iv || ciphertext_with_tag)}`
//! - Salt: 16 bytes, fresh per envelope, used only for key derivation
//! - IV: 12 bytes, fresh per envelope, used only for the cipher
//! - Ciphertext: variable length, AES-GCM tag (16 bytes) appended
//!
//! The KDF parameters are not stored; they are implied by the version tag.
//! Changing the iteration count or key length needs a new tag and a parallel
//! decode path.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use zeroize::{Zeroize, Zeroizing};

use super::kdf::{derive_key, KEY_LEN, PBKDF2_ITERATIONS};
use super::primitives::{CryptoPrimitives, SystemPrimitives};
use super::SecretString;
use crate::error::{Result, VaultError};

/// Version tag prefixed to every envelope this crate writes
pub const VERSION_TAG: &str = "v2:";

/// Salt length (bytes)
pub const SALT_LEN: usize = 16;

/// AES-GCM nonce length (bytes)
pub const IV_LEN: usize = 12;

/// Smallest valid decoded payload: salt plus IV
pub const HEADER_LEN: usize = SALT_LEN + IV_LEN;

/// Parsed `v2` envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Key derivation salt
    pub salt: [u8; SALT_LEN],
    /// AES-GCM nonce
    pub iv: [u8; IV_LEN],
    /// Ciphertext with the authentication tag appended
    pub ciphertext: Vec<u8>,
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut combined = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        combined.extend_from_slice(&self.salt);
        combined.extend_from_slice(&self.iv);
        combined.extend_from_slice(&self.ciphertext);

        write!(f, "{}{}", VERSION_TAG, STANDARD.encode(&combined))
    }
}

impl Envelope {
    /// Parse from the format: `v2:{base64}`
    ///
    /// The version tag is checked before any decoding. Whitespace inside
    /// the base64 body is ignored, since some platform encoders wrap lines.
    pub fn parse(stored: &str) -> Result<Self> {
        let body = stored
            .strip_prefix(VERSION_TAG)
            .ok_or(VaultError::UnsupportedFormat)?;

        let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let combined = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| VaultError::Malformed(format!("Invalid base64: {}", e)))?;

        if combined.len() < HEADER_LEN {
            return Err(VaultError::Malformed(format!(
                "Payload too short: expected at least {} bytes, got {}",
                HEADER_LEN,
                combined.len()
            )));
        }

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&combined[..SALT_LEN]);

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&combined[SALT_LEN..HEADER_LEN]);

        Ok(Self {
            salt,
            iv,
            ciphertext: combined[HEADER_LEN..].to_vec(),
        })
    }
}

/// Seal plaintext into a serialized `v2` envelope
///
/// Draws a fresh salt and IV from `primitives` on every call.
pub fn seal<C>(primitives: &C, plaintext: &[u8], password: &str) -> Result<String>
where
    C: CryptoPrimitives + ?Sized,
{
    seal_with_iterations(primitives, plaintext, password, PBKDF2_ITERATIONS)
}

/// Open a serialized envelope and return the UTF-8 plaintext
pub fn open<C>(primitives: &C, stored: &str, password: &str) -> Result<SecretString>
where
    C: CryptoPrimitives + ?Sized,
{
    let envelope = Envelope::parse(stored)?;
    open_envelope(primitives, &envelope, password, PBKDF2_ITERATIONS)
}

fn seal_with_iterations<C>(
    primitives: &C,
    plaintext: &[u8],
    password: &str,
    iterations: u32,
) -> Result<String>
where
    C: CryptoPrimitives + ?Sized,
{
    let mut salt = [0u8; SALT_LEN];
    primitives.fill_random(&mut salt)?;
    let mut iv = [0u8; IV_LEN];
    primitives.fill_random(&mut iv)?;

    let key = derive_key(password.as_bytes(), &salt, iterations, KEY_LEN)?;
    let ciphertext = primitives.aead_encrypt(key.as_bytes(), &iv, plaintext)?;

    Ok(Envelope {
        salt,
        iv,
        ciphertext,
    }
    .to_string())
}

fn open_envelope<C>(
    primitives: &C,
    envelope: &Envelope,
    password: &str,
    iterations: u32,
) -> Result<SecretString>
where
    C: CryptoPrimitives + ?Sized,
{
    let key = derive_key(password.as_bytes(), &envelope.salt, iterations, KEY_LEN)?;
    let plaintext = primitives.aead_decrypt(key.as_bytes(), &envelope.iv, &envelope.ciphertext)?;

    String::from_utf8(plaintext)
        .map(SecretString::new)
        .map_err(|e| {
            e.into_bytes().zeroize();
            VaultError::EncodingError
        })
}

/// Encrypt plaintext under a password-derived key
///
/// PBKDF2 and the cipher run on the blocking thread pool so the caller's
/// executor is never stalled.
///
/// # Returns
/// The serialized envelope `v2:{base64(salt || iv || ciphertext)}`
pub async fn encrypt(plaintext: &[u8], password: &str) -> Result<String> {
    let plaintext = Zeroizing::new(plaintext.to_vec());
    let password = Zeroizing::new(password.to_owned());

    tokio::task::spawn_blocking(move || seal(&SystemPrimitives, &plaintext, &password))
        .await
        .map_err(|e| VaultError::CryptoError(format!("Encryption worker failed: {}", e)))?
}

/// Decrypt a serialized envelope with a password
///
/// Fails with `UnsupportedFormat` before any decoding when the version tag is
/// unknown, `Malformed` for structural problems, `AuthenticationFailed` when
/// the tag does not verify and `EncodingError` for non-UTF-8 plaintext.
pub async fn decrypt(stored: &str, password: &str) -> Result<SecretString> {
    let envelope = Envelope::parse(stored)?;
    let password = Zeroizing::new(password.to_owned());

    tokio::task::spawn_blocking(move || {
        open_envelope(&SystemPrimitives, &envelope, &password, PBKDF2_ITERATIONS)
    })
    .await
    .map_err(|e| VaultError::CryptoError(format!("Decryption worker failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::{
        aead::{Aead, KeyInit},
        Aes128Gcm, Nonce,
    };
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU8, Ordering};

    /// Cheap cost for property tests; the format itself always uses PBKDF2_ITERATIONS
    const TEST_ITERATIONS: u32 = 2;

    /// Fills every requested buffer with an incrementing counter
    struct CountingPrimitives {
        next: AtomicU8,
    }

    impl CountingPrimitives {
        fn new() -> Self {
            Self {
                next: AtomicU8::new(0),
            }
        }
    }

    impl CryptoPrimitives for CountingPrimitives {
        fn fill_random(&self, buf: &mut [u8]) -> Result<()> {
            for byte in buf.iter_mut() {
                *byte = self.next.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        }

        fn aead_encrypt(&self, key: &[u8], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
            SystemPrimitives.aead_encrypt(key, iv, plaintext)
        }

        fn aead_decrypt(&self, key: &[u8], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
            SystemPrimitives.aead_decrypt(key, iv, ciphertext)
        }
    }

    fn quick_seal(plaintext: &[u8], password: &str) -> String {
        seal_with_iterations(&SystemPrimitives, plaintext, password, TEST_ITERATIONS).unwrap()
    }

    fn quick_open(stored: &str, password: &str) -> Result<SecretString> {
        let envelope = Envelope::parse(stored)?;
        open_envelope(&SystemPrimitives, &envelope, password, TEST_ITERATIONS)
    }

    fn decoded_body(stored: &str) -> Vec<u8> {
        STANDARD.decode(&stored[VERSION_TAG.len()..]).unwrap()
    }

    fn encode_body(bytes: &[u8]) -> String {
        format!("{}{}", VERSION_TAG, STANDARD.encode(bytes))
    }

    #[test]
    fn test_wire_layout_is_salt_iv_ciphertext() {
        let primitives = CountingPrimitives::new();
        let stored =
            seal_with_iterations(&primitives, b"layout check", "pw", TEST_ITERATIONS).unwrap();

        assert!(stored.starts_with("v2:"));
        let combined = decoded_body(&stored);

        let expected_salt: Vec<u8> = (0u8..16).collect();
        let expected_iv: Vec<u8> = (16u8..28).collect();
        assert_eq!(&combined[..SALT_LEN], expected_salt.as_slice());
        assert_eq!(&combined[SALT_LEN..HEADER_LEN], expected_iv.as_slice());

        // Body must be exactly what AES-128-GCM produces with the derived key
        let key = derive_key(b"pw", &expected_salt, TEST_ITERATIONS, KEY_LEN).unwrap();
        let cipher = Aes128Gcm::new_from_slice(key.as_bytes()).unwrap();
        let expected_body = cipher
            .encrypt(Nonce::from_slice(&expected_iv), b"layout check".as_slice())
            .unwrap();
        assert_eq!(&combined[HEADER_LEN..], expected_body.as_slice());
        assert_eq!(combined.len(), HEADER_LEN + b"layout check".len() + 16);
    }

    #[test]
    fn test_parse_roundtrip_through_display() {
        let stored = quick_seal(b"test data", "pw");
        let envelope = Envelope::parse(&stored).unwrap();

        assert_eq!(envelope.to_string(), stored);
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let stored = quick_seal(b"", "pw");
        assert_eq!(decoded_body(&stored).len(), HEADER_LEN + 16);
        assert_eq!(quick_open(&stored, "pw").unwrap().expose(), "");
    }

    #[test]
    fn test_unknown_version_tag_rejected() {
        let stored = quick_seal(b"secret", "pw");
        let v3 = stored.replacen("v2:", "v3:", 1);

        assert!(matches!(Envelope::parse(&v3), Err(VaultError::UnsupportedFormat)));
        assert!(matches!(Envelope::parse(""), Err(VaultError::UnsupportedFormat)));
        assert!(matches!(Envelope::parse("V2:AAAA"), Err(VaultError::UnsupportedFormat)));
    }

    #[test]
    fn test_version_gate_runs_before_base64() {
        // Invalid base64 without the tag still reports the format, not Malformed
        let result = Envelope::parse("!!!not base64!!!");
        assert!(matches!(result, Err(VaultError::UnsupportedFormat)));
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        let result = Envelope::parse("v2:***");
        assert!(matches!(result, Err(VaultError::Malformed(_))));
    }

    #[test]
    fn test_short_payload_is_malformed() {
        let stored = encode_body(&[0u8; HEADER_LEN - 1]);
        assert!(matches!(Envelope::parse(&stored), Err(VaultError::Malformed(_))));

        let stored = encode_body(&[0u8; HEADER_LEN]);
        let envelope = Envelope::parse(&stored).unwrap();
        assert!(envelope.ciphertext.is_empty());
    }

    #[test]
    fn test_header_only_payload_fails_authentication() {
        let stored = encode_body(&[0u8; HEADER_LEN]);
        assert!(matches!(
            quick_open(&stored, "pw"),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_line_wrapped_base64_is_accepted() {
        let stored = quick_seal(b"wrapped across several lines of base64 output", "pw");
        let body = &stored[VERSION_TAG.len()..];
        let (head, tail) = body.split_at(20);
        let wrapped = format!("{}{}\n{}\n", VERSION_TAG, head, tail);

        let opened = quick_open(&wrapped, "pw").unwrap();
        assert_eq!(
            opened.expose(),
            "wrapped across several lines of base64 output"
        );
    }

    #[test]
    fn test_invalid_utf8_plaintext_is_encoding_error() {
        let stored = quick_seal(&[0xff, 0xfe, 0x00], "pw");
        assert!(matches!(quick_open(&stored, "pw"), Err(VaultError::EncodingError)));
    }

    #[test]
    fn test_every_call_draws_fresh_salt_and_iv() {
        let a = decoded_body(&quick_seal(b"same plaintext", "pw"));
        let b = decoded_body(&quick_seal(b"same plaintext", "pw"));

        assert_ne!(&a[..SALT_LEN], &b[..SALT_LEN]);
        assert_ne!(&a[SALT_LEN..HEADER_LEN], &b[SALT_LEN..HEADER_LEN]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_roundtrip() {
        let stored = encrypt("网站: example.com".as_bytes(), "master").await.unwrap();
        let plaintext = decrypt(&stored, "master").await.unwrap();

        assert_eq!(plaintext.expose(), "网站: example.com");
    }

    #[tokio::test]
    async fn test_wrong_password_fails_authentication() {
        let stored = encrypt(b"secret data", "correct horse").await.unwrap();
        let result = decrypt(&stored, "battery staple").await;

        assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn test_decrypt_rejects_unknown_tag() {
        let result = decrypt("v1:AAAA", "pw").await;
        assert!(matches!(result, Err(VaultError::UnsupportedFormat)));
    }

    #[test]
    fn test_sync_seal_open_use_envelope_policy() {
        let stored = seal(&SystemPrimitives, b"policy", "pw").unwrap();
        assert_eq!(open(&SystemPrimitives, &stored, "pw").unwrap().expose(), "policy");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_roundtrip_any_text(plaintext in ".*", password in ".*") {
            let stored = quick_seal(plaintext.as_bytes(), &password);
            let opened = quick_open(&stored, &password).unwrap();
            prop_assert_eq!(opened.expose(), plaintext.as_str());
        }

        #[test]
        fn test_wrong_password_never_yields_plaintext(
            plaintext in ".*",
            password in "[a-z]{1,12}",
            other in "[A-Z]{1,12}",
        ) {
            let stored = quick_seal(plaintext.as_bytes(), &password);
            let result = quick_open(&stored, &other);
            prop_assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
        }

        #[test]
        fn test_single_bit_flip_is_detected(
            plaintext in ".{0,64}",
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let stored = quick_seal(plaintext.as_bytes(), "pw");
            let mut combined = decoded_body(&stored);
            let index = position.index(combined.len());
            combined[index] ^= 1 << bit;

            let result = quick_open(&encode_body(&combined), "pw");
            prop_assert!(matches!(
                result,
                Err(VaultError::AuthenticationFailed) | Err(VaultError::Malformed(_))
            ));
        }
    }
}
