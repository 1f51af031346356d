//! AES-256-GCM cipher for hand-off values
//!
//! Wire format: `base64(nonce[12] || ciphertext || tag[16])`, standard
//! alphabet with padding, so values are plain ASCII text.
//!
//! The key is handed to [`HandoffCipher::new`] once; nothing here reads
//! configuration or the environment.

use aes_gcm::{
    aead::{Aead, OsRng, Payload},
    AeadCore, Aes256Gcm, KeyInit,
};
use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE as BASE64_URL_SAFE},
    Engine as _,
};

use crate::error::{IntegrityError, PipelineError};

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

/// GCM nonce length in bytes
const NONCE_SIZE: usize = 12;

/// GCM authentication tag length in bytes
const TAG_SIZE: usize = 16;

/// A 256-bit hand-off key.
///
/// Parsed from 64 hex characters or from base64 (standard or URL-safe
/// alphabet) encoding exactly 32 bytes. `Debug` never prints key material.
#[derive(Clone, PartialEq, Eq)]
pub struct HandoffKey([u8; KEY_LEN]);

impl HandoffKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random key from the OS RNG
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    /// Standard base64 form, as accepted by [`HandoffKey::parse`]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn parse(text: &str) -> Result<Self, KeyError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(KeyError::Empty);
        }

        let bytes = if text.len() == KEY_LEN * 2 && text.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode(text).map_err(|_| KeyError::Encoding)?
        } else {
            BASE64
                .decode(text)
                .or_else(|_| BASE64_URL_SAFE.decode(text))
                .map_err(|_| KeyError::Encoding)?
        };

        let bytes: [u8; KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::Length(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for HandoffKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HandoffKey(<redacted>)")
    }
}

impl std::str::FromStr for HandoffKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Rejected key text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("hand-off key is empty")]
    Empty,

    #[error("hand-off key must be base64 or 64 hex characters")]
    Encoding,

    #[error("hand-off key must decode to 32 bytes, got {0}")]
    Length(usize),
}

/// Authenticated symmetric cipher for values passed between stages
#[derive(Clone)]
pub struct HandoffCipher {
    cipher: Aes256Gcm,
}

impl HandoffCipher {
    pub fn new(key: &HandoffKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(&key.0.into()),
        }
    }

    /// Encrypt text into a transport-safe string
    pub fn encrypt(&self, plaintext: &str) -> Result<String, PipelineError> {
        self.encrypt_bound(plaintext, b"")
    }

    /// Decrypt a value produced by [`HandoffCipher::encrypt`]
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, IntegrityError> {
        self.decrypt_bound(ciphertext, b"")
    }

    /// Encrypt with associated data that must be presented again to decrypt
    pub fn encrypt_bound(&self, plaintext: &str, aad: &[u8]) -> Result<String, PipelineError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad,
                },
            )
            .map_err(|e| PipelineError::Encryption(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(&combined))
    }

    pub fn decrypt_bound(&self, ciphertext: &str, aad: &[u8]) -> Result<String, IntegrityError> {
        let combined = BASE64
            .decode(ciphertext.trim())
            .map_err(|e| IntegrityError::Encoding(e.to_string()))?;

        if combined.len() < NONCE_SIZE + TAG_SIZE {
            return Err(IntegrityError::Truncated(combined.len()));
        }

        let (nonce_bytes, sealed) = combined.split_at(NONCE_SIZE);
        let nonce = aes_gcm::Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, Payload { msg: sealed, aad })
            .map_err(|_| IntegrityError::Authentication)?;

        String::from_utf8(plaintext).map_err(|_| IntegrityError::Utf8)
    }
}

impl std::fmt::Debug for HandoffCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HandoffCipher { .. }")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_key() -> HandoffKey {
        let mut key = [0u8; KEY_LEN];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        HandoffKey::from_bytes(key)
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = HandoffCipher::new(&test_key());
        let plaintext = r#"{"host":"db","password":"p@ss"}"#;

        let encrypted = cipher.encrypt(plaintext).unwrap();
        assert_ne!(encrypted, plaintext);
        assert!(encrypted.is_ascii());

        assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn fresh_nonce_per_message() {
        let cipher = HandoffCipher::new(&test_key());
        let c1 = cipher.encrypt("same input").unwrap();
        let c2 = cipher.encrypt("same input").unwrap();
        assert_ne!(c1, c2);
    }

    #[test]
    fn wrong_key_is_an_integrity_error() {
        let mut other = [0u8; KEY_LEN];
        other[0] = 0xFF;
        let encrypted = HandoffCipher::new(&test_key()).encrypt("secret").unwrap();

        let result = HandoffCipher::new(&HandoffKey::from_bytes(other)).decrypt(&encrypted);
        assert_eq!(result, Err(IntegrityError::Authentication));
    }

    #[test]
    fn associated_data_must_match() {
        let cipher = HandoffCipher::new(&test_key());
        let encrypted = cipher.encrypt_bound("table", b"run-a:raw_table").unwrap();

        assert_eq!(cipher.decrypt_bound(&encrypted, b"run-a:raw_table").unwrap(), "table");
        assert_eq!(
            cipher.decrypt_bound(&encrypted, b"run-b:raw_table"),
            Err(IntegrityError::Authentication)
        );
        assert_eq!(cipher.decrypt(&encrypted), Err(IntegrityError::Authentication));
    }

    #[test]
    fn malformed_values_rejected() {
        let cipher = HandoffCipher::new(&test_key());
        assert!(matches!(cipher.decrypt("not base64!!"), Err(IntegrityError::Encoding(_))));
        assert_eq!(
            cipher.decrypt(&BASE64.encode([0u8; 5])),
            Err(IntegrityError::Truncated(5))
        );
    }

    #[test]
    fn empty_string_roundtrip() {
        let cipher = HandoffCipher::new(&test_key());
        let encrypted = cipher.encrypt("").unwrap();
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "");
    }

    #[test]
    fn key_parse_accepts_hex_and_base64() {
        let hex_key = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
        assert_eq!(HandoffKey::parse(hex_key).unwrap(), test_key());
        assert_eq!(HandoffKey::parse(&test_key().to_base64()).unwrap(), test_key());

        let url_safe = BASE64_URL_SAFE.encode([0xFBu8; KEY_LEN]);
        assert_eq!(
            HandoffKey::parse(&url_safe).unwrap(),
            HandoffKey::from_bytes([0xFB; KEY_LEN])
        );
    }

    #[test]
    fn key_parse_rejects_bad_input() {
        assert_eq!(HandoffKey::parse("  "), Err(KeyError::Empty));
        assert_eq!(HandoffKey::parse("%%%"), Err(KeyError::Encoding));
        assert_eq!(
            HandoffKey::parse(&BASE64.encode([1u8; 16])),
            Err(KeyError::Length(16))
        );
    }

    #[test]
    fn key_debug_is_redacted() {
        assert_eq!(format!("{:?}", test_key()), "HandoffKey(<redacted>)");
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(HandoffKey::generate(), HandoffKey::generate());
    }

    proptest! {
        #[test]
        fn roundtrip_any_string(s in ".*") {
            let cipher = HandoffCipher::new(&test_key());
            let encrypted = cipher.encrypt(&s).unwrap();
            prop_assert_eq!(cipher.decrypt(&encrypted).unwrap(), s);
        }

        #[test]
        fn flipping_any_byte_is_detected(
            s in ".{0,64}",
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let cipher = HandoffCipher::new(&test_key());
            let encrypted = cipher.encrypt(&s).unwrap();

            let mut bytes = BASE64.decode(&encrypted).unwrap();
            let i = index.index(bytes.len());
            bytes[i] ^= 1 << bit;
            let tampered = BASE64.encode(&bytes);

            prop_assert_eq!(cipher.decrypt(&tampered), Err(IntegrityError::Authentication));
        }
    }
}
