//! AES-256-GCM sealing for persisted token fields.
//!
//! Every field is sealed on its own with a fresh random nonce and the field name
//! as associated data, so a value cannot be moved to another field undetected.
//! Sealed form: `base64(nonce || ciphertext || tag)`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::StorageError;

/// Size of the encryption key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Decode a base64 master key and check its length.
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>, StorageError> {
    let key_bytes = BASE64
        .decode(key_base64.trim())
        .map_err(|e| StorageError::InvalidKey {
            message: format!("Failed to decode base64 encryption key: {}", e),
        })?;

    if key_bytes.len() != KEY_SIZE {
        return Err(StorageError::InvalidKey {
            message: format!(
                "Encryption key must be {} bytes (256 bits), got {} bytes",
                KEY_SIZE,
                key_bytes.len()
            ),
        });
    }

    Ok(key_bytes)
}

/// Authenticated cipher bound to one master key.
pub struct TokenCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl TokenCipher {
    /// Create cipher from raw key bytes.
    pub fn new(key: &[u8]) -> Result<Self, StorageError> {
        if key.len() != KEY_SIZE {
            return Err(StorageError::InvalidKey {
                message: format!("Encryption key must be {} bytes", KEY_SIZE),
            });
        }
        let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| StorageError::InvalidKey {
            message: "Key rejected by AES-256-GCM".to_string(),
        })?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Create cipher from a base64 encoded key.
    pub fn from_base64(key_base64: &str) -> Result<Self, StorageError> {
        Self::new(&validate_key(key_base64)?)
    }

    /// Seal `plaintext` for storage under `field`.
    pub fn seal(&self, field: &str, plaintext: &str) -> Result<String, StorageError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| StorageError::EncryptionFailed {
                message: "Failed to generate nonce".to_string(),
            })?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(field.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| StorageError::EncryptionFailed {
                message: format!("Failed to seal {}", field),
            })?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(BASE64.encode(sealed))
    }

    /// Open a value produced by [`TokenCipher::seal`] for the same `field`.
    pub fn open(&self, field: &str, sealed: &str) -> Result<String, StorageError> {
        let bytes = BASE64
            .decode(sealed)
            .map_err(|e| StorageError::CorruptedData {
                message: format!("{} is not valid base64: {}", field, e),
            })?;

        if bytes.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(StorageError::CorruptedData {
                message: format!("{} is too short to be sealed", field),
            });
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| {
            StorageError::CorruptedData {
                message: format!("{} has an invalid nonce", field),
            }
        })?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(field.as_bytes()), &mut in_out)
            .map_err(|_| StorageError::DecryptionFailed {
                message: format!("{} failed authentication (wrong key or tampered)", field),
            })?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| StorageError::CorruptedData {
            message: format!("{} is not valid UTF-8", field),
        })
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher")
            .field("algorithm", &"AES-256-GCM")
            .finish()
    }
}
