//! Secure Token Store
//!
//! Durable mirror of the engine's credential. Two interchangeable file
//! adapters exist: an AES-256-GCM sealed store and a plaintext fallback. The
//! adapter is chosen once by [`open_token_store`]; the engine only sees
//! [`TokenStore`].

use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::StorageError;
use crate::types::{Credential, StorageConfig};

pub mod encrypted;
pub mod encryption;
mod file;
pub mod memory;
pub mod plaintext;

pub use encrypted::EncryptedFileStore;
pub use encryption::{validate_key, TokenCipher, KEY_SIZE};
pub use memory::{create_mock_store, InMemoryTokenStore, MockTokenStore, StoreOperation};
pub use plaintext::PlaintextFileStore;

/// Credential persistence interface.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the persisted credential. Absent fields come back empty; a store
    /// that was never written loads as [`Credential::empty`].
    async fn load(&self) -> Result<Credential, StorageError>;

    /// Replace the persisted credential.
    async fn save(&self, credential: &Credential) -> Result<(), StorageError>;

    /// Remove the persisted credential.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Check if values are encrypted at rest.
    fn is_encrypted(&self) -> bool {
        false
    }
}

/// Select the store adapter for `config`.
///
/// The encrypted store is used when a valid key is configured. A missing or
/// unusable key degrades to the plaintext store.
pub fn open_token_store(config: &StorageConfig) -> Arc<dyn TokenStore> {
    let key = match &config.encryption_key {
        Some(key) => key,
        None => {
            warn!(
                directory = %config.directory.display(),
                "No encryption key configured, tokens will be stored unencrypted"
            );
            return Arc::new(PlaintextFileStore::new(&config.directory, &config.namespace));
        }
    };

    match TokenCipher::from_base64(key.expose_secret()) {
        Ok(cipher) => {
            info!(directory = %config.directory.display(), "Using encrypted token store");
            Arc::new(EncryptedFileStore::new(
                &config.directory,
                &config.namespace,
                cipher,
            ))
        }
        Err(e) => {
            warn!(error = %e, "Encryption unavailable, tokens will be stored unencrypted");
            Arc::new(PlaintextFileStore::new(&config.directory, &config.namespace))
        }
    }
}
