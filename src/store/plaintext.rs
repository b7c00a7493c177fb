//! Plaintext file store, selected when no usable encryption key is configured.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StorageError;
use crate::store::file::CredentialFile;
use crate::store::TokenStore;
use crate::types::Credential;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PlainRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

/// Unencrypted JSON store at `<directory>/<namespace>.json`.
#[derive(Debug, Clone)]
pub struct PlaintextFileStore {
    file: CredentialFile,
}

impl PlaintextFileStore {
    /// Create store for `namespace` under `directory`.
    pub fn new(directory: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            file: CredentialFile::new(directory.as_ref(), format!("{}.json", namespace)),
        }
    }

    /// Backing file path.
    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }
}

#[async_trait]
impl TokenStore for PlaintextFileStore {
    async fn load(&self) -> Result<Credential, StorageError> {
        let record = self.file.read::<PlainRecord>().await?.unwrap_or_default();
        debug!(path = %self.file.path().display(), "Loaded plaintext credential");
        Ok(Credential::from_parts(
            record.access_token,
            record.refresh_token,
            record.expires_at.unwrap_or(0),
        ))
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        let record = PlainRecord {
            access_token: credential.access_token.clone(),
            refresh_token: credential.refresh_token.clone(),
            expires_at: Some(credential.expires_at_millis()),
        };
        self.file.write(&record).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.file.remove().await
    }
}
