//! Encrypted file store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StorageError;
use crate::store::encryption::TokenCipher;
use crate::store::file::CredentialFile;
use crate::store::TokenStore;
use crate::types::Credential;

const ACCESS_TOKEN: &str = "access_token";
const REFRESH_TOKEN: &str = "refresh_token";
const EXPIRES_AT: &str = "expires_at";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SealedRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
}

/// AES-256-GCM sealed JSON store at `<directory>/<namespace>.sealed.json`.
///
/// Field presence is kept in the clear; values, including the expiry, are sealed.
#[derive(Debug)]
pub struct EncryptedFileStore {
    file: CredentialFile,
    cipher: TokenCipher,
}

impl EncryptedFileStore {
    /// Create store for `namespace` under `directory`.
    pub fn new(directory: impl AsRef<Path>, namespace: &str, cipher: TokenCipher) -> Self {
        Self {
            file: CredentialFile::new(directory.as_ref(), format!("{}.sealed.json", namespace)),
            cipher,
        }
    }

    /// Backing file path.
    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    fn seal(&self, field: &str, value: Option<&str>) -> Result<Option<String>, StorageError> {
        value.map(|v| self.cipher.seal(field, v)).transpose()
    }

    fn open(&self, field: &str, value: Option<&str>) -> Result<Option<String>, StorageError> {
        value.map(|v| self.cipher.open(field, v)).transpose()
    }
}

#[async_trait]
impl TokenStore for EncryptedFileStore {
    async fn load(&self) -> Result<Credential, StorageError> {
        let record = self.file.read::<SealedRecord>().await?.unwrap_or_default();

        let access_token = self.open(ACCESS_TOKEN, record.access_token.as_deref())?;
        let refresh_token = self.open(REFRESH_TOKEN, record.refresh_token.as_deref())?;
        let expires_at = match self.open(EXPIRES_AT, record.expires_at.as_deref())? {
            Some(millis) => millis.parse::<i64>().map_err(|e| StorageError::CorruptedData {
                message: format!("{}: {}", EXPIRES_AT, e),
            })?,
            None => 0,
        };

        debug!(path = %self.file.path().display(), "Loaded encrypted credential");
        Ok(Credential::from_parts(access_token, refresh_token, expires_at))
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        let record = SealedRecord {
            access_token: self.seal(ACCESS_TOKEN, credential.access_token.as_deref())?,
            refresh_token: self.seal(REFRESH_TOKEN, credential.refresh_token.as_deref())?,
            expires_at: self.seal(
                EXPIRES_AT,
                Some(credential.expires_at_millis().to_string().as_str()),
            )?,
        };
        self.file.write(&record).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.file.remove().await
    }

    fn is_encrypted(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path, key: u8) -> EncryptedFileStore {
        EncryptedFileStore::new(dir, "spotikit", TokenCipher::new(&[key; 32]).unwrap())
    }

    #[tokio::test]
    async fn test_tokens_not_written_in_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), 3);
        let credential = Credential::from_parts(
            Some("BQC-access".to_string()),
            Some("AQD-refresh".to_string()),
            1_700_000_000_000,
        );
        store.save(&credential).await.unwrap();

        let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert!(!raw.contains("BQC-access"));
        assert!(!raw.contains("AQD-refresh"));
        assert!(!raw.contains("1700000000000"));
        assert_eq!(store.load().await.unwrap(), credential);
    }

    #[tokio::test]
    async fn test_wrong_key_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        store(dir.path(), 3)
            .save(&Credential::from_parts(Some("A1".to_string()), None, 5))
            .await
            .unwrap();

        assert!(matches!(
            store(dir.path(), 4).load().await,
            Err(StorageError::DecryptionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), 3);
        store
            .save(&Credential::from_parts(Some("A1".to_string()), None, 5))
            .await
            .unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();

        assert!(!store.path().exists());
        assert_eq!(store.load().await.unwrap(), Credential::empty());
    }
}
