//! JSON credential file with atomic replacement.

use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// One JSON document on disk.
#[derive(Debug, Clone)]
pub(crate) struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub(crate) fn new(directory: &Path, file_name: String) -> Self {
        Self {
            path: directory.join(file_name),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document; `None` when the file does not exist.
    pub(crate) async fn read<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::ReadFailed {
                    message: format!("{}: {}", self.path.display(), e),
                })
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::CorruptedData {
                message: format!("{}: {}", self.path.display(), e),
            })
    }

    /// Replace the document. Written to a sibling temp file first, then renamed.
    pub(crate) async fn write<T: Serialize>(&self, value: &T) -> Result<(), StorageError> {
        let write_failed = |e: std::io::Error| StorageError::WriteFailed {
            message: format!("{}: {}", self.path.display(), e),
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
        }

        let bytes = serde_json::to_vec_pretty(value).map_err(|e| StorageError::WriteFailed {
            message: e.to_string(),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(write_failed)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(write_failed)?;
        }

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(write_failed)
    }

    /// Delete the document; a missing file is not an error.
    pub(crate) async fn remove(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteFailed {
                message: format!("{}: {}", self.path.display(), e),
            }),
        }
    }
}
