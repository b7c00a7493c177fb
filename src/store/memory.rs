//! In-memory and mock stores.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use crate::error::StorageError;
use crate::store::TokenStore;
use crate::types::Credential;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Volatile store; nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    credential: Mutex<Option<Credential>>,
}

impl InMemoryTokenStore {
    /// Create empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store that already holds `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn load(&self) -> Result<Credential, StorageError> {
        Ok(lock(&self.credential).clone().unwrap_or_default())
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        *lock(&self.credential) = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *lock(&self.credential) = None;
        Ok(())
    }
}

/// Store operation recorded by [`MockTokenStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    Save(Credential),
    Clear,
}

/// Mock store for testing.
#[derive(Default)]
pub struct MockTokenStore {
    credential: Mutex<Option<Credential>>,
    history: Mutex<Vec<StoreOperation>>,
    load_count: Mutex<usize>,
    should_fail: Mutex<bool>,
}

impl MockTokenStore {
    /// Create new mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the persisted credential.
    pub fn set_credential(&self, credential: Credential) -> &Self {
        *lock(&self.credential) = Some(credential);
        self
    }

    /// Set store to fail all operations.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *lock(&self.should_fail) = should_fail;
        self
    }

    /// Saves and clears in the order they were applied.
    pub fn history(&self) -> Vec<StoreOperation> {
        lock(&self.history).clone()
    }

    /// Credentials saved so far.
    pub fn saved(&self) -> Vec<Credential> {
        self.history()
            .into_iter()
            .filter_map(|op| match op {
                StoreOperation::Save(credential) => Some(credential),
                StoreOperation::Clear => None,
            })
            .collect()
    }

    /// Number of loads.
    pub fn load_count(&self) -> usize {
        *lock(&self.load_count)
    }

    /// Currently persisted credential, if any.
    pub fn persisted(&self) -> Option<Credential> {
        lock(&self.credential).clone()
    }

    fn check_error(&self) -> Result<(), StorageError> {
        if *lock(&self.should_fail) {
            return Err(StorageError::WriteFailed {
                message: "Mock storage failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MockTokenStore {
    async fn load(&self) -> Result<Credential, StorageError> {
        *lock(&self.load_count) += 1;
        if *lock(&self.should_fail) {
            return Err(StorageError::ReadFailed {
                message: "Mock storage failure".to_string(),
            });
        }
        Ok(lock(&self.credential).clone().unwrap_or_default())
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        self.check_error()?;
        lock(&self.history).push(StoreOperation::Save(credential.clone()));
        *lock(&self.credential) = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.check_error()?;
        lock(&self.history).push(StoreOperation::Clear);
        *lock(&self.credential) = None;
        Ok(())
    }
}

/// Create mock token store for testing.
pub fn create_mock_store() -> MockTokenStore {
    MockTokenStore::new()
}
