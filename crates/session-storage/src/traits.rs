//! Storage trait definitions.

use crate::StorageResult;

/// Trait for credential storage backends.
///
/// One implementation exists per platform (browser persistent storage,
/// mobile encrypted storage, ...). The session client only ever talks
/// to this trait.
pub trait TokenStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Remove a value. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Shared handles delegate, so a caller can keep a reference to the
/// backend it hands to the session client.
impl<T: TokenStorage + ?Sized> TokenStorage for std::sync::Arc<T> {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}
