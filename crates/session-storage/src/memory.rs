//! In-memory storage backend.

use crate::{StorageResult, TokenStorage};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory storage. The reference backend for tests and for
/// platforms without a persistent store; contents vanish with the
/// process.
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.lock().unwrap();
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self.data.lock().unwrap();
        Ok(data.get(key).cloned())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut data = self.data.lock().unwrap();
        data.remove(key);
        Ok(())
    }
}
