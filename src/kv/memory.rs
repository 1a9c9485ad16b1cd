//! In-memory key/value backend.

use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;

use super::{KVStore, KvError};

/// An in-process `KVStore` backed by a hash map.
///
/// Reads take a shared lock, so parallel readers over a stable root do
/// not contend. A single writer at a time is the caller's contract.
#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>, FxBuildHasher>>,
}

impl MemoryKv {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KVStore for MemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let kv = MemoryKv::new();
        kv.put(b"key", b"value").unwrap();
        assert_eq!(kv.get(b"key").unwrap(), Some(b"value".to_vec()));
        assert_eq!(kv.get(b"missing").unwrap(), None);
    }

    #[test]
    fn test_overwrite() {
        let kv = MemoryKv::new();
        kv.put(b"key", b"v1").unwrap();
        kv.put(b"key", b"v2").unwrap();
        assert_eq!(kv.get(b"key").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn test_delete() {
        let kv = MemoryKv::new();
        kv.put(b"key", b"value").unwrap();
        kv.delete(b"key").unwrap();
        assert_eq!(kv.get(b"key").unwrap(), None);
        assert!(kv.is_empty());
    }
}
