//! Key/value storage abstraction.
//!
//! The trie's only external dependency for persistence. Keys are 32-byte
//! node hashes, values are canonical node encodings; the trait itself is
//! agnostic and moves opaque bytes.

mod memory;

pub use memory::MemoryKv;

use thiserror::Error;

/// Errors surfaced by a key/value backend.
#[derive(Error, Debug)]
pub enum KvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend error: {0}")]
    Backend(String),
}

/// A byte-addressable key/value store.
///
/// Methods take `&self`; backends use interior mutability so that
/// read-only trie clones can share one store. The trie performs exactly
/// one `get` per node fetch and never assumes atomicity across puts.
pub trait KVStore: Send + Sync {
    /// Fetches a value. `None` means the key is absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;

    /// Stores a value under the key, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError>;

    /// Removes a key. The trie core never calls this; sweepers might.
    fn delete(&self, key: &[u8]) -> Result<(), KvError>;
}
