//! Batched change-log wrapper over the trie.
//!
//! A `BatchTrie` records every mutation between `begin_batch` and
//! `commit`/`rollback` so the whole batch can be undone as a unit.
//! Rollback is a local convenience: it does not delete nodes, it writes
//! compensating nodes through the ordinary put/delete path until the
//! pre-batch root is reached again.

use std::sync::Arc;

use tracing::debug;

use crate::kv::KVStore;

use super::codec::HASH_SIZE;
use super::error::TrieError;
use super::iter::TrieIterator;
use super::proof::MerkleProof;
use super::trie::Trie;

/// What a change-log entry did to its key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// The key was absent before the write.
    Insert,
    /// The key existed; `old_value` holds the replaced value.
    Update,
    /// The key was removed; `old_value` holds the removed value.
    Delete,
}

/// One recorded mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// What the mutation did.
    pub action: Action,
    /// The mutated key.
    pub key: Vec<u8>,
    /// Pre-image captured at mutation time (`Update`/`Delete`).
    pub old_value: Option<Vec<u8>>,
    /// The written value (`None` for `Delete`).
    pub new_value: Option<Vec<u8>>,
}

/// A trie with transactional batch semantics: at most one open batch,
/// committed or rolled back as a whole.
pub struct BatchTrie {
    trie: Trie,
    log: Vec<Entry>,
    batching: bool,
}

impl BatchTrie {
    /// Creates a batch trie over an empty trie.
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self::from_trie(Trie::new(kv))
    }

    /// Opens a batch trie at an existing root.
    pub fn with_root(kv: Arc<dyn KVStore>, root: [u8; HASH_SIZE]) -> Result<Self, TrieError> {
        Ok(Self::from_trie(Trie::with_root(kv, root)?))
    }

    /// Wraps an existing trie handle.
    pub fn from_trie(trie: Trie) -> Self {
        Self {
            trie,
            log: Vec::new(),
            batching: false,
        }
    }

    /// Returns the current root hash, or `None` for the empty trie.
    pub fn root_hash(&self) -> Option<[u8; HASH_SIZE]> {
        self.trie.root_hash()
    }

    /// Returns true if the trie holds no keys.
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Returns true while a batch is open.
    pub fn is_batching(&self) -> bool {
        self.batching
    }

    /// The open batch's change-log, in mutation order.
    pub fn log(&self) -> &[Entry] {
        &self.log
    }

    /// Gets the value stored under a key.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, TrieError> {
        self.trie.get(key)
    }

    /// Creates a prefix iterator over the current root.
    pub fn iterator(&self, prefix: &[u8]) -> Result<TrieIterator<'_>, TrieError> {
        self.trie.iterator(prefix)
    }

    /// Builds a Merkle inclusion proof for a key.
    pub fn prove(&self, key: &[u8]) -> Result<MerkleProof, TrieError> {
        self.trie.prove(key)
    }

    /// Opens a batch. Fails with `AlreadyBatching` if one is open.
    pub fn begin_batch(&mut self) -> Result<(), TrieError> {
        if self.batching {
            return Err(TrieError::AlreadyBatching);
        }
        self.batching = true;
        debug!(root = ?self.trie.root_hash().map(hex::encode), "batch opened");
        Ok(())
    }

    /// Inserts or updates a key, returning the new root hash. Inside a
    /// batch the mutation is appended to the change-log with its
    /// pre-image.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<[u8; HASH_SIZE], TrieError> {
        let old = match self.trie.get(key) {
            Ok(old) => Some(old),
            Err(TrieError::NotFound) => None,
            Err(err) => return Err(err),
        };
        let root = self.trie.put(key, value)?;
        if self.batching {
            let (action, old_value) = match old {
                Some(old) => (Action::Update, Some(old)),
                None => (Action::Insert, None),
            };
            self.log.push(Entry {
                action,
                key: key.to_vec(),
                old_value,
                new_value: Some(value.to_vec()),
            });
        }
        Ok(root)
    }

    /// Deletes a key, returning the new root hash. Fails with `NotFound`
    /// if the key is absent.
    pub fn delete(&mut self, key: &[u8]) -> Result<Option<[u8; HASH_SIZE]>, TrieError> {
        let old = self.trie.get(key)?;
        let root = self.trie.delete(key)?;
        if self.batching {
            self.log.push(Entry {
                action: Action::Delete,
                key: key.to_vec(),
                old_value: Some(old),
                new_value: None,
            });
        }
        Ok(root)
    }

    /// Closes the batch, keeping every root written during it.
    pub fn commit(&mut self) -> Result<(), TrieError> {
        if !self.batching {
            return Ok(());
        }
        debug!(
            entries = self.log.len(),
            root = ?self.trie.root_hash().map(hex::encode),
            "batch committed"
        );
        self.log.clear();
        self.batching = false;
        Ok(())
    }

    /// Undoes every mutation of the open batch, restoring the pre-batch
    /// root, then closes the batch.
    ///
    /// The log is first compressed to one entry per key keeping the
    /// earliest record, so `old_value` reflects the pre-batch state;
    /// later records for the same key are redundant.
    pub fn rollback(&mut self) -> Result<(), TrieError> {
        if !self.batching {
            return Ok(());
        }
        let compressed = compress_log(&self.log);
        for entry in &compressed {
            match entry.action {
                Action::Insert => {
                    // The key may have been deleted again later in the
                    // batch; an absent key needs no compensation.
                    match self.trie.delete(&entry.key) {
                        Ok(_) | Err(TrieError::NotFound) => {}
                        Err(err) => return Err(err),
                    }
                }
                Action::Update | Action::Delete => {
                    let old = entry.old_value.as_deref().unwrap_or_default();
                    self.trie.put(&entry.key, old)?;
                }
            }
        }
        debug!(
            entries = compressed.len(),
            root = ?self.trie.root_hash().map(hex::encode),
            "batch rolled back"
        );
        self.log.clear();
        self.batching = false;
        Ok(())
    }

    /// Creates an independent handle sharing the store and current root.
    /// Forbidden while a batch is open.
    pub fn try_clone(&self) -> Result<Self, TrieError> {
        if self.batching {
            return Err(TrieError::CloneInBatch);
        }
        Ok(Self::from_trie(self.trie.clone()))
    }

    /// Applies another batch trie's open change-log to this trie, in
    /// order, without recording entries here. Used to port state between
    /// storages.
    pub fn replay(&mut self, other: &BatchTrie) -> Result<(), TrieError> {
        for entry in other.log() {
            match entry.action {
                Action::Insert | Action::Update => {
                    let value = entry.new_value.as_deref().unwrap_or_default();
                    self.trie.put(&entry.key, value)?;
                }
                Action::Delete => {
                    self.trie.delete(&entry.key)?;
                }
            }
        }
        Ok(())
    }
}

/// Keeps the first entry seen for each key, in first-occurrence order.
fn compress_log(log: &[Entry]) -> Vec<Entry> {
    let mut compressed: Vec<Entry> = Vec::with_capacity(log.len());
    for entry in log {
        if !compressed.iter().any(|kept| kept.key == entry.key) {
            compressed.push(entry.clone());
        }
    }
    compressed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    fn empty_batch_trie() -> BatchTrie {
        BatchTrie::new(Arc::new(MemoryKv::new()))
    }

    #[test]
    fn test_mutations_outside_batch_keep_no_log() {
        let mut trie = empty_batch_trie();
        trie.put(b"key", b"value").unwrap();
        trie.delete(b"key").unwrap();
        assert!(trie.log().is_empty());
    }

    #[test]
    fn test_double_begin_fails() {
        let mut trie = empty_batch_trie();
        trie.begin_batch().unwrap();
        assert!(matches!(
            trie.begin_batch(),
            Err(TrieError::AlreadyBatching)
        ));
    }

    #[test]
    fn test_log_actions_and_preimages() {
        let mut trie = empty_batch_trie();
        trie.put(b"a", b"1").unwrap();
        trie.begin_batch().unwrap();
        trie.put(b"a", b"2").unwrap();
        trie.put(b"b", b"3").unwrap();
        trie.delete(b"a").unwrap();

        let log = trie.log();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].action, Action::Update);
        assert_eq!(log[0].old_value, Some(b"1".to_vec()));
        assert_eq!(log[1].action, Action::Insert);
        assert_eq!(log[1].old_value, None);
        assert_eq!(log[2].action, Action::Delete);
        assert_eq!(log[2].old_value, Some(b"2".to_vec()));
    }

    #[test]
    fn test_commit_clears_log_and_keeps_state() {
        let mut trie = empty_batch_trie();
        trie.begin_batch().unwrap();
        trie.put(b"key", b"value").unwrap();
        trie.commit().unwrap();
        assert!(!trie.is_batching());
        assert!(trie.log().is_empty());
        assert_eq!(trie.get(b"key").unwrap(), b"value");
    }

    #[test]
    fn test_rollback_restores_pre_batch_root() {
        let mut trie = empty_batch_trie();
        trie.put(b"a", b"1").unwrap();
        trie.put(b"b", b"2").unwrap();
        let before = trie.root_hash();

        trie.begin_batch().unwrap();
        trie.put(b"a", b"changed").unwrap();
        trie.put(b"c", b"new").unwrap();
        trie.delete(b"b").unwrap();
        trie.rollback().unwrap();

        assert_eq!(trie.root_hash(), before);
        assert_eq!(trie.get(b"a").unwrap(), b"1");
        assert_eq!(trie.get(b"b").unwrap(), b"2");
        assert!(matches!(trie.get(b"c"), Err(TrieError::NotFound)));
    }

    #[test]
    fn test_rollback_insert_then_delete() {
        let mut trie = empty_batch_trie();
        trie.put(b"keep", b"v").unwrap();
        let before = trie.root_hash();

        // The inserted key is already gone by rollback time.
        trie.begin_batch().unwrap();
        trie.put(b"gone", b"1").unwrap();
        trie.delete(b"gone").unwrap();
        trie.rollback().unwrap();

        assert_eq!(trie.root_hash(), before);
    }

    #[test]
    fn test_rollback_uses_first_entry_per_key() {
        let mut trie = empty_batch_trie();
        trie.put(b"key", b"original").unwrap();
        let before = trie.root_hash();

        trie.begin_batch().unwrap();
        trie.put(b"key", b"first change").unwrap();
        trie.put(b"key", b"second change").unwrap();
        trie.delete(b"key").unwrap();
        trie.rollback().unwrap();

        assert_eq!(trie.root_hash(), before);
        assert_eq!(trie.get(b"key").unwrap(), b"original");
    }

    #[test]
    fn test_clone_forbidden_while_batching() {
        let mut trie = empty_batch_trie();
        trie.begin_batch().unwrap();
        assert!(matches!(trie.try_clone(), Err(TrieError::CloneInBatch)));
        trie.commit().unwrap();
        assert!(trie.try_clone().is_ok());
    }

    #[test]
    fn test_clones_diverge_independently() {
        let mut trie = empty_batch_trie();
        trie.put(b"key", b"shared").unwrap();
        let mut other = trie.try_clone().unwrap();
        other.put(b"key", b"changed").unwrap();

        assert_eq!(trie.get(b"key").unwrap(), b"shared");
        assert_eq!(other.get(b"key").unwrap(), b"changed");
    }

    #[test]
    fn test_replay_ports_a_batch() {
        let mut source = empty_batch_trie();
        source.put(b"stale", b"x").unwrap();
        source.begin_batch().unwrap();
        source.put(b"a", b"1").unwrap();
        source.put(b"b", b"2").unwrap();
        source.delete(b"stale").unwrap();

        // The target starts from the same pre-batch state on its own
        // storage.
        let mut target = empty_batch_trie();
        target.put(b"stale", b"x").unwrap();
        target.replay(&source).unwrap();

        assert_eq!(target.root_hash(), source.root_hash());
        assert_eq!(target.get(b"a").unwrap(), b"1");
        assert!(target.log().is_empty());
    }

    #[test]
    fn test_commit_equivalent_to_unbatched() {
        let mut batched = empty_batch_trie();
        batched.begin_batch().unwrap();
        batched.put(b"a", b"1").unwrap();
        batched.put(b"b", b"2").unwrap();
        batched.delete(b"a").unwrap();
        batched.commit().unwrap();

        let mut plain = empty_batch_trie();
        plain.put(b"a", b"1").unwrap();
        plain.put(b"b", b"2").unwrap();
        plain.delete(b"a").unwrap();

        assert_eq!(batched.root_hash(), plain.root_hash());
    }
}
