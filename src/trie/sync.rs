//! Node fetching from a remote peer.
//!
//! When a trie root is known but some of its nodes are missing locally
//! (a peer announced a newer state root, or a partial store was copied),
//! the fetcher pulls the missing node images from a `NodeSource` and
//! writes them straight into the local store. It is a collaborator of the
//! trie, not a trie operation: it moves node images, not keys.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::data::bytes_to_nibbles;
use crate::kv::{KVStore, KvError};

use super::codec::{self, HASH_SIZE};
use super::error::TrieError;
use super::node::Node;

/// Anything that can serve node images by hash. In production this is a
/// network peer; any `KVStore` qualifies too.
pub trait NodeSource {
    /// Fetches the node image stored under `hash`, if the source has it.
    fn fetch_node(&self, hash: &[u8; HASH_SIZE]) -> Result<Option<Vec<u8>>, KvError>;
}

impl<T: KVStore + ?Sized> NodeSource for T {
    fn fetch_node(&self, hash: &[u8; HASH_SIZE]) -> Result<Option<Vec<u8>>, KvError> {
        self.get(hash)
    }
}

/// Copies missing trie nodes from a source into a local store.
pub struct NodeFetcher<'a> {
    kv: Arc<dyn KVStore>,
    source: &'a dyn NodeSource,
}

impl<'a> NodeFetcher<'a> {
    /// Creates a fetcher writing into `kv` and reading from `source`.
    pub fn new(kv: Arc<dyn KVStore>, source: &'a dyn NodeSource) -> Self {
        Self { kv, source }
    }

    /// Fetches every node reachable from `root` that is missing locally.
    /// Returns the number of node images written.
    pub fn sync_trie(&self, root: [u8; HASH_SIZE]) -> Result<usize, TrieError> {
        let mut fetched = 0;
        self.sync_subtree(root, &mut fetched)?;
        debug!(fetched, root = %hex::encode(root), "trie synced");
        Ok(fetched)
    }

    fn sync_subtree(&self, hash: [u8; HASH_SIZE], fetched: &mut usize) -> Result<(), TrieError> {
        let node = self.ensure(hash, fetched)?;
        match node {
            Node::Leaf { .. } => Ok(()),
            Node::Extension { child, .. } => self.sync_subtree(child, fetched),
            Node::Branch { children } => {
                for child in children.iter().flatten() {
                    self.sync_subtree(*child, fetched)?;
                }
                Ok(())
            }
        }
    }

    /// Fetches the nodes along one key's route under `root` that are
    /// missing locally. Returns the number of node images written, or
    /// `NotFound` if the route diverges from the stored structure.
    pub fn sync_path(&self, root: [u8; HASH_SIZE], key: &[u8]) -> Result<usize, TrieError> {
        let route = bytes_to_nibbles(key);
        let mut remaining: &[u8] = &route;
        let mut current = root;
        let mut fetched = 0;

        loop {
            match self.ensure(current, &mut fetched)? {
                Node::Leaf { path, .. } => {
                    if path == remaining {
                        debug!(fetched, key = %hex::encode(key), "path synced");
                        return Ok(fetched);
                    }
                    return Err(TrieError::NotFound);
                }
                Node::Extension { path, child } => {
                    if remaining.len() < path.len() || remaining[..path.len()] != path[..] {
                        return Err(TrieError::NotFound);
                    }
                    remaining = &remaining[path.len()..];
                    current = child;
                }
                Node::Branch { children } => {
                    let (&nibble, rest) = remaining.split_first().ok_or(TrieError::NotFound)?;
                    let child = children[nibble as usize].ok_or(TrieError::NotFound)?;
                    remaining = rest;
                    current = child;
                }
            }
        }
    }

    /// Returns the node under `hash`, pulling its image from the source
    /// if the local store lacks it. Fetched images are verified against
    /// the hash they were requested under before being stored.
    fn ensure(&self, hash: [u8; HASH_SIZE], fetched: &mut usize) -> Result<Node, TrieError> {
        if let Some(bytes) = self.kv.get(&hash)? {
            return Node::decode(&bytes);
        }
        let bytes = self
            .source
            .fetch_node(&hash)?
            .ok_or(TrieError::NotFound)?;
        if codec::sha3_256(&bytes) != hash {
            return Err(TrieError::WrongHash);
        }
        let node = Node::decode(&bytes)?;
        self.kv.put(&hash, &bytes)?;
        *fetched += 1;
        trace!(hash = %hex::encode(hash), "node fetched");
        Ok(node)
    }
}
