//! Merkle Patricia Trie engine.
//!
//! Nodes are materialized on demand from the key/value store (keyed by
//! their hash), mutated in memory, rehashed, and written back as new
//! nodes. There is no in-place update: every mutation produces a new root
//! hash, and old nodes stay in the store, so any previously captured root
//! remains addressable.

use std::sync::Arc;

use crate::data::{bytes_to_nibbles, common_prefix_len};
use crate::kv::KVStore;

use super::codec::HASH_SIZE;
use super::error::TrieError;
use super::iter::TrieIterator;
use super::node::{child_count, next_child, Node};
use super::proof::MerkleProof;

/// A persistent, content-addressed Merkle Patricia Trie.
///
/// A trie is a `(root_hash, kvstore)` pair. The empty trie has no root
/// hash; a non-empty trie's root hash must resolve in the store. Clones
/// share the store and start from the same root, then diverge
/// independently.
#[derive(Clone)]
pub struct Trie {
    /// Current root hash. `None` for the empty trie.
    root: Option<[u8; HASH_SIZE]>,
    /// Node storage, keyed by node hash.
    kv: Arc<dyn KVStore>,
}

impl Trie {
    /// Creates an empty trie over the given store.
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { root: None, kv }
    }

    /// Opens a trie at an existing root.
    ///
    /// Fails with `NotFound` if the root does not resolve in the store.
    pub fn with_root(kv: Arc<dyn KVStore>, root: [u8; HASH_SIZE]) -> Result<Self, TrieError> {
        if kv.get(&root)?.is_none() {
            return Err(TrieError::NotFound);
        }
        Ok(Self {
            root: Some(root),
            kv,
        })
    }

    /// Returns the current root hash, or `None` for the empty trie.
    pub fn root_hash(&self) -> Option<[u8; HASH_SIZE]> {
        self.root
    }

    /// Returns true if the trie holds no keys.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Adopts a previously captured root, reverting the trie to that
    /// version. Fails with `NotFound` if the root does not resolve.
    pub fn set_root(&mut self, root: Option<[u8; HASH_SIZE]>) -> Result<(), TrieError> {
        if let Some(hash) = &root {
            if self.kv.get(hash)?.is_none() {
                return Err(TrieError::NotFound);
            }
        }
        self.root = root;
        Ok(())
    }

    /// Returns a handle to the underlying store.
    pub fn kv(&self) -> &Arc<dyn KVStore> {
        &self.kv
    }

    // ========================================================================
    // Key/Value Operations
    // ========================================================================

    /// Gets the value stored under a key.
    ///
    /// An empty value is legal and distinct from an absent key.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, TrieError> {
        let root = self.root.ok_or(TrieError::NotFound)?;
        let route = bytes_to_nibbles(key);
        self.get_at(root, &route)
    }

    fn get_at(&self, hash: [u8; HASH_SIZE], route: &[u8]) -> Result<Vec<u8>, TrieError> {
        match self.fetch(hash)? {
            Node::Leaf { path, value } => {
                if path == route {
                    Ok(value)
                } else {
                    Err(TrieError::NotFound)
                }
            }
            Node::Extension { path, child } => {
                if route.len() >= path.len() && route[..path.len()] == path[..] {
                    self.get_at(child, &route[path.len()..])
                } else {
                    Err(TrieError::NotFound)
                }
            }
            Node::Branch { children } => {
                let (&nibble, rest) = route.split_first().ok_or(TrieError::NotFound)?;
                let child = children[nibble as usize].ok_or(TrieError::NotFound)?;
                self.get_at(child, rest)
            }
        }
    }

    /// Inserts or updates a key, returning the new root hash.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<[u8; HASH_SIZE], TrieError> {
        let route = bytes_to_nibbles(key);
        let node = self.put_at(self.root, &route, value.to_vec())?;
        let hash = self.persist(&node)?;
        self.root = Some(hash);
        Ok(hash)
    }

    /// Recursively rebuilds the subtree at `current` with the value
    /// inserted, returning the new (not yet persisted) subtree root.
    fn put_at(
        &self,
        current: Option<[u8; HASH_SIZE]>,
        route: &[u8],
        value: Vec<u8>,
    ) -> Result<Node, TrieError> {
        let hash = match current {
            Some(hash) => hash,
            // Empty subtree: the whole remaining route goes into a leaf.
            None => return Ok(Node::leaf(route.to_vec(), value)),
        };

        match self.fetch(hash)? {
            Node::Leaf { path, value: old } => self.put_into_leaf(path, old, route, value),
            Node::Extension { path, child } => self.put_into_extension(path, child, route, value),
            Node::Branch { mut children } => {
                let (&nibble, rest) = route.split_first().ok_or(TrieError::KeyTooShort)?;
                let slot = &mut children[nibble as usize];
                let new_child = self.put_at(*slot, rest, value)?;
                *slot = Some(self.persist(&new_child)?);
                Ok(Node::Branch { children })
            }
        }
    }

    fn put_into_leaf(
        &self,
        path: Vec<u8>,
        old: Vec<u8>,
        route: &[u8],
        value: Vec<u8>,
    ) -> Result<Node, TrieError> {
        let m = common_prefix_len(&path, route);

        if m == path.len() && m == route.len() {
            // Same key: overwrite.
            return Ok(Node::leaf(path, value));
        }
        if m == route.len() {
            return Err(TrieError::KeyTooShort);
        }
        if m == path.len() {
            return Err(TrieError::KeyTooLong);
        }

        // Diverge: both tails move under a fresh branch.
        let mut node = Node::branch();
        if let Node::Branch { children } = &mut node {
            let old_leaf = Node::leaf(path[m + 1..].to_vec(), old);
            let new_leaf = Node::leaf(route[m + 1..].to_vec(), value);
            children[path[m] as usize] = Some(self.persist(&old_leaf)?);
            children[route[m] as usize] = Some(self.persist(&new_leaf)?);
        }

        if m > 0 {
            let branch_hash = self.persist(&node)?;
            node = Node::extension(route[..m].to_vec(), branch_hash);
        }
        Ok(node)
    }

    fn put_into_extension(
        &self,
        path: Vec<u8>,
        child: [u8; HASH_SIZE],
        route: &[u8],
        value: Vec<u8>,
    ) -> Result<Node, TrieError> {
        let m = common_prefix_len(&path, route);

        if m == path.len() {
            // Full match: the insert continues below this edge.
            let new_child = self.put_at(Some(child), &route[m..], value)?;
            let child_hash = self.persist(&new_child)?;
            return Ok(Node::extension(path, child_hash));
        }
        if m == route.len() {
            // The key ends inside the compressed edge.
            return Err(TrieError::KeyTooShort);
        }

        // Split: a branch takes over at the divergence point.
        let mut node = Node::branch();
        if let Node::Branch { children } = &mut node {
            let old_side = if path.len() == m + 1 {
                // One nibble remained: point straight at the old child.
                child
            } else {
                self.persist(&Node::extension(path[m + 1..].to_vec(), child))?
            };
            let new_leaf = Node::leaf(route[m + 1..].to_vec(), value);
            children[path[m] as usize] = Some(old_side);
            children[route[m] as usize] = Some(self.persist(&new_leaf)?);
        }

        if m > 0 {
            let branch_hash = self.persist(&node)?;
            node = Node::extension(path[..m].to_vec(), branch_hash);
        }
        Ok(node)
    }

    /// Deletes a key, returning the new root hash (`None` when the last
    /// key is removed). Fails with `NotFound` if the key is absent.
    pub fn delete(&mut self, key: &[u8]) -> Result<Option<[u8; HASH_SIZE]>, TrieError> {
        let root = self.root.ok_or(TrieError::NotFound)?;
        let route = bytes_to_nibbles(key);
        match self.delete_at(root, &route)? {
            Some(node) => {
                let hash = self.persist(&node)?;
                self.root = Some(hash);
                Ok(Some(hash))
            }
            None => {
                self.root = None;
                Ok(None)
            }
        }
    }

    /// Recursively deletes within the subtree at `hash`, returning the
    /// normalized replacement subtree, or `None` if it vanished.
    fn delete_at(&self, hash: [u8; HASH_SIZE], route: &[u8]) -> Result<Option<Node>, TrieError> {
        match self.fetch(hash)? {
            Node::Leaf { path, .. } => {
                if path == route {
                    Ok(None)
                } else {
                    Err(TrieError::NotFound)
                }
            }
            Node::Extension { path, child } => {
                if route.len() < path.len() || route[..path.len()] != path[..] {
                    return Err(TrieError::NotFound);
                }
                match self.delete_at(child, &route[path.len()..])? {
                    None => Ok(None),
                    // Splice: an extension never hangs over another edge.
                    Some(Node::Extension { path: tail, child }) => {
                        Ok(Some(Node::extension(splice(&path, &tail), child)))
                    }
                    Some(Node::Leaf { path: tail, value }) => {
                        Ok(Some(Node::leaf(splice(&path, &tail), value)))
                    }
                    Some(branch) => {
                        let child_hash = self.persist(&branch)?;
                        Ok(Some(Node::extension(path, child_hash)))
                    }
                }
            }
            Node::Branch { mut children } => {
                let (&nibble, rest) = route.split_first().ok_or(TrieError::NotFound)?;
                let slot = children[nibble as usize].ok_or(TrieError::NotFound)?;
                children[nibble as usize] = match self.delete_at(slot, rest)? {
                    Some(node) => Some(self.persist(&node)?),
                    None => None,
                };
                self.normalize_branch(children)
            }
        }
    }

    /// Collapses a branch left with fewer than two children.
    fn normalize_branch(
        &self,
        children: Box<[Option<[u8; HASH_SIZE]>; 16]>,
    ) -> Result<Option<Node>, TrieError> {
        match child_count(&children) {
            0 => Ok(None),
            1 => {
                let (i, child_hash) = next_child(&children, 0).ok_or(TrieError::UnknownNodeType)?;
                match self.fetch(child_hash)? {
                    // A lone branch child gets a one-nibble edge above it.
                    Node::Branch { .. } => {
                        Ok(Some(Node::extension(vec![i as u8], child_hash)))
                    }
                    Node::Extension { path, child } => {
                        Ok(Some(Node::extension(splice(&[i as u8], &path), child)))
                    }
                    Node::Leaf { path, value } => {
                        Ok(Some(Node::leaf(splice(&[i as u8], &path), value)))
                    }
                }
            }
            _ => Ok(Some(Node::Branch { children })),
        }
    }

    // ========================================================================
    // Traversals
    // ========================================================================

    /// Creates an iterator over every leaf whose key route starts with
    /// the nibbles of `prefix`. Leaves are visited in ascending nibble
    /// order. Fails with `NotFound` if the prefix diverges from the
    /// stored structure.
    pub fn iterator(&self, prefix: &[u8]) -> Result<TrieIterator<'_>, TrieError> {
        TrieIterator::new(self, prefix)
    }

    /// Builds a Merkle inclusion proof for a key: the root-to-leaf
    /// sequence of node images. Fails with `NotFound` if the key is
    /// absent.
    pub fn prove(&self, key: &[u8]) -> Result<MerkleProof, TrieError> {
        let root = self.root.ok_or(TrieError::NotFound)?;
        let route = bytes_to_nibbles(key);
        let mut nodes = Vec::new();
        self.prove_at(root, &route, &mut nodes)?;
        Ok(MerkleProof::new(key.to_vec(), nodes))
    }

    fn prove_at(
        &self,
        hash: [u8; HASH_SIZE],
        route: &[u8],
        nodes: &mut Vec<Vec<Vec<u8>>>,
    ) -> Result<(), TrieError> {
        let node = self.fetch(hash)?;
        nodes.push(node.to_raw());
        match node {
            Node::Leaf { path, .. } => {
                if path == route {
                    Ok(())
                } else {
                    Err(TrieError::NotFound)
                }
            }
            Node::Extension { path, child } => {
                if route.len() >= path.len() && route[..path.len()] == path[..] {
                    self.prove_at(child, &route[path.len()..], nodes)
                } else {
                    Err(TrieError::NotFound)
                }
            }
            Node::Branch { children } => {
                let (&nibble, rest) = route.split_first().ok_or(TrieError::NotFound)?;
                let child = children[nibble as usize].ok_or(TrieError::NotFound)?;
                self.prove_at(child, rest, nodes)
            }
        }
    }

    // ========================================================================
    // Node storage
    // ========================================================================

    /// Fetches and decodes the node stored under `hash`.
    pub(crate) fn fetch(&self, hash: [u8; HASH_SIZE]) -> Result<Node, TrieError> {
        let bytes = self.kv.get(&hash)?.ok_or(TrieError::NotFound)?;
        Node::decode(&bytes)
    }

    /// Persists a node under its hash. Identical re-puts are idempotent.
    fn persist(&self, node: &Node) -> Result<[u8; HASH_SIZE], TrieError> {
        let encoded = node.encode();
        let hash = super::codec::sha3_256(&encoded);
        self.kv.put(&hash, &encoded)?;
        Ok(hash)
    }
}

/// Concatenates two nibble paths.
fn splice(head: &[u8], tail: &[u8]) -> Vec<u8> {
    let mut path = Vec::with_capacity(head.len() + tail.len());
    path.extend_from_slice(head);
    path.extend_from_slice(tail);
    path
}
