//! Merkle inclusion proofs.
//!
//! A proof is the root-to-leaf sequence of node images along a key's
//! route. Verification replays the walk: each step must hash to the value
//! the previous step committed to, so altering any byte anywhere in the
//! proof breaks the chain.

use crate::data::{bytes_to_nibbles, common_prefix_len};

use super::codec::{self, RawNode, HASH_SIZE};
use super::error::TrieError;
use super::node::Node;

/// A Merkle proof for a key's inclusion in a trie.
#[derive(Clone, Debug)]
pub struct MerkleProof {
    /// The key being proved.
    key: Vec<u8>,
    /// Node field vectors from the root towards the leaf.
    nodes: Vec<RawNode>,
}

impl MerkleProof {
    /// Assembles a proof from a key and its node images, e.g. as received
    /// from a peer.
    pub fn new(key: Vec<u8>, nodes: Vec<RawNode>) -> Self {
        Self { key, nodes }
    }

    /// The key this proof covers.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The proof's node images, root first.
    pub fn nodes(&self) -> &[RawNode] {
        &self.nodes
    }

    /// Verifies the proof against a declared root hash.
    ///
    /// Walks the proof top-down: every node image must hash to the value
    /// expected at that step (`WrongHash`), its path nibbles must follow
    /// the key's route (`WrongPath`), and its shape must classify
    /// (`UnknownNodeType`). The walk must end on a leaf whose remaining
    /// nibbles equal the remaining route exactly.
    pub fn verify(&self, root: &[u8; HASH_SIZE]) -> Result<(), TrieError> {
        let route = bytes_to_nibbles(&self.key);
        let mut remaining: &[u8] = &route;
        let mut expected = *root;

        for raw in &self.nodes {
            let image = codec::encode_fields(raw);
            if codec::sha3_256(&image) != expected {
                return Err(TrieError::WrongHash);
            }
            match Node::from_raw(raw.clone())? {
                Node::Leaf { path, .. } => {
                    if path == remaining {
                        return Ok(());
                    }
                    return Err(TrieError::WrongPath);
                }
                Node::Extension { path, child } => {
                    if common_prefix_len(&path, remaining) < path.len() {
                        return Err(TrieError::WrongPath);
                    }
                    remaining = &remaining[path.len()..];
                    expected = child;
                }
                Node::Branch { children } => {
                    let (&nibble, rest) = remaining.split_first().ok_or(TrieError::WrongPath)?;
                    let child = children[nibble as usize].ok_or(TrieError::WrongPath)?;
                    remaining = rest;
                    expected = child;
                }
            }
        }

        // Ran out of nodes before reaching the leaf.
        Err(TrieError::WrongPath)
    }
}
