//! The Merkle Patricia Trie core.
//!
//! This module implements node encoding and hashing, the trie engine
//! (insert/get/delete with path splitting and collapse), prefix
//! iteration, Merkle inclusion proofs, the batched change-log wrapper,
//! and the node fetcher used to pull missing nodes from a peer.

mod batch;
mod codec;
mod error;
mod iter;
mod node;
mod proof;
mod sync;
#[allow(clippy::module_inception)]
mod trie;


pub use batch::{Action, BatchTrie, Entry};
pub use codec::{decode_fields, encode_fields, sha3_256, RawNode, HASH_SIZE};
pub use error::TrieError;
pub use iter::TrieIterator;
pub use node::{Node, TAG_EXTENSION, TAG_LEAF};
pub use proof::MerkleProof;
pub use sync::{NodeFetcher, NodeSource};
pub use trie::Trie;
