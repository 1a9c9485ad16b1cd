//! Trie error taxonomy.

use thiserror::Error;

use crate::kv::KvError;

/// Errors surfaced by trie operations.
#[derive(Error, Debug)]
pub enum TrieError {
    /// Key absent, root not resolvable, or iterator prefix diverges.
    #[error("key not found")]
    NotFound,
    /// The caller's key ends inside a stored path.
    #[error("key too short for stored path")]
    KeyTooShort,
    /// The caller's key extends past a stored leaf path.
    #[error("key too long for stored path")]
    KeyTooLong,
    /// A persisted node has an invalid shape or tag.
    #[error("unknown node type")]
    UnknownNodeType,
    /// A persisted node image could not be decoded.
    #[error("malformed node encoding")]
    Codec,
    /// A proof step does not hash to the expected value.
    #[error("proof node hash mismatch")]
    WrongHash,
    /// A proof step's path nibbles do not match the key route.
    #[error("proof path mismatch")]
    WrongPath,
    /// `clone` was called while a batch is open.
    #[error("cannot clone while a batch is open")]
    CloneInBatch,
    /// `begin_batch` was called while a batch is already open.
    #[error("a batch is already open")]
    AlreadyBatching,
    /// More than four domain segments were supplied.
    #[error("too many domains: {0} (max 4)")]
    TooManyDomains(usize),
    /// The underlying key/value store failed.
    #[error("kv store error: {0}")]
    Kv(#[from] KvError),
}
