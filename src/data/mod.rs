//! Core data structures for trie navigation.

mod nibbles;

pub use nibbles::{bytes_to_nibbles, common_prefix_len, nibbles_to_bytes};
