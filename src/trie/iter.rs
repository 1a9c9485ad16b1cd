//! Prefix-anchored depth-first iteration over trie leaves.

use crate::data::{bytes_to_nibbles, common_prefix_len, nibbles_to_bytes};

use super::codec::HASH_SIZE;
use super::error::TrieError;
use super::node::{next_child, Node};
use super::trie::Trie;

/// A suspended branch visit: the children still to explore, the next slot
/// to look at, and the key nibbles accumulated above the branch.
struct Frame {
    children: Box<[Option<[u8; HASH_SIZE]>; 16]>,
    next: usize,
    prefix: Vec<u8>,
}

/// Single-pass iterator over every leaf whose key route starts with a
/// given prefix.
///
/// Children of a branch are visited in ascending nibble order, so leaves
/// come out in ascending route order; that is the only defined ordering.
/// Re-traversal requires a new iterator.
pub struct TrieIterator<'a> {
    trie: &'a Trie,
    stack: Vec<Frame>,
    /// Subtree the prefix descent anchored at, consumed on first advance.
    start: Option<([u8; HASH_SIZE], Vec<u8>)>,
}

impl<'a> TrieIterator<'a> {
    /// Descends through the trie consuming the prefix route and anchors
    /// at the subtree below it. Fails with `NotFound` if the prefix
    /// diverges from the stored structure.
    pub(crate) fn new(trie: &'a Trie, prefix: &[u8]) -> Result<Self, TrieError> {
        let route = bytes_to_nibbles(prefix);
        let mut remaining: &[u8] = &route;

        let Some(root) = trie.root_hash() else {
            if remaining.is_empty() {
                // Empty trie: nothing to visit, nothing to diverge from.
                return Ok(Self {
                    trie,
                    stack: Vec::new(),
                    start: None,
                });
            }
            return Err(TrieError::NotFound);
        };

        let mut current = root;
        let mut consumed: Vec<u8> = Vec::new();
        loop {
            if remaining.is_empty() {
                break;
            }
            match trie.fetch(current)? {
                Node::Leaf { path, .. } => {
                    // The prefix may land inside the leaf's tail.
                    if path.len() >= remaining.len() && path[..remaining.len()] == *remaining {
                        break;
                    }
                    return Err(TrieError::NotFound);
                }
                Node::Extension { path, child } => {
                    let m = common_prefix_len(&path, remaining);
                    if m == remaining.len() {
                        // Prefix exhausted inside the edge; anchor here.
                        break;
                    }
                    if m < path.len() {
                        return Err(TrieError::NotFound);
                    }
                    consumed.extend_from_slice(&path);
                    remaining = &remaining[m..];
                    current = child;
                }
                Node::Branch { children } => {
                    let nibble = remaining[0];
                    let child = children[nibble as usize].ok_or(TrieError::NotFound)?;
                    consumed.push(nibble);
                    remaining = &remaining[1..];
                    current = child;
                }
            }
        }

        Ok(Self {
            trie,
            stack: Vec::new(),
            start: Some((current, consumed)),
        })
    }

    /// Advances to the next leaf, returning its full (key, value) pair.
    fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>, TrieError> {
        if let Some((hash, prefix)) = self.start.take() {
            return self.descend(hash, prefix);
        }

        while let Some(frame) = self.stack.pop() {
            if let Some((i, child)) = next_child(&frame.children, frame.next) {
                let mut prefix = frame.prefix.clone();
                self.stack.push(Frame {
                    next: i + 1,
                    ..frame
                });
                prefix.push(i as u8);
                return self.descend(child, prefix);
            }
        }
        Ok(None)
    }

    /// Walks down to the leftmost leaf under `hash`, pushing continuation
    /// frames for every branch passed on the way. Extensions are passed
    /// through transparently.
    fn descend(
        &mut self,
        hash: [u8; HASH_SIZE],
        mut prefix: Vec<u8>,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, TrieError> {
        let mut current = hash;
        loop {
            match self.trie.fetch(current)? {
                Node::Leaf { path, value } => {
                    prefix.extend_from_slice(&path);
                    return Ok(Some((nibbles_to_bytes(&prefix), value)));
                }
                Node::Extension { path, child } => {
                    prefix.extend_from_slice(&path);
                    current = child;
                }
                Node::Branch { children } => {
                    let Some((i, child)) = next_child(&children, 0) else {
                        return Ok(None);
                    };
                    self.stack.push(Frame {
                        children,
                        next: i + 1,
                        prefix: prefix.clone(),
                    });
                    prefix.push(i as u8);
                    current = child;
                }
            }
        }
    }
}

impl Iterator for TrieIterator<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>), TrieError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
