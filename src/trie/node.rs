//! Merkle trie node types.
//!
//! On disk every node is a uniform field vector; in memory it is viewed
//! through a typed sum. The variant is inferred from shape: 16 fields is a
//! branch, 3 fields is an extension or leaf depending on the tag byte.

use super::codec::{self, RawNode, HASH_SIZE};
use super::error::TrieError;

/// Tag byte identifying an extension node's field vector.
pub const TAG_EXTENSION: u8 = 0x01;
/// Tag byte identifying a leaf node's field vector.
pub const TAG_LEAF: u8 = 0x02;

const BRANCH_WIDTH: usize = 16;

/// A node in the Merkle Patricia Trie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Radix-16 indirection: the child under nibble `i` lives in slot `i`.
    Branch {
        /// Children (16 slots, one per nibble).
        children: Box<[Option<[u8; HASH_SIZE]>; 16]>,
    },

    /// Path-compressed edge carrying a nibble prefix shared by all
    /// descendants.
    Extension {
        /// Shared path prefix (nibbles). Never empty.
        path: Vec<u8>,
        /// Hash of the child node.
        child: [u8; HASH_SIZE],
    },

    /// Terminal node holding the key's remaining nibbles and the value.
    Leaf {
        /// Remaining nibbles of the key route.
        path: Vec<u8>,
        /// The value stored at this leaf. May be empty.
        value: Vec<u8>,
    },
}

impl Node {
    /// Creates an empty branch node.
    pub fn branch() -> Self {
        Node::Branch {
            children: Box::new([None; BRANCH_WIDTH]),
        }
    }

    /// Creates an extension node.
    pub fn extension(path: Vec<u8>, child: [u8; HASH_SIZE]) -> Self {
        Node::Extension { path, child }
    }

    /// Creates a leaf node.
    pub fn leaf(path: Vec<u8>, value: Vec<u8>) -> Self {
        Node::Leaf { path, value }
    }

    /// Classifies a raw field vector into a typed node.
    pub fn from_raw(raw: RawNode) -> Result<Self, TrieError> {
        match raw.len() {
            BRANCH_WIDTH => {
                let mut children = Box::new([None; BRANCH_WIDTH]);
                for (slot, field) in children.iter_mut().zip(raw.iter()) {
                    if field.is_empty() {
                        continue;
                    }
                    let hash: [u8; HASH_SIZE] = field
                        .as_slice()
                        .try_into()
                        .map_err(|_| TrieError::UnknownNodeType)?;
                    *slot = Some(hash);
                }
                Ok(Node::Branch { children })
            }
            3 => {
                let tag = *raw[0].first().ok_or(TrieError::UnknownNodeType)?;
                match tag {
                    TAG_EXTENSION => {
                        let child: [u8; HASH_SIZE] = raw[2]
                            .as_slice()
                            .try_into()
                            .map_err(|_| TrieError::UnknownNodeType)?;
                        Ok(Node::Extension {
                            path: raw[1].clone(),
                            child,
                        })
                    }
                    TAG_LEAF => Ok(Node::Leaf {
                        path: raw[1].clone(),
                        value: raw[2].clone(),
                    }),
                    _ => Err(TrieError::UnknownNodeType),
                }
            }
            _ => Err(TrieError::UnknownNodeType),
        }
    }

    /// Decodes a persisted node image.
    pub fn decode(bytes: &[u8]) -> Result<Self, TrieError> {
        Node::from_raw(codec::decode_fields(bytes)?)
    }

    /// Returns the node's raw field vector.
    pub fn to_raw(&self) -> RawNode {
        match self {
            Node::Branch { children } => children
                .iter()
                .map(|slot| match slot {
                    Some(hash) => hash.to_vec(),
                    None => Vec::new(),
                })
                .collect(),
            Node::Extension { path, child } => {
                vec![vec![TAG_EXTENSION], path.clone(), child.to_vec()]
            }
            Node::Leaf { path, value } => vec![vec![TAG_LEAF], path.clone(), value.clone()],
        }
    }

    /// Encodes the node into its canonical byte image.
    pub fn encode(&self) -> Vec<u8> {
        codec::encode_fields(&self.to_raw())
    }

    /// Computes the node's hash, which doubles as its persistent key.
    pub fn hash(&self) -> [u8; HASH_SIZE] {
        codec::sha3_256(&self.encode())
    }
}

/// Counts a branch's non-empty children.
pub fn child_count(children: &[Option<[u8; HASH_SIZE]>; 16]) -> usize {
    children.iter().filter(|slot| slot.is_some()).count()
}

/// Finds the first non-empty child slot at or after `from`.
pub fn next_child(
    children: &[Option<[u8; HASH_SIZE]>; 16],
    from: usize,
) -> Option<(usize, [u8; HASH_SIZE])> {
    (from..BRANCH_WIDTH).find_map(|i| children[i].map(|hash| (i, hash)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_round_trip() {
        let mut node = Node::branch();
        if let Node::Branch { children } = &mut node {
            children[3] = Some([0x11; HASH_SIZE]);
            children[15] = Some([0x22; HASH_SIZE]);
        }
        let decoded = Node::decode(&node.encode()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_extension_round_trip() {
        let node = Node::extension(vec![1, 0xF, 3], [0xAB; HASH_SIZE]);
        let decoded = Node::decode(&node.encode()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_leaf_round_trip() {
        let node = Node::leaf(vec![4, 5, 6], b"leaf 1".to_vec());
        let decoded = Node::decode(&node.encode()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_leaf_empty_value() {
        let node = Node::leaf(vec![7], Vec::new());
        let decoded = Node::decode(&node.encode()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_bad_shape_rejected() {
        let raw = vec![vec![1u8], vec![2u8]];
        assert!(matches!(
            Node::from_raw(raw),
            Err(TrieError::UnknownNodeType)
        ));
    }

    #[test]
    fn test_bad_tag_rejected() {
        let raw = vec![vec![9u8], vec![1, 2], vec![0xAB; HASH_SIZE]];
        assert!(matches!(
            Node::from_raw(raw),
            Err(TrieError::UnknownNodeType)
        ));
    }

    #[test]
    fn test_branch_bad_hash_width_rejected() {
        let mut raw: RawNode = vec![Vec::new(); 16];
        raw[0] = vec![0xAA; 31];
        assert!(matches!(
            Node::from_raw(raw),
            Err(TrieError::UnknownNodeType)
        ));
    }

    #[test]
    fn test_identical_nodes_share_hash() {
        let a = Node::leaf(vec![1, 2], b"v".to_vec());
        let b = Node::leaf(vec![1, 2], b"v".to_vec());
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_child_helpers() {
        let mut node = Node::branch();
        if let Node::Branch { children } = &mut node {
            children[4] = Some([0u8; HASH_SIZE]);
            children[9] = Some([1u8; HASH_SIZE]);
            assert_eq!(child_count(children), 2);
            assert_eq!(next_child(children, 0), Some((4, [0u8; HASH_SIZE])));
            assert_eq!(next_child(children, 5), Some((9, [1u8; HASH_SIZE])));
            assert_eq!(next_child(children, 10), None);
        }
    }
}
