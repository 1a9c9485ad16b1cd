//! Integration tests for patricia_db.

use std::sync::Arc;

use patricia_db::data::bytes_to_nibbles;
use patricia_db::keys::{hash_domains, hash_domains_prefix};
use patricia_db::{BatchTrie, KVStore, MemoryKv, MerkleProof, Node, Trie, TrieError, HASH_SIZE};

const KEY_1: [u8; 5] = [0x1F, 0x34, 0x56, 0x78, 0xE9];
const KEY_2: [u8; 5] = [0x1F, 0x35, 0x56, 0x78, 0xE9];
const KEY_3: [u8; 5] = [0x1F, 0x55, 0x56, 0x78, 0xE9];

fn node_at(kv: &Arc<MemoryKv>, hash: [u8; HASH_SIZE]) -> Node {
    let bytes = kv.get(&hash).unwrap().expect("node missing");
    Node::decode(&bytes).unwrap()
}

#[test]
fn test_single_leaf_root() {
    let kv = Arc::new(MemoryKv::new());
    let mut trie = Trie::new(kv.clone());
    let root = trie.put(&KEY_1, b"leaf 1").unwrap();

    // The root is exactly the hash of a leaf holding the full route.
    let expected = Node::leaf(bytes_to_nibbles(&KEY_1), b"leaf 1".to_vec());
    assert_eq!(root, expected.hash());
    assert_eq!(node_at(&kv, root), expected);
}

#[test]
fn test_extension_and_branch_split() {
    let kv = Arc::new(MemoryKv::new());
    let mut trie = Trie::new(kv.clone());
    trie.put(&KEY_1, b"leaf 1").unwrap();
    let root = trie.put(&KEY_2, b"leaf 2").unwrap();

    // Root compresses the three shared nibbles into an extension.
    let Node::Extension { path, child } = node_at(&kv, root) else {
        panic!("root is not an extension");
    };
    assert_eq!(path, vec![0x1, 0xF, 0x3]);

    // Below it, a branch diverges on nibbles 4 and 5.
    let Node::Branch { children } = node_at(&kv, child) else {
        panic!("extension child is not a branch");
    };
    let occupied: Vec<usize> = (0..16).filter(|&i| children[i].is_some()).collect();
    assert_eq!(occupied, vec![4, 5]);

    let tail = vec![0x5, 0x6, 0x7, 0x8, 0xE, 0x9];
    assert_eq!(
        node_at(&kv, children[4].unwrap()),
        Node::leaf(tail.clone(), b"leaf 1".to_vec())
    );
    assert_eq!(
        node_at(&kv, children[5].unwrap()),
        Node::leaf(tail, b"leaf 2".to_vec())
    );
}

#[test]
fn test_second_split_with_empty_value() {
    let kv = Arc::new(MemoryKv::new());
    let mut trie = Trie::new(kv.clone());
    trie.put(&KEY_1, b"leaf 1").unwrap();
    let root_2 = trie.put(&KEY_2, b"leaf 2").unwrap();
    let Node::Extension { child: branch_2, .. } = node_at(&kv, root_2) else {
        panic!("step-2 root is not an extension");
    };

    let root = trie.put(&KEY_3, b"").unwrap();

    // The extension shortens to two nibbles over a fresh branch whose
    // slot 3 keeps the old branch and slot 5 holds the new leaf.
    let Node::Extension { path, child } = node_at(&kv, root) else {
        panic!("root is not an extension");
    };
    assert_eq!(path, vec![0x1, 0xF]);

    let Node::Branch { children } = node_at(&kv, child) else {
        panic!("extension child is not a branch");
    };
    assert_eq!(children[3], Some(branch_2));
    assert_eq!(
        node_at(&kv, children[5].unwrap()),
        Node::leaf(vec![0x5, 0x5, 0x6, 0x7, 0x8, 0xE, 0x9], Vec::new())
    );

    // The empty value reads back as present-and-empty.
    assert_eq!(trie.get(&KEY_3).unwrap(), Vec::<u8>::new());
}

#[test]
fn test_batch_rollback_restores_state() {
    let mut trie = BatchTrie::new(Arc::new(MemoryKv::new()));
    trie.put(&KEY_1, b"leaf 1").unwrap();
    trie.put(&KEY_2, b"leaf 2").unwrap();
    let before = trie.root_hash();

    trie.begin_batch().unwrap();
    trie.put(&KEY_1, b"leaf 11").unwrap();
    trie.delete(&KEY_1).unwrap();
    trie.delete(&KEY_2).unwrap();
    trie.rollback().unwrap();

    assert_eq!(trie.root_hash(), before);
    assert_eq!(trie.get(&KEY_1).unwrap(), b"leaf 1");
    assert_eq!(trie.get(&KEY_2).unwrap(), b"leaf 2");
}

#[test]
fn test_iterator_over_domain_prefix() {
    let mut trie = Trie::new(Arc::new(MemoryKv::new()));
    trie.put(&hash_domains(&["a", "b", "c", "d"]).unwrap(), b"v1")
        .unwrap();
    trie.put(&hash_domains(&["a", "b", "c", "e"]).unwrap(), b"v2")
        .unwrap();
    trie.put(&hash_domains(&["a", "b", "d"]).unwrap(), b"v3")
        .unwrap();

    let prefix = hash_domains_prefix(&["a", "b", "c"]).unwrap();
    let entries: Vec<(Vec<u8>, Vec<u8>)> = trie
        .iterator(&prefix)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let values: Vec<&[u8]> = entries.iter().map(|(_, v)| v.as_slice()).collect();
    assert_eq!(entries.len(), 2);
    assert!(values.contains(&b"v1".as_slice()));
    assert!(values.contains(&b"v2".as_slice()));

    // Ascending nibble-route order.
    let routes: Vec<Vec<u8>> = entries.iter().map(|(k, _)| bytes_to_nibbles(k)).collect();
    assert!(routes[0] < routes[1]);
}

#[test]
fn test_proof_tampering_detected() {
    let mut trie = Trie::new(Arc::new(MemoryKv::new()));
    trie.put(&KEY_1, b"leaf 1").unwrap();
    trie.put(&KEY_2, b"leaf 2").unwrap();
    let root = trie.root_hash().unwrap();

    let proof = trie.prove(&KEY_1).unwrap();
    proof.verify(&root).unwrap();

    // Flip one byte anywhere in any node: verification must fail.
    for node_index in 0..proof.nodes().len() {
        for (field_index, field) in proof.nodes()[node_index].iter().enumerate() {
            for byte_index in 0..field.len() {
                let mut nodes = proof.nodes().to_vec();
                nodes[node_index][field_index][byte_index] ^= 0x01;
                let tampered = MerkleProof::new(proof.key().to_vec(), nodes);
                assert!(matches!(tampered.verify(&root), Err(TrieError::WrongHash)));
            }
        }
    }
}

#[test]
fn test_historical_roots_stay_live() {
    let kv = Arc::new(MemoryKv::new());
    let mut trie = Trie::new(kv.clone());

    let mut roots = Vec::new();
    for i in 0..8u8 {
        trie.put(&[0x10 + i, 0x20, 0x30, 0x40], format!("v{i}").as_bytes())
            .unwrap();
        roots.push(trie.root_hash().unwrap());
    }

    // Every intermediate root still resolves to its own version.
    for (i, root) in roots.iter().enumerate() {
        let old = Trie::with_root(kv.clone(), *root).unwrap();
        assert_eq!(
            old.get(&[0x10 + i as u8, 0x20, 0x30, 0x40]).unwrap(),
            format!("v{i}").as_bytes()
        );
        if i + 1 < roots.len() {
            let not_yet_inserted = [0x10 + i as u8 + 1, 0x20, 0x30, 0x40];
            assert!(matches!(
                old.get(&not_yet_inserted),
                Err(TrieError::NotFound)
            ));
        }
    }
}

#[test]
fn test_domain_namespaces_isolate() {
    let mut trie = Trie::new(Arc::new(MemoryKv::new()));

    // Two namespaces sharing a first segment.
    for (who, stake) in [("alice", "100"), ("bob", "250")] {
        trie.put(
            &hash_domains(&["dpos", "votes", who]).unwrap(),
            stake.as_bytes(),
        )
        .unwrap();
    }
    trie.put(
        &hash_domains(&["dpos", "delegates", "carol"]).unwrap(),
        b"yes",
    )
    .unwrap();

    let votes: Vec<_> = trie
        .iterator(&hash_domains_prefix(&["dpos", "votes"]).unwrap())
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(votes.len(), 2);

    let delegates: Vec<_> = trie
        .iterator(&hash_domains_prefix(&["dpos", "delegates"]).unwrap())
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(delegates.len(), 1);
}

#[test]
fn test_replay_across_storages() {
    let mut source = BatchTrie::new(Arc::new(MemoryKv::new()));
    source.begin_batch().unwrap();
    source.put(&KEY_1, b"leaf 1").unwrap();
    source.put(&KEY_2, b"leaf 2").unwrap();

    let mut target = BatchTrie::new(Arc::new(MemoryKv::new()));
    target.replay(&source).unwrap();

    assert_eq!(target.root_hash(), source.root_hash());
    assert_eq!(target.get(&KEY_2).unwrap(), b"leaf 2");
}
