#![no_main]

use std::collections::HashMap;
use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use patricia_db::{MemoryKv, Trie, TrieError};

#[derive(Arbitrary, Debug)]
struct TrieInput {
    operations: Vec<TrieOp>,
}

#[derive(Arbitrary, Debug)]
enum TrieOp {
    Put { key: [u8; 4], value: Vec<u8> },
    Get { key: [u8; 4] },
    Delete { key: [u8; 4] },
    Iterate,
}

fuzz_target!(|input: TrieInput| {
    // Limit operations
    if input.operations.len() > 200 {
        return;
    }

    let mut trie = Trie::new(Arc::new(MemoryKv::new()));
    let mut expected: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

    for op in input.operations {
        match op {
            TrieOp::Put { key, value } => {
                if value.len() > 256 {
                    continue;
                }
                trie.put(&key, &value).unwrap();
                expected.insert(key.to_vec(), value);
            }
            TrieOp::Get { key } => match expected.get(key.as_slice()) {
                Some(value) => assert_eq!(&trie.get(&key).unwrap(), value),
                None => assert!(matches!(trie.get(&key), Err(TrieError::NotFound))),
            },
            TrieOp::Delete { key } => {
                let result = trie.delete(&key);
                match expected.remove(key.as_slice()) {
                    Some(_) => {
                        result.unwrap();
                        assert!(matches!(trie.get(&key), Err(TrieError::NotFound)));
                    }
                    None => assert!(matches!(result, Err(TrieError::NotFound))),
                }
            }
            TrieOp::Iterate => {
                let count = trie
                    .iterator(&[])
                    .unwrap()
                    .map(|entry| entry.unwrap())
                    .count();
                assert_eq!(count, expected.len());
            }
        }
    }

    // Final consistency: every surviving key reads back, and the root
    // matches a trie built fresh from the surviving set.
    for (key, value) in &expected {
        assert_eq!(&trie.get(key).unwrap(), value);
    }

    let mut fresh = Trie::new(Arc::new(MemoryKv::new()));
    for (key, value) in &expected {
        fresh.put(key, value).unwrap();
    }
    assert_eq!(trie.root_hash(), fresh.root_hash());
});
