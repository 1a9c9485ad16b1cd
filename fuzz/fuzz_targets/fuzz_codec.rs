#![no_main]

use libfuzzer_sys::fuzz_target;
use patricia_db::trie::{decode_fields, encode_fields};

fuzz_target!(|data: &[u8]| {
    // Limit input size
    if data.len() > 4096 {
        return;
    }

    // Decoding arbitrary bytes must never panic; a successful decode must
    // re-encode to the identical image (one parse per stored image).
    if let Ok(fields) = decode_fields(data) {
        let reencoded = encode_fields(&fields);
        assert_eq!(reencoded, data);

        let redecoded = decode_fields(&reencoded).expect("re-decode failed");
        assert_eq!(redecoded, fields);
    }
});
