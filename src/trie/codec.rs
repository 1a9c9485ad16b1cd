//! Canonical node encoding.
//!
//! A node is carried on disk as an ordered sequence of byte strings. The
//! encoding is a length-prefixed frame: a big-endian u32 field count, then
//! for each field a big-endian u32 length followed by the bytes. Empty
//! fields carry length 0. The frame is byte-identical on every platform,
//! so hashing it yields a stable content address.

use tiny_keccak::{Hasher, Sha3};

use super::error::TrieError;

/// Hash size (SHA3-256).
pub const HASH_SIZE: usize = 32;

/// A node's raw field vector, as persisted.
pub type RawNode = Vec<Vec<u8>>;

/// Computes the SHA3-256 hash of data.
pub fn sha3_256(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha3::v256();
    hasher.update(data);
    let mut hash = [0u8; HASH_SIZE];
    hasher.finalize(&mut hash);
    hash
}

/// Encodes a field vector into its canonical frame.
pub fn encode_fields(fields: &[Vec<u8>]) -> Vec<u8> {
    let body: usize = fields.iter().map(|f| 4 + f.len()).sum();
    let mut out = Vec::with_capacity(4 + body);
    out.extend_from_slice(&(fields.len() as u32).to_be_bytes());
    for field in fields {
        out.extend_from_slice(&(field.len() as u32).to_be_bytes());
        out.extend_from_slice(field);
    }
    out
}

/// Decodes a canonical frame back into its field vector.
///
/// Rejects truncated frames and trailing bytes, so every stored image has
/// exactly one parse.
pub fn decode_fields(bytes: &[u8]) -> Result<RawNode, TrieError> {
    let mut cursor = 0usize;
    let count = read_u32(bytes, &mut cursor)? as usize;
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        let len = read_u32(bytes, &mut cursor)? as usize;
        let end = cursor
            .checked_add(len)
            .filter(|&end| end <= bytes.len())
            .ok_or(TrieError::Codec)?;
        fields.push(bytes[cursor..end].to_vec());
        cursor = end;
    }
    if cursor != bytes.len() {
        return Err(TrieError::Codec);
    }
    Ok(fields)
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32, TrieError> {
    let end = *cursor + 4;
    if end > bytes.len() {
        return Err(TrieError::Codec);
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[*cursor..end]);
    *cursor = end;
    Ok(u32::from_be_bytes(buf))
}
