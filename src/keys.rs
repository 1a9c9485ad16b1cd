//! Fixed-width domain keys.
//!
//! Higher layers keep structured namespaces in the trie (account state,
//! vote and delegate sets, transaction/event indices) addressed by up to
//! four variable-length path segments. Each segment is reduced to the
//! first 6 bytes of its SHA3-256 hash and packed at a fixed offset, so a
//! shorter segment list always produces a route-prefix of a longer one
//! and prefix iteration walks a whole namespace.

use crate::trie::{sha3_256, TrieError};

/// Bytes each segment contributes to a domain key.
pub const DOMAIN_SEGMENT_LEN: usize = 6;
/// Maximum number of segments in a domain key.
pub const MAX_DOMAINS: usize = 4;
/// Total width of a packed domain key.
pub const DOMAIN_KEY_LEN: usize = DOMAIN_SEGMENT_LEN * MAX_DOMAINS;

/// Packs up to four segments into a fixed 24-byte key, zero-filled past
/// the last segment. Fails with `TooManyDomains` for more than four.
pub fn hash_domains<S: AsRef<[u8]>>(domains: &[S]) -> Result<[u8; DOMAIN_KEY_LEN], TrieError> {
    if domains.len() > MAX_DOMAINS {
        return Err(TrieError::TooManyDomains(domains.len()));
    }
    let mut key = [0u8; DOMAIN_KEY_LEN];
    for (i, domain) in domains.iter().enumerate() {
        let digest = sha3_256(domain.as_ref());
        key[i * DOMAIN_SEGMENT_LEN..(i + 1) * DOMAIN_SEGMENT_LEN]
            .copy_from_slice(&digest[..DOMAIN_SEGMENT_LEN]);
    }
    Ok(key)
}

/// Packs the segments without the zero tail, yielding a 6n-byte prefix
/// for seeding a trie iterator over the namespace.
pub fn hash_domains_prefix<S: AsRef<[u8]>>(domains: &[S]) -> Result<Vec<u8>, TrieError> {
    if domains.len() > MAX_DOMAINS {
        return Err(TrieError::TooManyDomains(domains.len()));
    }
    let mut prefix = Vec::with_capacity(domains.len() * DOMAIN_SEGMENT_LEN);
    for domain in domains {
        let digest = sha3_256(domain.as_ref());
        prefix.extend_from_slice(&digest[..DOMAIN_SEGMENT_LEN]);
    }
    Ok(prefix)
}
