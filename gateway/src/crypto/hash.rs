//! # Hashing Utilities
//!
//! SHA-256 is the only hash the ledger speaks: coin ids, script tree hashes
//! and spend-bundle names are all built from it.

use sha2::{Digest, Sha256};

/// SHA-256 of a single buffer.
///
/// # Example
///
/// ```
/// use climate_gateway::crypto::sha256;
///
/// let hash = sha256(b"climate");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    sha256_concat(&[data])
}

/// SHA-256 over the concatenation of several buffers, without building the
/// concatenation in memory.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
