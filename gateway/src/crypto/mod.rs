//! # Cryptographic Primitives
//!
//! BLS12-381 keys and signatures (augmented scheme) plus the SHA-256
//! helpers everything else hashes with. Everything here wraps the ledger's
//! own audited implementation.

pub mod hash;
pub mod keys;

pub use hash::{sha256, sha256_concat};
pub use keys::{KeyError, PublicKey, SecretKey, Signature};
