//! # BLS Key Management
//!
//! Thin, type-safe wrappers around the ledger's BLS12-381 implementation
//! (augmented scheme). Public keys live in G1 (48 bytes), signatures in G2
//! (96 bytes). Signatures aggregate: the aggregate of many signatures over
//! distinct (public key, message) pairs verifies against the whole set at
//! once, and the identity element is the aggregate of nothing.
//!
//! ## Security considerations
//!
//! - `SecretKey` does not implement `Serialize`. Exporting a key is an
//!   explicit `to_bytes()` call.
//! - `Debug` output of a secret key shows only its public key.
//! - Nothing in this module logs.

use std::fmt;
use std::hash::{Hash, Hasher};

use chia::bls;
use chia::clvm_traits::{ClvmDecoder, ClvmEncoder, FromClvm, FromClvmError, ToClvm, ToClvmError};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::encoding::{decode_hex, deserialize_array, serialize_bytes};

pub const SECRET_KEY_LENGTH: usize = 32;
pub const PUBLIC_KEY_LENGTH: usize = 48;
pub const SIGNATURE_LENGTH: usize = 96;

/// Errors that can occur while parsing key material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a G1 point")]
    InvalidPublicKey,

    #[error("invalid signature bytes: not a G2 point")]
    InvalidSignature,

    #[error("invalid hex encoding")]
    InvalidHex,
}

// ---------------------------------------------------------------------------
// SecretKey
// ---------------------------------------------------------------------------

/// A BLS secret key.
///
/// # Examples
///
/// ```
/// use climate_gateway::crypto::SecretKey;
///
/// let sk = SecretKey::from_seed(&[7u8; 32]);
/// let sig = sk.sign(b"retire 10 tonnes");
/// assert!(sk.public_key().verify(b"retire 10 tonnes", &sig));
/// ```
#[derive(Clone)]
pub struct SecretKey {
    inner: bls::SecretKey,
}

impl SecretKey {
    /// Generate a fresh key from OS randomness.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    /// Key generation per EIP-2333 from a 32-byte seed. Deterministic.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            inner: bls::SecretKey::from_seed(seed),
        }
    }

    pub fn from_bytes(bytes: &[u8; SECRET_KEY_LENGTH]) -> Result<Self, KeyError> {
        bls::SecretKey::from_bytes(bytes)
            .map(|inner| Self { inner })
            .map_err(|_| KeyError::InvalidSecretKey)
    }

    /// Parse a hex-encoded secret key (`0x` prefix allowed).
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = decode_hex(hex_str).map_err(|_| KeyError::InvalidHex)?;
        let arr: [u8; SECRET_KEY_LENGTH] =
            bytes.as_slice().try_into().map_err(|_| KeyError::InvalidSecretKey)?;
        Self::from_bytes(&arr)
    }

    /// Export the raw scalar. Handle with care.
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.inner.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.inner.public_key(),
        }
    }

    /// One hardened derivation step (EIP-2333 child key).
    pub fn derive_hardened(&self, index: u32) -> Self {
        Self {
            inner: self.inner.derive_hardened(index),
        }
    }

    /// Walk a hardened derivation path.
    pub fn derive_path(&self, path: &[u32]) -> Self {
        path.iter()
            .fold(self.clone(), |key, index| key.derive_hardened(*index))
    }

    /// Sign under the augmented scheme (the public key is prepended to the
    /// message before hashing to the curve).
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature {
            inner: bls::sign(&self.inner, message),
        }
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(pub={})", self.public_key().to_hex())
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for SecretKey {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// A BLS public key (compressed G1 point).
#[derive(Clone)]
pub struct PublicKey {
    inner: bls::PublicKey,
}

impl PublicKey {
    /// Parse and validate a compressed G1 point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; PUBLIC_KEY_LENGTH] =
            bytes.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        bls::PublicKey::from_bytes(&arr)
            .map(|inner| Self { inner })
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = decode_hex(hex_str).map_err(|_| KeyError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.inner.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        bls::verify(&signature.inner, &self.inner, message)
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_bytes(&self.to_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: [u8; PUBLIC_KEY_LENGTH] = deserialize_array(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Encoded in scripts as its 48-byte atom.
impl<N, E: ClvmEncoder<Node = N>> ToClvm<E> for PublicKey {
    fn to_clvm(&self, encoder: &mut E) -> Result<N, ToClvmError> {
        self.inner.to_clvm(encoder)
    }
}

impl<N, D: ClvmDecoder<Node = N>> FromClvm<D> for PublicKey {
    fn from_clvm(decoder: &D, node: N) -> Result<Self, FromClvmError> {
        bls::PublicKey::from_clvm(decoder, node).map(|inner| Self { inner })
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A BLS signature (compressed G2 point), possibly an aggregate.
#[derive(Clone, Default)]
pub struct Signature {
    inner: bls::Signature,
}

impl Signature {
    /// The identity element: aggregate of zero signatures.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        self.inner == bls::Signature::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; SIGNATURE_LENGTH] =
            bytes.try_into().map_err(|_| KeyError::InvalidSignature)?;
        bls::Signature::from_bytes(&arr)
            .map(|inner| Self { inner })
            .map_err(|_| KeyError::InvalidSignature)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = decode_hex(hex_str).map_err(|_| KeyError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        self.inner.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Point addition over all inputs. Order does not matter.
    pub fn aggregate<'a, I>(signatures: I) -> Self
    where
        I: IntoIterator<Item = &'a Signature>,
    {
        Self {
            inner: bls::aggregate(signatures.into_iter().map(|s| &s.inner)),
        }
    }

    /// Verify this aggregate against the exact set of (public key, message)
    /// pairs it claims to cover. An empty set verifies only the identity.
    pub fn aggregate_verify(&self, pairs: &[(PublicKey, Vec<u8>)]) -> bool {
        if pairs.is_empty() {
            return self.is_identity();
        }
        bls::aggregate_verify(
            &self.inner,
            pairs.iter().map(|(pk, msg)| (&pk.inner, msg.as_slice())),
        )
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for Signature {}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            write!(f, "Signature(identity)")
        } else {
            write!(f, "Signature({}..)", &self.to_hex()[..16])
        }
    }
}

impl From<bls::Signature> for Signature {
    fn from(inner: bls::Signature) -> Self {
        Self { inner }
    }
}

/// Spend bundles carry the ledger's own signature type.
impl From<Signature> for bls::Signature {
    fn from(signature: Signature) -> Self {
        signature.inner
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_bytes(&self.to_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: [u8; SIGNATURE_LENGTH] = deserialize_array(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
