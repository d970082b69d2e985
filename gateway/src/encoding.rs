//! Serde helpers for fixed-width binary values.
//!
//! Human-readable formats (JSON) get lowercase hex, optionally `0x`
//! prefixed on input. Binary formats get the raw bytes.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

pub(crate) fn serialize_bytes<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() {
        serializer.serialize_str(&hex::encode(bytes))
    } else {
        serializer.serialize_bytes(bytes)
    }
}

pub(crate) fn deserialize_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    if deserializer.is_human_readable() {
        let text = String::deserialize(deserializer)?;
        decode_hex(&text).map_err(D::Error::custom)
    } else {
        Vec::<u8>::deserialize(deserializer)
    }
}

/// Hex decode, tolerating a leading `0x`.
pub(crate) fn decode_hex(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(text.strip_prefix("0x").unwrap_or(text))
}

/// Deserialize into a fixed-size array, reporting the length mismatch.
pub(crate) fn deserialize_array<'de, D: Deserializer<'de>, const N: usize>(
    deserializer: D,
) -> Result<[u8; N], D::Error> {
    let bytes = deserialize_bytes(deserializer)?;
    <[u8; N]>::try_from(bytes.as_slice())
        .map_err(|_| D::Error::custom(format!("expected {N} bytes, got {}", bytes.len())))
}
