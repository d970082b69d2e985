//! Building and inspecting serialized programs.
//!
//! A [`Program`] is the serialized form of a CLVM tree. Construction and
//! destructuring go through a scratch [`Allocator`] with the typed
//! `ToClvm`/`FromClvm` conversions, so the rest of the crate never walks
//! raw nodes.

use chia::clvm_traits::{FromClvm, FromClvmError, ToClvm, ToClvmError};
use chia::clvm_utils::{tree_hash_atom, tree_hash_from_bytes, tree_hash_pair, TreeHash};
use chia::protocol::{Bytes32, Program};
use clvmr::Allocator;
use thiserror::Error;

use crate::encoding::decode_hex;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClvmError {
    #[error("cannot encode program: {0}")]
    Encode(#[from] ToClvmError),

    #[error("cannot decode program: {0}")]
    Decode(#[from] FromClvmError),

    #[error("invalid serialized program: {0}")]
    Serialization(String),
}

/// Serialize any CLVM-encodable value.
pub fn to_program<T: ToClvm<Allocator>>(value: &T) -> Result<Program, ClvmError> {
    let mut allocator = Allocator::new();
    let node = value.to_clvm(&mut allocator)?;
    Ok(Program::from_clvm(&allocator, node)?)
}

/// Deserialize a program into a typed shape.
pub fn from_program<T: FromClvm<Allocator>>(program: &Program) -> Result<T, ClvmError> {
    let mut allocator = Allocator::new();
    let node = program.to_clvm(&mut allocator)?;
    Ok(T::from_clvm(&allocator, node)?)
}

/// The nil program `()`.
pub fn nil() -> Program {
    Program::default()
}

pub fn tree_hash(program: &Program) -> Result<Bytes32, ClvmError> {
    tree_hash_from_bytes(program.as_slice())
        .map(Bytes32::from)
        .map_err(|err| ClvmError::Serialization(err.to_string()))
}

/// Hash of a proper list whose items are already hashed. Lets a wrapper's
/// hash be computed from its inner script's hash alone.
pub fn tree_hash_list(items: &[TreeHash]) -> TreeHash {
    items
        .iter()
        .rev()
        .fold(tree_hash_atom(&[]), |rest, item| tree_hash_pair(*item, rest))
}

/// Parse a 32-byte hash from hex (`0x` prefix allowed).
pub fn parse_bytes32(text: &str) -> Option<Bytes32> {
    let bytes = decode_hex(text).ok()?;
    Bytes32::try_from(bytes).ok()
}
