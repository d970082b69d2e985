//! # Ledger Data Types
//!
//! The coin-set model the gateway builds on. Coins, spends, bundles and
//! serialized programs are the ledger's own `chia::protocol` types; this
//! module adds the CLVM helpers around them and the conditions spends
//! emit.

pub mod clvm;
pub mod condition;

pub use chia::protocol::{Bytes, Bytes32, Coin, CoinRecord, CoinSpend, Program, SpendBundle};
pub use chia::traits::Streamable;
pub use clvm::{from_program, nil, parse_bytes32, to_program, tree_hash, tree_hash_list, ClvmError};
pub use condition::Condition;
