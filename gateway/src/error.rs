//! Error taxonomy of the gateway core.
//!
//! Every failure surfaces as a typed [`GatewayError`]; nothing is retried
//! inside the core. Lower layers keep their own enums (`KeyError`,
//! `LedgerError`, `ScriptError`, `ClvmError`) and are wrapped transparently.

use thiserror::Error;

use crate::chain::{Bytes32, ClvmError};
use crate::crypto::KeyError;
use crate::ledger::{LedgerError, WalletType};
use crate::scripts::ScriptError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Coin selection returned nothing for the requested amount.
    #[error("insufficient balance: cannot select coins for {amount} mojos")]
    InsufficientBalance { amount: u64 },

    /// The targeted wallet is not of the kind the operation spends from.
    #[error("wallet {wallet_id} is a {found:?} wallet, expected {expected:?}")]
    WrongWalletType {
        wallet_id: u32,
        expected: WalletType,
        found: WalletType,
    },

    /// The wallet or service plays the wrong side of the protocol.
    #[error("`{operation}` is not available to the {role} role")]
    WrongRole {
        operation: &'static str,
        role: String,
    },

    /// A required (public key, message) pair could not be signed.
    #[error("missing authorization for public key {public_key}")]
    MissingAuthorization { public_key: String },

    /// A handshake artifact failed to decode or carries nothing to sign.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    /// The caller-supplied asset id differs from the one the token derives.
    #[error("asset id mismatch: expected {expected}, token derives {computed}")]
    AssetIdMismatch { expected: Bytes32, computed: Bytes32 },

    /// Gateway metadata carried a key outside the whitelist.
    #[error("unknown metadata key `{0}`")]
    UnknownMetadataKey(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A beneficiary puzzle hash supplied as text was not 32 bytes of hex.
    #[error("invalid beneficiary puzzle hash: {0}")]
    InvalidBeneficiaryAddress(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Clvm(#[from] ClvmError),

    /// Streamable encoding of a ledger type failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] chia::traits::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
