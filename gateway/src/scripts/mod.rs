//! # Spend-Script Provider
//!
//! The core never compiles or runs scripts. It asks a [`ScriptProvider`]
//! for the scripts it needs and for the conditions a spend would emit, and
//! treats the answers as deterministic functions of their inputs.
//!
//! ```text
//! tracked asset (asset_id)
//! └── gateway script                 one per network, shared by all tokens
//!     solution: (issuance script, issuance solution, conditions)
//!                  │
//!                  └── issuance solution: (delegated script, metadata, ..)
//! ```
//!
//! [`reference::ReferenceScripts`] is a structural implementation used by
//! the in-memory ledger and the tests.

pub mod reference;

use thiserror::Error;

use crate::chain::{Bytes32, ClvmError, CoinSpend, Condition, Program};
use crate::crypto::PublicKey;
use crate::wallet::token::GatewayMode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("coin spend is not a gateway spend")]
    NotAGatewaySpend,

    #[error("malformed script or solution: {0}")]
    Malformed(String),

    #[error(transparent)]
    Clvm(#[from] ClvmError),
}

/// Parameters of a gateway spend's solution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewaySpendArgs {
    pub mode: GatewayMode,
    pub issuance_script: Program,
    pub delegated_script: Program,
    /// Key/value list: `((key . value) ...)`.
    pub metadata: Program,
    pub amount: u64,
    /// Mint destination.
    pub to_puzzle_hash: Option<Bytes32>,
    /// Burn source (inner script hash of the coin being burned).
    pub from_puzzle_hash: Option<Bytes32>,
}

/// Builders fail only when a program cannot be encoded.
pub trait ScriptProvider: Send + Sync {
    /// Issuance script ("TAIL") of a token. Its tree hash is the asset id.
    fn issuance_script(
        &self,
        root_public_key: &PublicKey,
        index_hash: &Bytes32,
    ) -> Result<Program, ScriptError>;

    fn gateway_script(&self) -> Result<Program, ScriptError>;

    /// Mode-specific delegated script. Retirement carries no key.
    fn delegated_script(
        &self,
        mode: GatewayMode,
        gateway_script_hash: &Bytes32,
        public_key: Option<&PublicKey>,
    ) -> Result<Program, ScriptError>;

    /// Wrap an inner script in the asset-tracking layer.
    fn tracked_asset_script(
        &self,
        asset_id: &Bytes32,
        inner: &Program,
    ) -> Result<Program, ScriptError>;

    /// Tree hash of [`tracked_asset_script`](Self::tracked_asset_script)
    /// from the inner script hash alone.
    fn tracked_asset_script_hash(&self, asset_id: &Bytes32, inner_hash: &Bytes32) -> Bytes32;

    /// Unwrap the asset-tracking layer: `(asset_id, inner script)`.
    fn match_tracked_asset(&self, script: &Program) -> Option<(Bytes32, Program)>;

    /// Full (outer, tracked-asset level) solution of a gateway coin.
    fn gateway_solution(&self, args: &GatewaySpendArgs) -> Result<Program, ScriptError>;

    /// Recover the mode and the issuance-layer spend (issuance script as
    /// reveal, issuance solution as solution) from a gateway spend.
    fn parse_gateway_spend(
        &self,
        coin_spend: &CoinSpend,
        is_tracked_asset: bool,
    ) -> Result<(GatewayMode, CoinSpend), ScriptError>;

    /// Conditions the spend emits when run.
    fn conditions(&self, coin_spend: &CoinSpend) -> Result<Vec<Condition>, ScriptError>;
}
