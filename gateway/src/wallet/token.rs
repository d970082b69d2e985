//! # Token Identity
//!
//! A token lineage is named by its [`TokenIndex`]: the registry record
//! (organization, project, vintage, sequence) it was issued for. The index
//! hash parameterizes the issuance script, so every index is a distinct
//! asset on chain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chain::Bytes32;
use crate::crypto::{sha256, PublicKey, Signature};
use crate::ledger::WalletType;

// ---------------------------------------------------------------------------
// GatewayMode
// ---------------------------------------------------------------------------

/// The three operations a gateway spend can perform.
///
/// Declaration order is the iteration order used when deriving per-mode
/// keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayMode {
    /// Mint: registry only.
    Tokenization,
    /// Burn, counter-signed by the registry.
    Detokenization,
    /// Burn, authorized up front by the registry's delegation.
    PermissionlessRetirement,
}

impl GatewayMode {
    pub const ALL: [GatewayMode; 3] = [
        Self::Tokenization,
        Self::Detokenization,
        Self::PermissionlessRetirement,
    ];

    /// On-chain tag of the mode. Also the hardened index of the mode key
    /// below the root key.
    pub fn to_int(self) -> u8 {
        match self {
            Self::Tokenization => 1,
            Self::Detokenization => 2,
            Self::PermissionlessRetirement => 3,
        }
    }

    pub fn from_int(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.to_int() == tag)
    }

    pub fn is_mint(self) -> bool {
        matches!(self, Self::Tokenization)
    }

    /// Mints spend from the standard-asset wallet, burns from the tracked
    /// asset wallet.
    pub fn source_wallet_type(self) -> WalletType {
        if self.is_mint() {
            WalletType::StandardWallet
        } else {
            WalletType::Cat
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tokenization => "tokenization",
            Self::Detokenization => "detokenization",
            Self::PermissionlessRetirement => "permissionless_retirement",
        }
    }
}

impl fmt::Display for GatewayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for GatewayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown gateway mode: {s}"))
    }
}

// ---------------------------------------------------------------------------
// TokenIndex
// ---------------------------------------------------------------------------

/// Registry-side identifier of a token lineage. Immutable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenIndex {
    pub org_uid: String,
    pub warehouse_project_id: String,
    pub vintage_year: u32,
    pub sequence_num: u32,
}

impl TokenIndex {
    pub fn new(
        org_uid: impl Into<String>,
        warehouse_project_id: impl Into<String>,
        vintage_year: u32,
        sequence_num: u32,
    ) -> Self {
        Self {
            org_uid: org_uid.into(),
            warehouse_project_id: warehouse_project_id.into(),
            vintage_year,
            sequence_num,
        }
    }

    /// Canonical encoding: strings as `u32` big-endian length + UTF-8,
    /// integers as `u32` big-endian.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.org_uid.len() + self.warehouse_project_id.len());
        for text in [&self.org_uid, &self.warehouse_project_id] {
            buf.extend_from_slice(&(text.len() as u32).to_be_bytes());
            buf.extend_from_slice(text.as_bytes());
        }
        buf.extend_from_slice(&self.vintage_year.to_be_bytes());
        buf.extend_from_slice(&self.sequence_num.to_be_bytes());
        buf
    }

    pub fn index_hash(&self) -> Bytes32 {
        Bytes32::new(sha256(&self.canonical_bytes()))
    }
}

impl fmt::Display for TokenIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}#{}",
            self.org_uid, self.warehouse_project_id, self.vintage_year, self.sequence_num
        )
    }
}

// ---------------------------------------------------------------------------
// TokenOnChain
// ---------------------------------------------------------------------------

/// Public delegation for one mode, as published to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeMetadata {
    /// The delegation message (hash of index hash and delegated script).
    pub mod_hash: Bytes32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

/// Everything a client needs to operate on a token without the registry's
/// secrets. Produced by the registry after tokenization.
///
/// The tokenization entry never carries a signature; the registry signs
/// mints itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOnChain {
    pub index: Bytes32,
    pub public_key: PublicKey,
    pub asset_id: Bytes32,
    pub org_uid: String,
    pub warehouse_project_id: String,
    pub vintage_year: u32,
    pub sequence_num: u32,
    pub tokenization: ModeMetadata,
    pub detokenization: ModeMetadata,
    pub permissionless_retirement: ModeMetadata,
}

impl TokenOnChain {
    pub fn token_index(&self) -> TokenIndex {
        TokenIndex::new(
            self.org_uid.clone(),
            self.warehouse_project_id.clone(),
            self.vintage_year,
            self.sequence_num,
        )
    }

    pub fn mode(&self, mode: GatewayMode) -> &ModeMetadata {
        match mode {
            GatewayMode::Tokenization => &self.tokenization,
            GatewayMode::Detokenization => &self.detokenization,
            GatewayMode::PermissionlessRetirement => &self.permissionless_retirement,
        }
    }
}
