//! # Gateway Configuration & Constants
//!
//! Every protocol-level constant the gateway relies on lives here, together
//! with the two pieces of runtime configuration that get passed around
//! explicitly: the network constants fetched from the ledger client and the
//! execution mode of the running service.
//!
//! Nothing in this module is global mutable state. Wallets receive a copy
//! of [`NetworkConstants`] at construction and the service layer receives a
//! [`GatewayConfig`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chain::Bytes32;
use crate::crypto::sha256;
use crate::error::{GatewayError, Result};

// ---------------------------------------------------------------------------
// Handshake Artifact
// ---------------------------------------------------------------------------

/// Human-readable prefix of a detokenization request file.
pub const DETOKENIZATION_HRP: &str = "detok";

/// Upper bound on the decoded size of a handshake artifact. A client request
/// carries a handful of coin spends; anything past this is rejected before
/// deserialization allocates.
pub const MAX_ARTIFACT_BYTES: u64 = 1 << 20;

// ---------------------------------------------------------------------------
// Transaction Types
// ---------------------------------------------------------------------------

/// Offset added to a gateway mode tag to form the transaction-record type of
/// a gateway transaction. Chosen well above the ledger's own record types.
pub const CLIMATE_WALLET_INDEX: u32 = 256;

/// Record type the ledger uses for an ordinary outgoing transaction.
pub const OUTGOING_TX: u32 = 1;

// ---------------------------------------------------------------------------
// Key Derivation
// ---------------------------------------------------------------------------

/// Purpose index of the BLS key tree (EIP-2333).
pub const BLS_SPEC_NUMBER: u32 = 12381;

/// Coin type of the ledger.
pub const LEDGER_COIN_TYPE: u32 = 8444;

/// Hardened index of the climate root key below the coin type.
pub const CLIMATE_KEY_INDEX: u32 = 12;

/// Index of the ordinary spending keys below the coin type.
pub const WALLET_KEY_INDEX: u32 = 2;

/// Full hardened path from a master key to the climate root key.
pub const CLIMATE_ROOT_PATH: [u32; 3] = [BLS_SPEC_NUMBER, LEDGER_COIN_TYPE, CLIMATE_KEY_INDEX];

/// Hardened path from a master key to the first ordinary spending key.
pub const WALLET_KEY_PATH: [u32; 4] = [BLS_SPEC_NUMBER, LEDGER_COIN_TYPE, WALLET_KEY_INDEX, 0];

// ---------------------------------------------------------------------------
// Retirement Metadata
// ---------------------------------------------------------------------------

/// Beneficiary name (UTF-8 text).
pub const METADATA_BENEFICIARY_NAME: &str = "bn";

/// Beneficiary address (UTF-8 text).
pub const METADATA_BENEFICIARY_ADDRESS: &str = "ba";

/// Beneficiary puzzle hash (raw bytes, rendered `0x` hex).
pub const METADATA_BENEFICIARY_PUZZLE_HASH: &str = "bp";

/// The only keys a gateway spend may carry in its metadata.
pub const METADATA_KEYS: [&str; 3] = [
    METADATA_BENEFICIARY_NAME,
    METADATA_BENEFICIARY_ADDRESS,
    METADATA_BENEFICIARY_PUZZLE_HASH,
];

// ---------------------------------------------------------------------------
// Wallets
// ---------------------------------------------------------------------------

/// Wallet id of the standard-asset wallet on the ledger.
pub const DEFAULT_WALLET_ID: u32 = 1;

/// Destination of the zero-net transfer a client builds to reveal the
/// spend script of the coin it is about to burn. The transfer is never
/// submitted.
pub const REVEAL_PUZZLE_HASH: Bytes32 = Bytes32::new([b'0'; 32]);

// ---------------------------------------------------------------------------
// Network Constants
// ---------------------------------------------------------------------------

const MAINNET_GENESIS_CHALLENGE: [u8; 32] = [
    0xcc, 0xd5, 0xbb, 0x71, 0x18, 0x35, 0x32, 0xbf, 0xf2, 0x20, 0xba, 0x46, 0xc2, 0x68, 0x99, 0x1a,
    0x3f, 0xf0, 0x7e, 0xb3, 0x58, 0xe8, 0x25, 0x5a, 0x65, 0xc3, 0x0a, 0x2d, 0xce, 0x0e, 0x5f, 0xbb,
];

const TESTNET11_GENESIS_CHALLENGE: [u8; 32] = [
    0x37, 0xa9, 0x0e, 0xb5, 0x18, 0x5a, 0x9c, 0x44, 0x39, 0xa9, 0x1d, 0xdc, 0x98, 0xbb, 0xad, 0xce,
    0x7b, 0x4f, 0xeb, 0xa0, 0x60, 0xd5, 0x01, 0x16, 0xa0, 0x67, 0xde, 0x66, 0xbf, 0x23, 0x66, 0x15,
];

/// Per-network parameters the core needs when signing.
///
/// `agg_sig_me_additional_data` is the domain-separation tag appended to
/// every coin-bound signature message, so a signature made for one network
/// can never be replayed on another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConstants {
    pub network_name: String,
    pub agg_sig_me_additional_data: Bytes32,
}

impl NetworkConstants {
    pub fn new(network_name: impl Into<String>, agg_sig_me_additional_data: Bytes32) -> Self {
        Self {
            network_name: network_name.into(),
            agg_sig_me_additional_data,
        }
    }

    pub fn mainnet() -> Self {
        Self::new("mainnet", Bytes32::new(MAINNET_GENESIS_CHALLENGE))
    }

    pub fn testnet11() -> Self {
        Self::new("testnet11", Bytes32::new(TESTNET11_GENESIS_CHALLENGE))
    }

    /// Local network of the in-memory ledger.
    pub fn simulator() -> Self {
        Self::new("simulator", Bytes32::new(sha256(b"climate-gateway simulator")))
    }

    /// Resolve a well-known network by name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "mainnet" => Some(Self::mainnet()),
            "testnet11" => Some(Self::testnet11()),
            "simulator" => Some(Self::simulator()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Execution Mode
// ---------------------------------------------------------------------------

/// Which side of the protocol the running service plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Holds the root key; mints and counter-signs burns.
    Registry,
    /// Holds tokens; requests burns and retires.
    Client,
    /// Read-only view of chain activity.
    Explorer,
}

/// The exposed operations a service can be asked to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateTokenizationTx,
    CreateDetokenizationTx,
    CreateDetokenizationFile,
    ParseDetokenizationFile,
    CreatePermissionlessRetirementTx,
    ListActivities,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateTokenizationTx => "create-tokenization-tx",
            Self::CreateDetokenizationTx => "create-detokenization-tx",
            Self::CreateDetokenizationFile => "create-detokenization-file",
            Self::ParseDetokenizationFile => "parse-detokenization-file",
            Self::CreatePermissionlessRetirementTx => "create-permissionless-retirement-tx",
            Self::ListActivities => "list-activities",
        }
    }
}

impl ExecutionMode {
    pub fn allows(&self, operation: Operation) -> bool {
        use Operation::*;
        match operation {
            CreateTokenizationTx | CreateDetokenizationTx | ParseDetokenizationFile => {
                matches!(self, Self::Registry)
            }
            CreateDetokenizationFile | CreatePermissionlessRetirementTx => {
                !matches!(self, Self::Explorer)
            }
            ListActivities => true,
        }
    }

    /// Like [`allows`](Self::allows) but produces the `WrongRole` error.
    pub fn ensure(&self, operation: Operation) -> Result<()> {
        if self.allows(operation) {
            Ok(())
        } else {
            Err(GatewayError::WrongRole {
                operation: operation.name(),
                role: self.to_string(),
            })
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry => write!(f, "registry"),
            Self::Client => write!(f, "client"),
            Self::Explorer => write!(f, "explorer"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "registry" => Ok(Self::Registry),
            "client" => Ok(Self::Client),
            "explorer" => Ok(Self::Explorer),
            other => Err(format!("unknown execution mode: {other}")),
        }
    }
}

/// Service-level configuration handed to [`crate::ops::Gateway`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub execution_mode: ExecutionMode,
    /// Standard-asset wallet used for minting and fees.
    pub wallet_id: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::Registry,
            wallet_id: DEFAULT_WALLET_ID,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
