//! # Ledger Client
//!
//! The gateway never talks to the network itself. Coin selection, base
//! transaction signing, broadcast and chain queries all go through a
//! [`LedgerClient`], usually backed by a wallet daemon and a full node.
//! [`memory::InMemoryLedger`] is a self-contained implementation for tests
//! and local simulation.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::{Bytes32, Coin, CoinRecord, CoinSpend};
use crate::config::NetworkConstants;
use crate::crypto::SecretKey;
use crate::error::{GatewayError, Result};
use crate::transaction::{TransactionRecord, TransactionRequest};

/// Failures reported by the ledger client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Transport or daemon failure.
    #[error("ledger rpc failed: {0}")]
    Rpc(String),

    #[error("ledger has no {0}")]
    NotFound(String),

    /// The ledger refused a transaction.
    #[error("ledger rejected transaction: {0}")]
    Rejected(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    StandardWallet,
    Cat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub id: u32,
    pub name: String,
    pub wallet_type: WalletType,
    /// Tracked asset of a `Cat` wallet.
    pub asset_id: Option<Bytes32>,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn network_constants(&self) -> std::result::Result<NetworkConstants, LedgerError>;

    async fn wallets(&self) -> std::result::Result<Vec<WalletInfo>, LedgerError>;

    /// Coins of `wallet_id` covering `amount`. Empty when the balance is
    /// insufficient.
    async fn select_coins(&self, amount: u64, wallet_id: u32) -> std::result::Result<Vec<Coin>, LedgerError>;

    /// Build and sign (but do not broadcast) a transaction spending exactly
    /// `request.coins`. The first record carries the bundle.
    async fn create_signed_transaction(
        &self,
        request: &TransactionRequest,
        wallet_id: u32,
    ) -> std::result::Result<Vec<TransactionRecord>, LedgerError>;

    async fn push_transactions(&self, records: &[TransactionRecord]) -> std::result::Result<(), LedgerError>;

    /// Script hash of the wallet's first derived standard key.
    async fn first_puzzle_hash(&self) -> std::result::Result<Bytes32, LedgerError>;

    /// Master key of the logged-in wallet.
    async fn master_secret_key(&self) -> std::result::Result<SecretKey, LedgerError>;

    /// Records of coins locked by `puzzle_hash`, confirmed within the
    /// inclusive height range, in chain order.
    async fn coin_records_by_puzzle_hash(
        &self,
        puzzle_hash: &Bytes32,
        start_height: Option<u32>,
        end_height: Option<u32>,
    ) -> std::result::Result<Vec<CoinRecord>, LedgerError>;

    /// The spend of `coin_id` included at `height`.
    async fn coin_spend(&self, coin_id: &Bytes32, height: u32) -> std::result::Result<CoinSpend, LedgerError>;
}

pub async fn wallet_info_by_id(ledger: &dyn LedgerClient, wallet_id: u32) -> Result<WalletInfo> {
    ledger
        .wallets()
        .await?
        .into_iter()
        .find(|info| info.id == wallet_id)
        .ok_or_else(|| GatewayError::NotFound(format!("wallet {wallet_id}")))
}

pub async fn cat_wallet_info_by_asset_id(ledger: &dyn LedgerClient, asset_id: &Bytes32) -> Result<WalletInfo> {
    ledger
        .wallets()
        .await?
        .into_iter()
        .find(|info| info.wallet_type == WalletType::Cat && info.asset_id.as_ref() == Some(asset_id))
        .ok_or_else(|| GatewayError::NotFound(format!("tracked-asset wallet for {asset_id}")))
}

/// `WrongWalletType` unless `wallet_id` is of the expected kind.
pub async fn check_wallet(ledger: &dyn LedgerClient, wallet_id: u32, expected: WalletType) -> Result<WalletInfo> {
    let info = wallet_info_by_id(ledger, wallet_id).await?;
    if info.wallet_type != expected {
        return Err(GatewayError::WrongWalletType {
            wallet_id,
            expected,
            found: info.wallet_type,
        });
    }
    Ok(info)
}
