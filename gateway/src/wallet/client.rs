//! Client-side flows: detokenization requests and permissionless retirement.
//!
//! Both burn tracked-asset coins from a `Cat` wallet. Before assembling,
//! the client asks the ledger for a zero-net transfer of the origin coin to
//! [`REVEAL_PUZZLE_HASH`]; the transfer is never submitted, it only reveals
//! the origin coin's spend script so the gateway spend can name the inner
//! script hash it burns from.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::token::GatewayMode;
use super::ClimateWallet;
use crate::chain::{tree_hash, Bytes32, Coin};
use crate::config::{
    METADATA_BENEFICIARY_ADDRESS, METADATA_BENEFICIARY_NAME, METADATA_BENEFICIARY_PUZZLE_HASH,
    REVEAL_PUZZLE_HASH,
};
use crate::crypto::PublicKey;
use crate::error::{GatewayError, Result};
use crate::handshake;
use crate::ledger::LedgerError;
use crate::transaction::{AssemblyRequest, GatewayTransaction, Payment, TransactionRecord, TransactionRequest};

/// Who a retirement is made on behalf of. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub name: Option<String>,
    pub address: Option<String>,
    pub puzzle_hash: Option<Bytes32>,
}

/// A partially signed detokenization request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetokenizationRequest {
    /// Handshake artifact for the registry.
    pub content: String,
    pub transaction_id: Bytes32,
    /// Records with their bundles stripped; not submittable.
    pub transaction_records: Vec<TransactionRecord>,
}

/// Decode a bech32/bech32m address into a puzzle hash, if it is one.
pub fn decode_puzzle_hash(address: &str) -> Option<Bytes32> {
    let (_, payload) = bech32::decode(address).ok()?;
    Bytes32::try_from(payload.as_slice()).ok()
}

impl ClimateWallet {
    /// Build, partially sign and encode a detokenization request of
    /// `amount` from tracked-asset wallet `wallet_id`. Nothing is submitted.
    pub async fn request_detokenization(
        &self,
        amount: u64,
        fee: u64,
        wallet_id: u32,
    ) -> Result<DetokenizationRequest> {
        let mode = GatewayMode::Detokenization;
        self.ensure_client("request-detokenization")?;
        let gateway_public_key = self.keys().public_key(mode);

        let transaction = self
            .client_transaction(mode, amount, fee, gateway_public_key, Vec::new(), wallet_id)
            .await?;
        let content = handshake::encode(&transaction.spend_bundle)?;
        info!(
            transaction_id = %transaction.transaction_id,
            amount,
            fee,
            "detokenization request created"
        );

        Ok(DetokenizationRequest {
            content,
            transaction_id: transaction.transaction_id,
            transaction_records: transaction
                .transaction_records
                .iter()
                .map(TransactionRecord::without_bundle)
                .collect(),
        })
    }

    /// Burn `amount` on behalf of `beneficiary` using only the published
    /// retirement delegation, and submit.
    ///
    /// Without a beneficiary puzzle hash, the address is decoded when it is
    /// one; a beneficiary with neither falls back to this wallet's first
    /// puzzle hash. An address that does not decode is recorded with an
    /// empty puzzle hash.
    pub async fn retire(
        &self,
        amount: u64,
        fee: u64,
        beneficiary: &Beneficiary,
        wallet_id: u32,
    ) -> Result<GatewayTransaction> {
        let mode = GatewayMode::PermissionlessRetirement;
        self.ensure_client("retire")?;

        let puzzle_hash = match (&beneficiary.puzzle_hash, &beneficiary.address) {
            (Some(puzzle_hash), _) => puzzle_hash.to_vec(),
            (None, None) => self.ledger().first_puzzle_hash().await?.to_vec(),
            (None, Some(address)) => decode_puzzle_hash(address)
                .map(|puzzle_hash| puzzle_hash.to_vec())
                .unwrap_or_default(),
        };
        let metadata = vec![
            (
                METADATA_BENEFICIARY_NAME.to_string(),
                beneficiary.name.clone().unwrap_or_default().into_bytes(),
            ),
            (
                METADATA_BENEFICIARY_ADDRESS.to_string(),
                beneficiary.address.clone().unwrap_or_default().into_bytes(),
            ),
            (METADATA_BENEFICIARY_PUZZLE_HASH.to_string(), puzzle_hash),
        ];

        let transaction = self
            .client_transaction(mode, amount, fee, None, metadata, wallet_id)
            .await?;
        self.ledger()
            .push_transactions(&transaction.transaction_records)
            .await?;
        info!(transaction_id = %transaction.transaction_id, amount, "retirement submitted");
        Ok(transaction)
    }

    async fn client_transaction(
        &self,
        mode: GatewayMode,
        amount: u64,
        fee: u64,
        gateway_public_key: Option<PublicKey>,
        metadata: Vec<(String, Vec<u8>)>,
        wallet_id: u32,
    ) -> Result<GatewayTransaction> {
        let assembler = self.assembler();
        assembler.check_source_wallet(wallet_id, mode).await?;

        let coins = self.ledger().select_coins(amount, wallet_id).await?;
        let origin_coin = *coins
            .first()
            .ok_or(GatewayError::InsufficientBalance { amount })?;
        info!(%mode, amount, fee, "creating client transaction");
        for (key, value) in &metadata {
            debug!(key = %key, value = %String::from_utf8_lossy(value), "gateway metadata");
        }

        let from_puzzle_hash = self.reveal_inner_puzzle_hash(&origin_coin, wallet_id).await?;
        let request = AssemblyRequest::new(mode, coins, amount)
            .fee(fee)
            .origin_coin(origin_coin)
            .from_puzzle_hash(from_puzzle_hash)
            .metadata(metadata)
            .gateway_public_key(gateway_public_key)
            .allow_missing(mode == GatewayMode::Detokenization)
            .wallet_id(wallet_id);
        assembler.assemble(request, &self.signer(None)).await
    }

    /// Inner script hash of `origin_coin`, learned from a zero-net transfer
    /// the ledger builds but nobody submits.
    async fn reveal_inner_puzzle_hash(&self, origin_coin: &Coin, wallet_id: u32) -> Result<Bytes32> {
        let request = TransactionRequest {
            coins: vec![*origin_coin],
            payments: vec![Payment::new(REVEAL_PUZZLE_HASH, origin_coin.amount)],
            fee: 0,
        };
        let records = self.ledger().create_signed_transaction(&request, wallet_id).await?;
        let record = match records.as_slice() {
            [record] => record,
            other => {
                return Err(LedgerError::Rpc(format!(
                    "origin reveal returned {} transaction records",
                    other.len()
                ))
                .into())
            }
        };
        let spend = record
            .spend_bundle
            .as_ref()
            .and_then(|bundle| bundle.coin_spends.first())
            .ok_or_else(|| LedgerError::Rpc("origin reveal has no coin spend".into()))?;
        let (_, inner) = self
            .scripts()
            .match_tracked_asset(&spend.puzzle_reveal)
            .ok_or_else(|| GatewayError::NotFound(format!("tracked-asset script of coin {}", origin_coin.coin_id())))?;
        Ok(tree_hash(&inner)?)
    }
}
