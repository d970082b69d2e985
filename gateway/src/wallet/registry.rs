//! Registry-side flows: minting and counter-signing burns.

use chrono::Utc;
use tracing::{debug, info};

use super::token::GatewayMode;
use super::ClimateWallet;
use crate::chain::Bytes32;
use crate::config::CLIMATE_WALLET_INDEX;
use crate::crypto::Signature;
use crate::error::{GatewayError, Result};
use crate::handshake;
use crate::transaction::{AssemblyRequest, BundleAccounting, GatewayTransaction, Signer, SpendBundle, TransactionRecord};

impl ClimateWallet {
    /// Mint `amount` of the token to `to_puzzle_hash`, paying `fee` from the
    /// standard wallet `wallet_id`, and submit.
    pub async fn tokenize(
        &self,
        to_puzzle_hash: Bytes32,
        amount: u64,
        fee: u64,
        wallet_id: u32,
    ) -> Result<GatewayTransaction> {
        let mode = GatewayMode::Tokenization;
        let secret_key = self.mode_secret_key("tokenize", mode)?;
        let assembler = self.assembler();
        assembler.check_source_wallet(wallet_id, mode).await?;

        let total = amount
            .checked_add(fee)
            .ok_or(GatewayError::InsufficientBalance { amount })?;
        let coins = self.ledger().select_coins(total, wallet_id).await?;
        if coins.is_empty() {
            return Err(GatewayError::InsufficientBalance { amount: total });
        }
        info!(%mode, recipient = %to_puzzle_hash, amount, fee, "creating tokenization transaction");

        let request = AssemblyRequest::new(mode, coins, amount)
            .fee(fee)
            .to_puzzle_hash(to_puzzle_hash)
            .gateway_public_key(Some(secret_key.public_key()))
            .wallet_id(wallet_id);
        let transaction = assembler.assemble(request, &self.signer(Some(mode))).await?;

        self.ledger()
            .push_transactions(&transaction.transaction_records)
            .await?;
        info!(transaction_id = %transaction.transaction_id, "tokenization submitted");
        Ok(transaction)
    }

    /// Counter-sign a client's detokenization request and submit it.
    ///
    /// Only the detokenization mode key is used; every other pair must
    /// already be covered by the request. A request the mode key adds
    /// nothing to is rejected as `InvalidArtifact`.
    pub async fn complete_detokenization(&self, content: &str, wallet_id: u32) -> Result<GatewayTransaction> {
        let mode = GatewayMode::Detokenization;
        let secret_key = self.mode_secret_key("complete-detokenization", mode)?;
        let unsigned = handshake::decode(content)?;

        let signer = Signer::new().with_secret_key(secret_key.clone());
        let additional_data = &self.constants().agg_sig_me_additional_data;
        let mut signatures = Vec::with_capacity(unsigned.coin_spends.len());
        let mut gateway_spend = None;
        for coin_spend in &unsigned.coin_spends {
            let signature = signer.authorize(coin_spend, self.scripts(), additional_data, true)?;
            if !signature.is_identity() {
                debug!(coin_id = %coin_spend.coin.coin_id(), "counter-signed spend");
                gateway_spend = Some(coin_spend.coin);
            }
            signatures.push(signature);
        }

        let added = Signature::aggregate(&signatures);
        let gateway_coin = match gateway_spend {
            Some(coin) if !added.is_identity() => coin,
            _ => {
                return Err(GatewayError::InvalidArtifact(
                    "request carries no spend for the detokenization key".into(),
                ))
            }
        };

        let spend_bundle = SpendBundle::aggregate(&[unsigned, SpendBundle::new(Vec::new(), added.into())]);
        let transaction_id = spend_bundle.name();
        let fees = spend_bundle.fees(self.scripts())?;
        let record = TransactionRecord {
            confirmed_at_height: 0,
            created_at_time: Utc::now().timestamp().max(0) as u64,
            to_puzzle_hash: gateway_coin.puzzle_hash,
            amount: gateway_coin.amount,
            fee_amount: fees.saturating_sub(gateway_coin.amount),
            confirmed: false,
            sent: 0,
            spend_bundle: Some(spend_bundle.clone()),
            additions: spend_bundle.created_coins(self.scripts())?,
            removals: spend_bundle.removals(),
            wallet_id,
            tx_type: CLIMATE_WALLET_INDEX + u32::from(mode.to_int()),
            name: transaction_id,
            memos: spend_bundle.memos(self.scripts())?,
        };

        let transaction_records = vec![record];
        self.ledger().push_transactions(&transaction_records).await?;
        info!(%transaction_id, amount = gateway_coin.amount, "detokenization completed");
        Ok(GatewayTransaction {
            transaction_id,
            transaction_records,
            spend_bundle,
        })
    }
}
