//! # Gateway Operations
//!
//! The operations a gateway service exposes, as typed request/response
//! pairs. [`Gateway`] checks the service's [`ExecutionMode`] before doing
//! anything and builds the right wallet for each call:
//!
//! | operation                             | roles            | wallet   |
//! |---------------------------------------|------------------|----------|
//! | `create-tokenization-tx`              | registry         | registry |
//! | `create-detokenization-tx`            | registry         | registry |
//! | `parse-detokenization-file`           | registry         | none     |
//! | `create-detokenization-file`          | registry, client | client   |
//! | `create-permissionless-retirement-tx` | registry, client | client   |
//! | `list-activities`                     | all              | none     |
//!
//! Registry operations derive the root key from the ledger's master key.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::activity::{ActivityRecord, ActivityScanner};
use crate::chain::{parse_bytes32, Bytes32};
use crate::config::{ExecutionMode, GatewayConfig, Operation};
use crate::error::{GatewayError, Result};
use crate::handshake::{parse_detokenization_request, ParsedDetokenization};
use crate::ledger::{cat_wallet_info_by_asset_id, LedgerClient};
use crate::scripts::ScriptProvider;
use crate::transaction::TransactionRecord;
use crate::wallet::keys::master_to_root;
use crate::wallet::token::{GatewayMode, TokenIndex, TokenOnChain};
use crate::wallet::{Beneficiary, ClimateWallet};

// ---------------------------------------------------------------------------
// Requests & Responses
// ---------------------------------------------------------------------------

/// Id and first record of a created transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub id: Bytes32,
    pub record: TransactionRecord,
}

impl TransactionSummary {
    fn first_of(id: Bytes32, records: &[TransactionRecord]) -> Result<Self> {
        let record = records
            .first()
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("transaction record of {id}")))?;
        Ok(Self { id, record })
    }
}

/// An amount and fee, for requests that name no recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountPayment {
    pub amount: u64,
    #[serde(default)]
    pub fee: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizationPayment {
    pub to_puzzle_hash: Bytes32,
    pub amount: u64,
    #[serde(default)]
    pub fee: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetirementPayment {
    pub amount: u64,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub beneficiary_name: Option<String>,
    #[serde(default)]
    pub beneficiary_address: Option<String>,
    /// Hex, `0x` prefix optional.
    #[serde(default)]
    pub beneficiary_puzzle_hash: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizationTxRequest {
    pub token: TokenIndex,
    pub payment: TokenizationPayment,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizationTxResponse {
    pub token: TokenOnChain,
    pub tx: TransactionSummary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetokenizationTxRequest {
    pub token: TokenIndex,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetokenizationTxResponse {
    pub token: TokenIndex,
    pub tx: TransactionSummary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetokenizationFileRequest {
    pub token: TokenOnChain,
    pub payment: AmountPayment,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetokenizationFileResponse {
    pub token: TokenOnChain,
    pub content: String,
    pub tx: TransactionSummary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionlessRetirementTxRequest {
    pub token: TokenOnChain,
    pub payment: RetirementPayment,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionlessRetirementTxResponse {
    pub token: TokenOnChain,
    pub tx: TransactionSummary,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitiesRequest {
    #[serde(default)]
    pub mode: Option<GatewayMode>,
    #[serde(default)]
    pub start_height: Option<u32>,
    #[serde(default)]
    pub end_height: Option<u32>,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

pub struct Gateway {
    config: GatewayConfig,
    ledger: Arc<dyn LedgerClient>,
    scripts: Arc<dyn ScriptProvider>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, ledger: Arc<dyn LedgerClient>, scripts: Arc<dyn ScriptProvider>) -> Self {
        Self { config, ledger, scripts }
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.config.execution_mode
    }

    /// Mint a new token (or more of an existing one) and publish its
    /// on-chain metadata.
    pub async fn create_tokenization_tx(&self, request: TokenizationTxRequest) -> Result<TokenizationTxResponse> {
        self.ensure(Operation::CreateTokenizationTx)?;
        let wallet = self.registry_wallet(request.token).await?;
        let payment = request.payment;
        let transaction = wallet
            .tokenize(payment.to_puzzle_hash, payment.amount, payment.fee, self.config.wallet_id)
            .await?;
        Ok(TokenizationTxResponse {
            token: wallet.token_on_chain()?,
            tx: TransactionSummary::first_of(transaction.transaction_id, &transaction.transaction_records)?,
        })
    }

    /// Counter-sign and submit a client's detokenization request.
    pub async fn create_detokenization_tx(
        &self,
        asset_id: Bytes32,
        request: DetokenizationTxRequest,
    ) -> Result<DetokenizationTxResponse> {
        self.ensure(Operation::CreateDetokenizationTx)?;
        let wallet = self.registry_wallet(request.token.clone()).await?;
        check_asset_id(&asset_id, &wallet)?;
        let transaction = wallet
            .complete_detokenization(&request.content, self.config.wallet_id)
            .await?;
        Ok(DetokenizationTxResponse {
            token: request.token,
            tx: TransactionSummary::first_of(transaction.transaction_id, &transaction.transaction_records)?,
        })
    }

    /// Build a detokenization request file from the asset's tracked-asset
    /// wallet.
    pub async fn create_detokenization_file(
        &self,
        asset_id: Bytes32,
        request: DetokenizationFileRequest,
    ) -> Result<DetokenizationFileResponse> {
        self.ensure(Operation::CreateDetokenizationFile)?;
        let wallet = self.client_wallet(&asset_id, &request.token).await?;
        let wallet_id = cat_wallet_info_by_asset_id(self.ledger.as_ref(), &asset_id).await?.id;
        let detokenization = wallet
            .request_detokenization(request.payment.amount, request.payment.fee, wallet_id)
            .await?;
        Ok(DetokenizationFileResponse {
            token: request.token,
            content: detokenization.content,
            tx: TransactionSummary::first_of(detokenization.transaction_id, &detokenization.transaction_records)?,
        })
    }

    pub fn parse_detokenization_file(&self, content: &str) -> Result<ParsedDetokenization> {
        self.ensure(Operation::ParseDetokenizationFile)?;
        parse_detokenization_request(content, self.scripts.as_ref())
    }

    /// Retire tokens from the asset's tracked-asset wallet.
    pub async fn create_permissionless_retirement_tx(
        &self,
        asset_id: Bytes32,
        request: PermissionlessRetirementTxRequest,
    ) -> Result<PermissionlessRetirementTxResponse> {
        self.ensure(Operation::CreatePermissionlessRetirementTx)?;
        let payment = request.payment;
        let puzzle_hash = payment
            .beneficiary_puzzle_hash
            .as_deref()
            .map(|text| parse_bytes32(text).ok_or_else(|| GatewayError::InvalidBeneficiaryAddress(text.to_string())))
            .transpose()?;

        let wallet = self.client_wallet(&asset_id, &request.token).await?;
        let wallet_id = cat_wallet_info_by_asset_id(self.ledger.as_ref(), &asset_id).await?.id;
        let beneficiary = Beneficiary {
            name: payment.beneficiary_name,
            address: payment.beneficiary_address,
            puzzle_hash,
        };
        let transaction = wallet
            .retire(payment.amount, payment.fee, &beneficiary, wallet_id)
            .await?;
        Ok(PermissionlessRetirementTxResponse {
            token: request.token,
            tx: TransactionSummary::first_of(transaction.transaction_id, &transaction.transaction_records)?,
        })
    }

    /// Gateway activity of one token.
    pub async fn list_activities(&self, token: &TokenOnChain, request: ActivitiesRequest) -> Result<Vec<ActivityRecord>> {
        self.ensure(Operation::ListActivities)?;
        let scanner = ActivityScanner::new(
            token.token_index(),
            &token.public_key,
            self.ledger.clone(),
            self.scripts.clone(),
        )?;
        scanner
            .scan(request.mode, request.start_height, request.end_height)
            .await
    }

    fn ensure(&self, operation: Operation) -> Result<()> {
        self.config.execution_mode.ensure(operation)?;
        info!(operation = operation.name(), role = %self.config.execution_mode, "gateway operation");
        Ok(())
    }

    async fn registry_wallet(&self, token: TokenIndex) -> Result<ClimateWallet> {
        let root_key = master_to_root(&self.ledger.master_secret_key().await?);
        ClimateWallet::create(token, &root_key, self.ledger.clone(), self.scripts.clone()).await
    }

    async fn client_wallet(&self, asset_id: &Bytes32, token: &TokenOnChain) -> Result<ClimateWallet> {
        let wallet = ClimateWallet::from_token(token, self.ledger.clone(), self.scripts.clone()).await?;
        check_asset_id(asset_id, &wallet)?;
        Ok(wallet)
    }
}

fn check_asset_id(asset_id: &Bytes32, wallet: &ClimateWallet) -> Result<()> {
    let computed = wallet.asset_id();
    if *asset_id != computed {
        return Err(GatewayError::AssetIdMismatch {
            expected: *asset_id,
            computed,
        });
    }
    Ok(())
}
