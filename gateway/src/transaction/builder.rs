//! Gateway transaction assembly.
//!
//! Every gateway operation produces one atomic transaction made of two
//! parts:
//!
//! 1. a **base transaction** built and signed by the ledger client, which
//!    moves `amount` into the gateway (standard asset for a mint, tracked
//!    asset for a burn) and pays the fee;
//! 2. the **gateway spend** of the coin that base transaction creates,
//!    built here and authorized by the [`Signer`].
//!
//! The ledger client's contract is that all payments of a request are
//! created by the spend of its first coin, so the gateway coin's parent is
//! the first selected coin (the "origin coin").
//!
//! The assembler never broadcasts.

use chia::protocol::Bytes;
use tracing::info;

use super::signing::Signer;
use super::{BundleAccounting, Payment, TransactionRecord, TransactionRequest};
use crate::chain::{to_program, tree_hash, Bytes32, ClvmError, Coin, CoinSpend, Program, SpendBundle};
use crate::config::{NetworkConstants, CLIMATE_WALLET_INDEX, DEFAULT_WALLET_ID};
use crate::crypto::PublicKey;
use crate::error::{GatewayError, Result};
use crate::ledger::{check_wallet, LedgerClient, LedgerError, WalletInfo};
use crate::scripts::{GatewaySpendArgs, ScriptProvider};
use crate::wallet::token::GatewayMode;

// ---------------------------------------------------------------------------
// GatewayTransaction
// ---------------------------------------------------------------------------

/// Result of an assembled gateway operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayTransaction {
    pub transaction_id: Bytes32,
    /// First record carries the merged bundle.
    pub transaction_records: Vec<TransactionRecord>,
    pub spend_bundle: SpendBundle,
}

/// Key/value metadata as the gateway spend carries it: `((key . value) ...)`.
pub fn metadata_program(pairs: &[(String, Vec<u8>)]) -> std::result::Result<Program, ClvmError> {
    let pairs: Vec<(&str, Bytes)> = pairs
        .iter()
        .map(|(key, value)| (key.as_str(), Bytes::new(value.clone())))
        .collect();
    to_program(&pairs)
}

// ---------------------------------------------------------------------------
// AssemblyRequest
// ---------------------------------------------------------------------------

/// Parameters of one gateway operation.
#[derive(Clone, Debug)]
pub struct AssemblyRequest {
    pub mode: GatewayMode,
    pub coins: Vec<Coin>,
    pub origin_coin: Option<Coin>,
    pub amount: u64,
    pub fee: u64,
    pub from_puzzle_hash: Option<Bytes32>,
    pub to_puzzle_hash: Option<Bytes32>,
    pub metadata: Vec<(String, Vec<u8>)>,
    /// Mode key the delegated script is bound to (none for retirement).
    pub gateway_public_key: Option<PublicKey>,
    pub allow_missing: bool,
    pub wallet_id: u32,
}

impl AssemblyRequest {
    pub fn new(mode: GatewayMode, coins: Vec<Coin>, amount: u64) -> Self {
        Self {
            mode,
            coins,
            origin_coin: None,
            amount,
            fee: 0,
            from_puzzle_hash: None,
            to_puzzle_hash: None,
            metadata: Vec::new(),
            gateway_public_key: None,
            allow_missing: false,
            wallet_id: DEFAULT_WALLET_ID,
        }
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    /// Defaults to the first selected coin.
    pub fn origin_coin(mut self, coin: Coin) -> Self {
        self.origin_coin = Some(coin);
        self
    }

    pub fn from_puzzle_hash(mut self, puzzle_hash: Bytes32) -> Self {
        self.from_puzzle_hash = Some(puzzle_hash);
        self
    }

    pub fn to_puzzle_hash(mut self, puzzle_hash: Bytes32) -> Self {
        self.to_puzzle_hash = Some(puzzle_hash);
        self
    }

    pub fn metadata(mut self, pairs: Vec<(String, Vec<u8>)>) -> Self {
        self.metadata = pairs;
        self
    }

    pub fn gateway_public_key(mut self, public_key: Option<PublicKey>) -> Self {
        self.gateway_public_key = public_key;
        self
    }

    pub fn allow_missing(mut self, allow: bool) -> Self {
        self.allow_missing = allow;
        self
    }

    pub fn wallet_id(mut self, wallet_id: u32) -> Self {
        self.wallet_id = wallet_id;
        self
    }
}

// ---------------------------------------------------------------------------
// TransactionAssembler
// ---------------------------------------------------------------------------

pub struct TransactionAssembler<'a> {
    ledger: &'a dyn LedgerClient,
    scripts: &'a dyn ScriptProvider,
    constants: &'a NetworkConstants,
    issuance_script: &'a Program,
}

impl<'a> TransactionAssembler<'a> {
    pub fn new(
        ledger: &'a dyn LedgerClient,
        scripts: &'a dyn ScriptProvider,
        constants: &'a NetworkConstants,
        issuance_script: &'a Program,
    ) -> Self {
        Self {
            ledger,
            scripts,
            constants,
            issuance_script,
        }
    }

    pub fn asset_id(&self) -> Result<Bytes32> {
        Ok(tree_hash(self.issuance_script)?)
    }

    /// Script hash of gateway coins of this asset.
    pub fn gateway_puzzle_hash(&self) -> Result<Bytes32> {
        let gateway_hash = tree_hash(&self.scripts.gateway_script()?)?;
        Ok(self
            .scripts
            .tracked_asset_script_hash(&self.asset_id()?, &gateway_hash))
    }

    /// `WrongWalletType` unless `wallet_id` is the wallet `mode` spends from.
    pub async fn check_source_wallet(&self, wallet_id: u32, mode: GatewayMode) -> Result<WalletInfo> {
        check_wallet(self.ledger, wallet_id, mode.source_wallet_type()).await
    }

    /// The base-transaction request and the unsigned gateway spend. Pure.
    pub fn gateway_request_and_spend(
        &self,
        request: &AssemblyRequest,
        origin_coin: &Coin,
    ) -> Result<(TransactionRequest, CoinSpend)> {
        let gateway_script = self.scripts.gateway_script()?;
        let gateway_hash = tree_hash(&gateway_script)?;
        let asset_id = self.asset_id()?;
        let gateway_puzzle = self.scripts.tracked_asset_script(&asset_id, &gateway_script)?;
        let gateway_puzzle_hash = tree_hash(&gateway_puzzle)?;

        // A mint pays standard asset straight to the wrapped gateway script;
        // a burn pays tracked asset to the inner gateway script and the
        // tracking layer wraps it.
        let payment_hash = if request.mode.is_mint() {
            gateway_puzzle_hash
        } else {
            gateway_hash
        };
        let transaction_request = TransactionRequest {
            coins: request.coins.clone(),
            payments: vec![Payment::new(payment_hash, request.amount)],
            fee: request.fee,
        };

        let gateway_coin = Coin::new(origin_coin.coin_id(), gateway_puzzle_hash, request.amount);
        let delegated_script = self.scripts.delegated_script(
            request.mode,
            &gateway_hash,
            request.gateway_public_key.as_ref(),
        )?;
        let solution = self.scripts.gateway_solution(&GatewaySpendArgs {
            mode: request.mode,
            issuance_script: self.issuance_script.clone(),
            delegated_script,
            metadata: metadata_program(&request.metadata)?,
            amount: request.amount,
            to_puzzle_hash: request.to_puzzle_hash,
            from_puzzle_hash: request.from_puzzle_hash,
        })?;

        Ok((
            transaction_request,
            CoinSpend::new(gateway_coin, gateway_puzzle, solution),
        ))
    }

    /// Build the base transaction through the ledger, authorize the gateway
    /// spend and merge both into one bundle.
    pub async fn assemble(&self, request: AssemblyRequest, signer: &Signer) -> Result<GatewayTransaction> {
        self.check_source_wallet(request.wallet_id, request.mode).await?;
        let origin_coin = match request.origin_coin.or_else(|| request.coins.first().copied()) {
            Some(coin) if !request.coins.is_empty() => coin,
            _ => {
                return Err(GatewayError::InsufficientBalance {
                    amount: request.amount,
                })
            }
        };

        info!(
            mode = %request.mode,
            asset_id = %self.asset_id()?,
            amount = request.amount,
            fee = request.fee,
            "assembling gateway transaction"
        );

        let (transaction_request, gateway_spend) = self.gateway_request_and_spend(&request, &origin_coin)?;
        let signature = signer.authorize(
            &gateway_spend,
            self.scripts,
            &self.constants.agg_sig_me_additional_data,
            request.allow_missing,
        )?;
        let gateway_bundle = SpendBundle::new(vec![gateway_spend], signature.into());

        let mut records = self
            .ledger
            .create_signed_transaction(&transaction_request, request.wallet_id)
            .await?;
        let first = records
            .first_mut()
            .ok_or_else(|| LedgerError::Rpc("ledger returned no transaction records".into()))?;
        let base_bundle = first
            .spend_bundle
            .take()
            .ok_or_else(|| LedgerError::Rpc("base transaction has no spend bundle".into()))?;

        let spend_bundle = SpendBundle::aggregate(&[base_bundle, gateway_bundle]);
        let transaction_id = spend_bundle.name();
        first.additions = spend_bundle.created_coins(self.scripts)?;
        first.removals = spend_bundle.removals();
        first.tx_type = CLIMATE_WALLET_INDEX + u32::from(request.mode.to_int());
        first.name = transaction_id;
        first.memos = spend_bundle.memos(self.scripts)?;
        first.spend_bundle = Some(spend_bundle.clone());

        info!(%transaction_id, spends = spend_bundle.coin_spends.len(), "gateway transaction assembled");

        Ok(GatewayTransaction {
            transaction_id,
            transaction_records: records,
            spend_bundle,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
