//! In-memory ledger.
//!
//! A [`SharedChain`] holds coin records and spends; any number of
//! [`InMemoryLedger`] wallets (a registry and its clients, say) can be
//! attached to the same chain. Each ledger owns one standard wallet and any
//! tracked-asset wallets added to it; wallet balances are simply the
//! unspent chain coins locked by the wallet's scripts.
//!
//! Pushed bundles are checked the way a node would check them at the
//! signature level: every removal must be unspent (or created in the same
//! bundle) and the aggregate signature must validate against the pairs
//! every spend requires. Scripts are interpreted by [`ReferenceScripts`].
//!
//! Thread safety: the chain is behind `Arc<Mutex<_>>`, wallet lists behind
//! `RwLock`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::{LedgerClient, LedgerError, WalletInfo, WalletType};
use crate::chain::{tree_hash, Bytes32, Coin, CoinRecord, CoinSpend, Condition, Program, SpendBundle};
use crate::config::{NetworkConstants, DEFAULT_WALLET_ID, OUTGOING_TX, WALLET_KEY_PATH};
use crate::crypto::{sha256_concat, SecretKey, Signature};
use crate::scripts::reference::ReferenceScripts;
use crate::scripts::ScriptProvider;
use crate::transaction::signing::{required_signatures, verify_spend_bundle};
use crate::transaction::{BundleAccounting, TransactionRecord, TransactionRequest};

/// Timestamp of block zero.
const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// Seconds between simulated blocks.
const BLOCK_INTERVAL_SECS: u64 = 18;

fn rpc(err: impl std::fmt::Display) -> LedgerError {
    LedgerError::Rpc(err.to_string())
}

// ---------------------------------------------------------------------------
// SharedChain
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ChainState {
    height: u32,
    records: Vec<CoinRecord>,
    spends: HashMap<Bytes32, (u32, CoinSpend)>,
    farmed: u64,
}

impl ChainState {
    fn next_block(&mut self) -> (u32, u64) {
        self.height += 1;
        let timestamp = GENESIS_TIMESTAMP + u64::from(self.height) * BLOCK_INTERVAL_SECS;
        (self.height, timestamp)
    }

    fn unspent_position(&self, coin_id: &Bytes32) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.spent_block_index == 0 && record.coin.coin_id() == *coin_id)
    }
}

/// Chain state shared between ledgers. Cloning shares the same chain.
#[derive(Clone, Default)]
pub struct SharedChain {
    state: Arc<Mutex<ChainState>>,
}

impl SharedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn height(&self) -> u32 {
        self.state.lock().height
    }

    /// Create a coin out of thin air in a new block.
    pub fn farm(&self, puzzle_hash: Bytes32, amount: u64) -> Coin {
        let mut state = self.state.lock();
        state.farmed += 1;
        let parent = Bytes32::new(sha256_concat(&[b"farm", &state.farmed.to_be_bytes()]));
        let coin = Coin::new(parent, puzzle_hash, amount);
        let (height, timestamp) = state.next_block();
        state.records.push(CoinRecord {
            coin,
            confirmed_block_index: height,
            spent_block_index: 0,
            coinbase: true,
            timestamp,
        });
        coin
    }

    /// Include a bundle in a new block.
    fn apply(&self, bundle: &SpendBundle, additions: &[Coin]) -> Result<u32, LedgerError> {
        let mut state = self.state.lock();
        let created: Vec<Bytes32> = additions.iter().map(Coin::coin_id).collect();
        for spend in &bundle.coin_spends {
            let coin_id = spend.coin.coin_id();
            if state.unspent_position(&coin_id).is_none() && !created.contains(&coin_id) {
                return Err(LedgerError::Rejected(format!(
                    "coin {coin_id} is unknown or already spent"
                )));
            }
        }

        let (height, timestamp) = state.next_block();
        for coin in additions {
            state.records.push(CoinRecord {
                coin: *coin,
                confirmed_block_index: height,
                spent_block_index: 0,
                coinbase: false,
                timestamp,
            });
        }
        for spend in &bundle.coin_spends {
            let coin_id = spend.coin.coin_id();
            if let Some(index) = state.unspent_position(&coin_id) {
                state.records[index].spent_block_index = height;
            }
            state.spends.insert(coin_id, (height, spend.clone()));
        }
        Ok(height)
    }

    fn unspent(&self, puzzle_hash: &Bytes32) -> Vec<Coin> {
        self.state
            .lock()
            .records
            .iter()
            .filter(|record| record.spent_block_index == 0 && record.coin.puzzle_hash == *puzzle_hash)
            .map(|record| record.coin)
            .collect()
    }

    fn records_by_puzzle_hash(
        &self,
        puzzle_hash: &Bytes32,
        start_height: Option<u32>,
        end_height: Option<u32>,
    ) -> Vec<CoinRecord> {
        let start = start_height.unwrap_or(0);
        let end = end_height.unwrap_or(u32::MAX);
        self.state
            .lock()
            .records
            .iter()
            .filter(|record| record.coin.puzzle_hash == *puzzle_hash)
            .filter(|record| (start..=end).contains(&record.confirmed_block_index))
            .cloned()
            .collect()
    }

    fn spend(&self, coin_id: &Bytes32, height: u32) -> Option<CoinSpend> {
        self.state
            .lock()
            .spends
            .get(coin_id)
            .filter(|(spent_at, _)| *spent_at == height)
            .map(|(_, spend)| spend.clone())
    }
}

// ---------------------------------------------------------------------------
// InMemoryLedger
// ---------------------------------------------------------------------------

pub struct InMemoryLedger {
    master_key: SecretKey,
    wallet_key: SecretKey,
    constants: NetworkConstants,
    scripts: ReferenceScripts,
    chain: SharedChain,
    wallets: RwLock<Vec<WalletInfo>>,
    pushed: Mutex<Vec<TransactionRecord>>,
}

impl InMemoryLedger {
    /// A ledger with a single standard wallet (id 1) keyed off `master_key`.
    pub fn new(master_key: SecretKey, constants: NetworkConstants, chain: SharedChain) -> Self {
        let wallet_key = master_key.derive_path(&WALLET_KEY_PATH);
        let standard = WalletInfo {
            id: DEFAULT_WALLET_ID,
            name: "Standard Wallet".to_string(),
            wallet_type: WalletType::StandardWallet,
            asset_id: None,
        };
        Self {
            master_key,
            wallet_key,
            constants,
            scripts: ReferenceScripts::new(),
            chain,
            wallets: RwLock::new(vec![standard]),
            pushed: Mutex::new(Vec::new()),
        }
    }

    pub fn chain(&self) -> &SharedChain {
        &self.chain
    }

    /// Track `asset_id` in a new wallet; returns its id. Adding the same
    /// asset twice returns the existing wallet.
    pub fn add_cat_wallet(&self, asset_id: Bytes32) -> u32 {
        let mut wallets = self.wallets.write();
        if let Some(existing) = wallets.iter().find(|w| w.asset_id == Some(asset_id)) {
            return existing.id;
        }
        let id = wallets.iter().map(|w| w.id).max().unwrap_or(0) + 1;
        wallets.push(WalletInfo {
            id,
            name: format!("CAT {}", &asset_id.to_string()[..16]),
            wallet_type: WalletType::Cat,
            asset_id: Some(asset_id),
        });
        id
    }

    /// Farm `amount` into a wallet.
    pub fn fund(&self, wallet_id: u32, amount: u64) -> Result<Coin, LedgerError> {
        let puzzle_hash = self.wallet_puzzle_hash(wallet_id)?;
        Ok(self.chain.farm(puzzle_hash, amount))
    }

    pub fn balance(&self, wallet_id: u32) -> Result<u64, LedgerError> {
        let puzzle_hash = self.wallet_puzzle_hash(wallet_id)?;
        Ok(self
            .chain
            .unspent(&puzzle_hash)
            .iter()
            .fold(0u64, |sum, coin| sum.saturating_add(coin.amount)))
    }

    /// Every record pushed so far, bundled or not.
    pub fn pushed(&self) -> Vec<TransactionRecord> {
        self.pushed.lock().clone()
    }

    /// Script locking the coins of `wallet_id`.
    pub fn wallet_puzzle(&self, wallet_id: u32) -> Result<Program, LedgerError> {
        let info = self.wallet(wallet_id)?;
        let standard = self.standard_puzzle()?;
        match (info.wallet_type, info.asset_id) {
            (WalletType::StandardWallet, _) => Ok(standard),
            (WalletType::Cat, Some(asset_id)) => self
                .scripts
                .tracked_asset_script(&asset_id, &standard)
                .map_err(rpc),
            (WalletType::Cat, None) => Err(LedgerError::Rpc(format!("wallet {wallet_id} has no asset id"))),
        }
    }

    fn wallet_puzzle_hash(&self, wallet_id: u32) -> Result<Bytes32, LedgerError> {
        tree_hash(&self.wallet_puzzle(wallet_id)?).map_err(rpc)
    }

    fn wallet(&self, wallet_id: u32) -> Result<WalletInfo, LedgerError> {
        self.wallets
            .read()
            .iter()
            .find(|w| w.id == wallet_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {wallet_id}")))
    }

    fn standard_puzzle(&self) -> Result<Program, LedgerError> {
        self.scripts
            .standard_script(&self.wallet_key.public_key())
            .map_err(rpc)
    }

    fn greedy_select(&self, puzzle_hash: &Bytes32, amount: u64) -> Vec<Coin> {
        let mut selected = Vec::new();
        let mut total = 0u64;
        for coin in self.chain.unspent(puzzle_hash) {
            if total >= amount && !selected.is_empty() {
                break;
            }
            total = total.saturating_add(coin.amount);
            selected.push(coin);
        }
        if total < amount {
            Vec::new()
        } else {
            selected
        }
    }

    /// Standard spends of `coins`, the first one emitting `conditions`.
    fn standard_spends(&self, coins: &[Coin], conditions: &[Condition]) -> Result<Vec<CoinSpend>, LedgerError> {
        let puzzle = self.standard_puzzle()?;
        coins
            .iter()
            .enumerate()
            .map(|(i, coin)| {
                let emitted = if i == 0 { conditions } else { &[] };
                let solution = self.scripts.standard_solution(emitted).map_err(rpc)?;
                Ok(CoinSpend::new(*coin, puzzle.clone(), solution))
            })
            .collect()
    }

    fn payment_conditions(request: &TransactionRequest) -> Vec<Condition> {
        request
            .payments
            .iter()
            .map(|p| Condition::CreateCoin {
                puzzle_hash: p.puzzle_hash,
                amount: p.amount,
                memos: p.memos.clone(),
            })
            .collect()
    }

    /// Sign every pair that belongs to this wallet's key.
    fn sign(&self, spends: &[CoinSpend]) -> Result<Signature, LedgerError> {
        let public_key = self.wallet_key.public_key();
        let mut signatures = Vec::new();
        for spend in spends {
            let pairs = required_signatures(spend, &self.scripts, &self.constants.agg_sig_me_additional_data)
                .map_err(rpc)?;
            signatures.extend(
                pairs
                    .iter()
                    .filter(|(pk, _)| *pk == public_key)
                    .map(|(_, message)| self.wallet_key.sign(message)),
            );
        }
        Ok(Signature::aggregate(&signatures))
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn network_constants(&self) -> Result<NetworkConstants, LedgerError> {
        Ok(self.constants.clone())
    }

    async fn wallets(&self) -> Result<Vec<WalletInfo>, LedgerError> {
        Ok(self.wallets.read().clone())
    }

    async fn select_coins(&self, amount: u64, wallet_id: u32) -> Result<Vec<Coin>, LedgerError> {
        let puzzle_hash = self.wallet_puzzle_hash(wallet_id)?;
        Ok(self.greedy_select(&puzzle_hash, amount))
    }

    async fn create_signed_transaction(
        &self,
        request: &TransactionRequest,
        wallet_id: u32,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let info = self.wallet(wallet_id)?;
        let (input, output) = request
            .total_input()
            .zip(request.total_output())
            .ok_or_else(|| LedgerError::Rejected("coin or payment amounts overflow".into()))?;
        let own_puzzle = self.standard_puzzle()?;
        let own_hash = tree_hash(&own_puzzle).map_err(rpc)?;
        let mut conditions = Self::payment_conditions(request);

        let spends = match (info.wallet_type, info.asset_id) {
            (WalletType::StandardWallet, _) => {
                let change = input
                    .checked_sub(output.saturating_add(request.fee))
                    .ok_or_else(|| LedgerError::Rejected("inputs do not cover outputs and fee".into()))?;
                if change > 0 {
                    conditions.push(Condition::create_coin(own_hash, change));
                }
                if request.fee > 0 {
                    conditions.push(Condition::ReserveFee { amount: request.fee });
                }
                self.standard_spends(&request.coins, &conditions)?
            }
            (WalletType::Cat, Some(asset_id)) => {
                let change = input
                    .checked_sub(output)
                    .ok_or_else(|| LedgerError::Rejected("inputs do not cover outputs".into()))?;
                if change > 0 {
                    conditions.push(Condition::create_coin(own_hash, change));
                }
                let puzzle = self
                    .scripts
                    .tracked_asset_script(&asset_id, &own_puzzle)
                    .map_err(rpc)?;
                let mut spends = Vec::with_capacity(request.coins.len() + 1);
                for (i, coin) in request.coins.iter().enumerate() {
                    let emitted: &[Condition] = if i == 0 { &conditions } else { &[] };
                    let inner_solution = self.scripts.standard_solution(emitted).map_err(rpc)?;
                    let solution = self
                        .scripts
                        .tracked_asset_solution(&inner_solution)
                        .map_err(rpc)?;
                    spends.push(CoinSpend::new(*coin, puzzle.clone(), solution));
                }

                if request.fee > 0 {
                    let fee_coins = self.greedy_select(&own_hash, request.fee);
                    if fee_coins.is_empty() {
                        return Err(LedgerError::Rejected("cannot cover fee".into()));
                    }
                    let fee_input = fee_coins.iter().fold(0u64, |sum, c| sum.saturating_add(c.amount));
                    let mut fee_conditions = vec![Condition::ReserveFee { amount: request.fee }];
                    if fee_input > request.fee {
                        fee_conditions.push(Condition::create_coin(own_hash, fee_input - request.fee));
                    }
                    spends.extend(self.standard_spends(&fee_coins, &fee_conditions)?);
                }
                spends
            }
            (WalletType::Cat, None) => {
                return Err(LedgerError::Rpc(format!("wallet {wallet_id} has no asset id")));
            }
        };

        let signature = self.sign(&spends)?;
        let bundle = SpendBundle::new(spends, signature.into());
        let additions = bundle.created_coins(&self.scripts).map_err(rpc)?;
        let memos = bundle.memos(&self.scripts).map_err(rpc)?;
        let name = bundle.name();

        debug!(wallet_id, %name, inputs = input, outputs = output, fee = request.fee, "built base transaction");

        Ok(vec![TransactionRecord {
            confirmed_at_height: 0,
            created_at_time: chrono::Utc::now().timestamp().max(0) as u64,
            to_puzzle_hash: request.payments.first().map(|p| p.puzzle_hash).unwrap_or_default(),
            amount: output,
            fee_amount: request.fee,
            confirmed: false,
            sent: 0,
            removals: bundle.removals(),
            spend_bundle: Some(bundle),
            additions,
            wallet_id,
            tx_type: OUTGOING_TX,
            name,
            memos,
        }])
    }

    async fn push_transactions(&self, records: &[TransactionRecord]) -> Result<(), LedgerError> {
        for record in records {
            let Some(bundle) = &record.spend_bundle else {
                continue;
            };
            let additional_data = &self.constants.agg_sig_me_additional_data;
            let valid = verify_spend_bundle(bundle, &self.scripts, additional_data)
                .map_err(|e| LedgerError::Rejected(e.to_string()))?;
            if !valid {
                return Err(LedgerError::Rejected(format!(
                    "aggregate signature of {} does not validate",
                    record.name
                )));
            }
            let additions = bundle
                .created_coins(&self.scripts)
                .map_err(|e| LedgerError::Rejected(e.to_string()))?;
            let height = self.chain.apply(bundle, &additions)?;
            info!(name = %record.name, height, spends = bundle.coin_spends.len(), "transaction included");
        }
        self.pushed.lock().extend_from_slice(records);
        Ok(())
    }

    async fn first_puzzle_hash(&self) -> Result<Bytes32, LedgerError> {
        tree_hash(&self.standard_puzzle()?).map_err(rpc)
    }

    async fn master_secret_key(&self) -> Result<SecretKey, LedgerError> {
        Ok(self.master_key.clone())
    }

    async fn coin_records_by_puzzle_hash(
        &self,
        puzzle_hash: &Bytes32,
        start_height: Option<u32>,
        end_height: Option<u32>,
    ) -> Result<Vec<CoinRecord>, LedgerError> {
        Ok(self.chain.records_by_puzzle_hash(puzzle_hash, start_height, end_height))
    }

    async fn coin_spend(&self, coin_id: &Bytes32, height: u32) -> Result<CoinSpend, LedgerError> {
        self.chain
            .spend(coin_id, height)
            .ok_or_else(|| LedgerError::NotFound(format!("spend of {coin_id} at height {height}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
