//! # Activity Scanner
//!
//! Reconstructs a token's gateway history from the chain. Every gateway
//! coin of the token lives at one script hash (the gateway script wrapped
//! in the asset-tracking layer), so a scan is a single coin-record query
//! followed by one spend lookup per spent coin.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chain::{from_program, tree_hash, Bytes, Bytes32, CoinRecord, Program};
use crate::config::{METADATA_BENEFICIARY_PUZZLE_HASH, METADATA_KEYS};
use crate::crypto::PublicKey;
use crate::error::{GatewayError, Result};
use crate::ledger::LedgerClient;
use crate::scripts::ScriptProvider;
use crate::wallet::token::{GatewayMode, TokenIndex};

/// One gateway spend of a token, as observed on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub org_uid: String,
    pub warehouse_project_id: String,
    pub vintage_year: u32,
    pub sequence_num: u32,
    pub asset_id: Bytes32,
    pub coin_id: Bytes32,
    /// Height the gateway coin was spent at.
    pub height: u32,
    pub amount: u64,
    pub mode: GatewayMode,
    pub metadata: BTreeMap<String, String>,
    pub beneficiary_name: Option<String>,
    pub beneficiary_address: Option<String>,
    pub beneficiary_puzzle_hash: Option<String>,
    pub timestamp: u64,
}

pub struct ActivityScanner {
    token_index: TokenIndex,
    asset_id: Bytes32,
    ledger: Arc<dyn LedgerClient>,
    scripts: Arc<dyn ScriptProvider>,
}

impl ActivityScanner {
    pub fn new(
        token_index: TokenIndex,
        root_public_key: &PublicKey,
        ledger: Arc<dyn LedgerClient>,
        scripts: Arc<dyn ScriptProvider>,
    ) -> Result<Self> {
        let asset_id = tree_hash(&scripts.issuance_script(root_public_key, &token_index.index_hash())?)?;
        Ok(Self {
            token_index,
            asset_id,
            ledger,
            scripts,
        })
    }

    pub fn asset_id(&self) -> Bytes32 {
        self.asset_id
    }

    /// Gateway activity confirmed within `[start_height, end_height]`,
    /// optionally restricted to one mode, in ledger order.
    ///
    /// Coins with malformed metadata are logged and skipped; a metadata key
    /// outside the whitelist fails the whole scan.
    pub async fn scan(
        &self,
        mode: Option<GatewayMode>,
        start_height: Option<u32>,
        end_height: Option<u32>,
    ) -> Result<Vec<ActivityRecord>> {
        let gateway_hash = tree_hash(&self.scripts.gateway_script()?)?;
        let puzzle_hash = self.scripts.tracked_asset_script_hash(&self.asset_id, &gateway_hash);
        let records = self
            .ledger
            .coin_records_by_puzzle_hash(&puzzle_hash, start_height, end_height)
            .await?;
        debug!(asset_id = %self.asset_id, coins = records.len(), "scanning gateway coins");

        let mut activities = Vec::new();
        for record in records {
            let height = record.spent_block_index;
            if height == 0 {
                continue;
            }
            let coin_id = record.coin.coin_id();
            let spend = self.ledger.coin_spend(&coin_id, height).await?;
            let (spend_mode, issuance_spend) = self.scripts.parse_gateway_spend(&spend, true)?;
            if mode.is_some_and(|wanted| wanted != spend_mode) {
                continue;
            }

            let metadata = match from_program::<(Program, (Program, Program))>(&issuance_spend.solution) {
                Ok((_, (list, _))) => parse_metadata(&list)?,
                Err(_) => Some(BTreeMap::new()),
            };
            let Some(metadata) = metadata else {
                warn!(%coin_id, "coin has incorrect metadata structure, skipping");
                continue;
            };
            activities.push(self.activity(&record, height, spend_mode, metadata));
        }
        Ok(activities)
    }

    fn activity(
        &self,
        record: &CoinRecord,
        height: u32,
        mode: GatewayMode,
        metadata: BTreeMap<String, String>,
    ) -> ActivityRecord {
        ActivityRecord {
            org_uid: self.token_index.org_uid.clone(),
            warehouse_project_id: self.token_index.warehouse_project_id.clone(),
            vintage_year: self.token_index.vintage_year,
            sequence_num: self.token_index.sequence_num,
            asset_id: self.asset_id,
            coin_id: record.coin.coin_id(),
            height,
            amount: record.coin.amount,
            mode,
            beneficiary_name: metadata.get(crate::config::METADATA_BENEFICIARY_NAME).cloned(),
            beneficiary_address: metadata.get(crate::config::METADATA_BENEFICIARY_ADDRESS).cloned(),
            beneficiary_puzzle_hash: metadata.get(METADATA_BENEFICIARY_PUZZLE_HASH).cloned(),
            metadata,
            timestamp: record.timestamp,
        }
    }
}

/// Decode `((key . value) ...)`. `Ok(None)` when the shape is wrong.
fn parse_metadata(list: &Program) -> Result<Option<BTreeMap<String, String>>> {
    let Ok(entries) = from_program::<Vec<(Bytes, Bytes)>>(list) else {
        return Ok(None);
    };
    let mut metadata = BTreeMap::new();
    for (key, value) in entries {
        let Ok(key) = String::from_utf8(key.into_inner()) else {
            return Ok(None);
        };
        if !METADATA_KEYS.contains(&key.as_str()) {
            return Err(GatewayError::UnknownMetadataKey(key));
        }
        let rendered = if key == METADATA_BENEFICIARY_PUZZLE_HASH {
            format!("0x{}", hex::encode(value.into_inner()))
        } else {
            match String::from_utf8(value.into_inner()) {
                Ok(text) => text,
                Err(_) => return Ok(None),
            }
        };
        metadata.insert(key, rendered);
    }
    Ok(Some(metadata))
}
