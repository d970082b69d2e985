//! Inspection of a detokenization request before counter-signing it.

use serde::Serialize;
use tracing::debug;

use super::codec;
use crate::chain::{tree_hash, Bytes32, CoinSpend, SpendBundle};
use crate::error::{GatewayError, Result};
use crate::scripts::ScriptProvider;
use crate::transaction::BundleAccounting;
use crate::wallet::token::GatewayMode;

/// What a request burns, recovered from its gateway spend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DetokenizationSummary {
    pub mode: GatewayMode,
    pub asset_id: Bytes32,
    /// Inner script hash of the coin the burned amount came from.
    pub from_puzzle_hash: Bytes32,
    pub amount: u64,
    pub fee: u64,
    pub gateway_coin_spend: CoinSpend,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParsedDetokenization {
    pub spend_bundle: SpendBundle,
    /// `None` when the bundle holds no gateway spend.
    pub gateway: Option<DetokenizationSummary>,
}

/// Decode an artifact and summarise its gateway spend.
///
/// The origin coin (parent of the gateway coin) must be spent in the same
/// bundle; otherwise the artifact is `InvalidArtifact`.
pub fn parse_detokenization_request(content: &str, scripts: &dyn ScriptProvider) -> Result<ParsedDetokenization> {
    let spend_bundle = codec::decode(content)?;
    let gateway_script = scripts.gateway_script()?;

    let gateway = spend_bundle.coin_spends.iter().find_map(|spend| {
        let (asset_id, inner) = scripts.match_tracked_asset(&spend.puzzle_reveal)?;
        (inner == gateway_script).then_some((asset_id, spend))
    });
    let Some((asset_id, gateway_spend)) = gateway else {
        debug!(spends = spend_bundle.coin_spends.len(), "artifact holds no gateway spend");
        return Ok(ParsedDetokenization {
            spend_bundle,
            gateway: None,
        });
    };
    let (mode, _) = scripts.parse_gateway_spend(gateway_spend, true)?;

    let origin_id = gateway_spend.coin.parent_coin_info;
    let (_, origin_inner) = spend_bundle
        .coin_spends
        .iter()
        .find(|spend| spend.coin.coin_id() == origin_id)
        .and_then(|origin| scripts.match_tracked_asset(&origin.puzzle_reveal))
        .ok_or_else(|| GatewayError::InvalidArtifact(format!("origin coin {origin_id} is not spent by the request")))?;
    let from_puzzle_hash = tree_hash(&origin_inner)?;

    let amount = gateway_spend.coin.amount;
    let fee = spend_bundle
        .fees(scripts)?
        .checked_sub(amount)
        .ok_or_else(|| GatewayError::InvalidArtifact("request burns less than its gateway amount".into()))?;

    let summary = DetokenizationSummary {
        mode,
        asset_id,
        from_puzzle_hash,
        amount,
        fee,
        gateway_coin_spend: gateway_spend.clone(),
    };
    Ok(ParsedDetokenization {
        spend_bundle,
        gateway: Some(summary),
    })
}
