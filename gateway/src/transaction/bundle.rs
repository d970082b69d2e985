//! Spend bundles: the atomic unit the ledger accepts.
//!
//! The bundle itself is the ledger's `SpendBundle`. What the gateway adds is
//! accounting through a [`ScriptProvider`]: which coins a bundle creates and
//! what fee it leaves, without running a virtual machine.

use crate::chain::{Bytes32, Coin, Condition, SpendBundle};
use crate::crypto::Signature;
use crate::scripts::{ScriptError, ScriptProvider};

pub trait BundleAccounting {
    /// The aggregate signature as a gateway [`Signature`].
    fn signature(&self) -> Signature;

    fn removals(&self) -> Vec<Coin>;

    /// Coins created by the bundle's `CREATE_COIN` conditions.
    fn created_coins(&self, scripts: &dyn ScriptProvider) -> Result<Vec<Coin>, ScriptError>;

    /// Inputs minus outputs.
    fn fees(&self, scripts: &dyn ScriptProvider) -> Result<u64, ScriptError>;

    /// Memos attached to created coins, keyed by the new coin's id.
    fn memos(&self, scripts: &dyn ScriptProvider) -> Result<Vec<(Bytes32, Vec<Vec<u8>>)>, ScriptError>;
}

impl BundleAccounting for SpendBundle {
    fn signature(&self) -> Signature {
        Signature::from(self.aggregated_signature.clone())
    }

    fn removals(&self) -> Vec<Coin> {
        self.coin_spends.iter().map(|spend| spend.coin).collect()
    }

    fn created_coins(&self, scripts: &dyn ScriptProvider) -> Result<Vec<Coin>, ScriptError> {
        let mut additions = Vec::new();
        for spend in &self.coin_spends {
            let parent = spend.coin.coin_id();
            for condition in scripts.conditions(spend)? {
                if let Condition::CreateCoin { puzzle_hash, amount, .. } = condition {
                    additions.push(Coin::new(parent, puzzle_hash, amount));
                }
            }
        }
        Ok(additions)
    }

    fn fees(&self, scripts: &dyn ScriptProvider) -> Result<u64, ScriptError> {
        let removed = total(&self.removals())?;
        let added = total(&self.created_coins(scripts)?)?;
        removed
            .checked_sub(added)
            .ok_or_else(|| ScriptError::Malformed(format!("outputs {added} exceed inputs {removed}")))
    }

    fn memos(&self, scripts: &dyn ScriptProvider) -> Result<Vec<(Bytes32, Vec<Vec<u8>>)>, ScriptError> {
        let mut memos = Vec::new();
        for spend in &self.coin_spends {
            let parent = spend.coin.coin_id();
            for condition in scripts.conditions(spend)? {
                if let Condition::CreateCoin { puzzle_hash, amount, memos: coin_memos } = condition {
                    if !coin_memos.is_empty() {
                        memos.push((Coin::new(parent, puzzle_hash, amount).coin_id(), coin_memos));
                    }
                }
            }
        }
        Ok(memos)
    }
}

fn total(coins: &[Coin]) -> Result<u64, ScriptError> {
    coins
        .iter()
        .try_fold(0u64, |sum, coin| sum.checked_add(coin.amount))
        .ok_or_else(|| ScriptError::Malformed("coin amounts overflow".into()))
}
