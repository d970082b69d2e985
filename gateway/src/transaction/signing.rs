//! Signature aggregation for gateway spends.
//!
//! A spend requires one signature per (public key, message) pair implied by
//! its conditions. The [`Signer`] satisfies each pair from, in order:
//!
//! 1. a local secret key for that public key,
//! 2. a delegated signature issued earlier for exactly that pair,
//! 3. nothing: either `MissingAuthorization` or, when the caller allows
//!    missing pairs, the identity element (someone else signs later).
//!
//! Contributions are aggregated; pairs are never reordered or rewritten.

use std::collections::HashMap;

use tracing::debug;

use super::BundleAccounting;
use crate::chain::{Bytes32, CoinSpend, SpendBundle};
use crate::crypto::{PublicKey, SecretKey, Signature};
use crate::error::{GatewayError, Result};
use crate::scripts::ScriptProvider;

/// Every (public key, message) pair a spend needs signed, with coin binding
/// and network domain separation applied.
pub fn required_signatures(
    coin_spend: &CoinSpend,
    scripts: &dyn ScriptProvider,
    additional_data: &Bytes32,
) -> Result<Vec<(PublicKey, Vec<u8>)>> {
    let coin_id = coin_spend.coin.coin_id();
    Ok(scripts
        .conditions(coin_spend)?
        .iter()
        .filter_map(|condition| condition.signature_requirement(&coin_id, additional_data))
        .collect())
}

/// Check a bundle's aggregate signature against the pairs of all its spends.
pub fn verify_spend_bundle(
    bundle: &SpendBundle,
    scripts: &dyn ScriptProvider,
    additional_data: &Bytes32,
) -> Result<bool> {
    let mut pairs = Vec::new();
    for spend in &bundle.coin_spends {
        pairs.extend(required_signatures(spend, scripts, additional_data)?);
    }
    Ok(bundle.signature().aggregate_verify(&pairs))
}

/// Keys and delegations available to authorize a spend.
#[derive(Clone, Debug, Default)]
pub struct Signer {
    secret_keys: HashMap<PublicKey, SecretKey>,
    delegated: HashMap<(PublicKey, Vec<u8>), Signature>,
}

impl Signer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret_key(mut self, secret_key: SecretKey) -> Self {
        self.secret_keys.insert(secret_key.public_key(), secret_key);
        self
    }

    /// Register a signature that is valid only for this exact pair.
    pub fn with_delegation(mut self, public_key: PublicKey, message: Vec<u8>, signature: Signature) -> Self {
        self.delegated.insert((public_key, message), signature);
        self
    }

    pub fn has_secret_key(&self, public_key: &PublicKey) -> bool {
        self.secret_keys.contains_key(public_key)
    }

    /// Aggregate signature covering every pair of `coin_spend` this signer
    /// can satisfy.
    pub fn authorize(
        &self,
        coin_spend: &CoinSpend,
        scripts: &dyn ScriptProvider,
        additional_data: &Bytes32,
        allow_missing: bool,
    ) -> Result<Signature> {
        let pairs = required_signatures(coin_spend, scripts, additional_data)?;
        let mut contributions = Vec::with_capacity(pairs.len());

        for (public_key, message) in pairs {
            if let Some(secret_key) = self.secret_keys.get(&public_key) {
                debug!(public_key = %public_key, "signing with local key");
                contributions.push(secret_key.sign(&message));
                continue;
            }
            let pair = (public_key, message);
            if let Some(signature) = self.delegated.get(&pair) {
                debug!(public_key = %pair.0, "using delegated signature");
                contributions.push(signature.clone());
                continue;
            }
            if allow_missing {
                debug!(public_key = %pair.0, "leaving pair for another signer");
                continue;
            }
            return Err(GatewayError::MissingAuthorization {
                public_key: pair.0.to_hex(),
            });
        }

        Ok(Signature::aggregate(&contributions))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
