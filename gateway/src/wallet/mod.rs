//! # Climate Wallet
//!
//! A [`ClimateWallet`] operates on exactly one token lineage. It comes in
//! two flavours that share this type but hold different [`WalletKeys`]:
//!
//! - **registry** ([`ClimateWallet::create`]): owns the root key's mode
//!   keys, mints, and counter-signs detokenization requests
//!   (see [`registry`]);
//! - **client** ([`ClimateWallet::from_token`]): holds only the published
//!   delegations, requests detokenization and retires (see [`client`]).
//!
//! Flows are strictly sequential: select coins, assemble, authorize,
//! submit. Nothing is retried.

pub mod client;
pub mod keys;
pub mod registry;
pub mod token;

use std::sync::Arc;

use tracing::info;

use crate::chain::{tree_hash, Bytes32, Program};
use crate::config::NetworkConstants;
use crate::crypto::{PublicKey, SecretKey};
use crate::error::{GatewayError, Result};
use crate::ledger::LedgerClient;
use crate::scripts::ScriptProvider;
use crate::transaction::{Signer, TransactionAssembler};

use self::keys::{derive_mode_keys, Delegation, ModeKeys, WalletKeys};
use self::token::{GatewayMode, TokenIndex, TokenOnChain};

pub use self::client::Beneficiary;

pub struct ClimateWallet {
    token_index: TokenIndex,
    root_public_key: PublicKey,
    keys: WalletKeys,
    issuance_script: Program,
    asset_id: Bytes32,
    ledger: Arc<dyn LedgerClient>,
    scripts: Arc<dyn ScriptProvider>,
    constants: NetworkConstants,
}

impl ClimateWallet {
    /// Registry wallet. Derives every mode key and signs every delegation.
    pub async fn create(
        token_index: TokenIndex,
        root_key: &SecretKey,
        ledger: Arc<dyn LedgerClient>,
        scripts: Arc<dyn ScriptProvider>,
    ) -> Result<Self> {
        let root_public_key = root_key.public_key();
        let issuance_script = scripts.issuance_script(&root_public_key, &token_index.index_hash())?;
        let asset_id = tree_hash(&issuance_script)?;
        info!(
            token = %token_index,
            index_hash = %token_index.index_hash(),
            %asset_id,
            "creating registry climate wallet"
        );

        let keys = WalletKeys::Registry(derive_mode_keys(root_key, &token_index, scripts.as_ref())?);
        let constants = ledger.network_constants().await?;
        Ok(Self {
            token_index,
            root_public_key,
            keys,
            issuance_script,
            asset_id,
            ledger,
            scripts,
            constants,
        })
    }

    /// Client wallet from the metadata a registry published for a token.
    ///
    /// Fails with `AssetIdMismatch` when the published asset id is not the
    /// one the token's fields and root key derive.
    pub async fn from_token(
        token: &TokenOnChain,
        ledger: Arc<dyn LedgerClient>,
        scripts: Arc<dyn ScriptProvider>,
    ) -> Result<Self> {
        let token_index = token.token_index();
        let issuance_script = scripts.issuance_script(&token.public_key, &token_index.index_hash())?;
        let computed = tree_hash(&issuance_script)?;
        if computed != token.asset_id {
            return Err(GatewayError::AssetIdMismatch {
                expected: token.asset_id,
                computed,
            });
        }

        let delegations = ModeKeys::from_fn(|mode| Delegation::from_metadata(mode, token.mode(mode)));
        let constants = ledger.network_constants().await?;
        info!(token = %token_index, asset_id = %computed, "creating client climate wallet");
        Ok(Self {
            token_index,
            root_public_key: token.public_key.clone(),
            keys: WalletKeys::Client(delegations),
            issuance_script,
            asset_id: computed,
            ledger,
            scripts,
            constants,
        })
    }

    pub fn token_index(&self) -> &TokenIndex {
        &self.token_index
    }

    pub fn index_hash(&self) -> Bytes32 {
        self.token_index.index_hash()
    }

    pub fn root_public_key(&self) -> &PublicKey {
        &self.root_public_key
    }

    pub fn keys(&self) -> &WalletKeys {
        &self.keys
    }

    pub fn issuance_script(&self) -> &Program {
        &self.issuance_script
    }

    pub fn asset_id(&self) -> Bytes32 {
        self.asset_id
    }

    pub fn constants(&self) -> &NetworkConstants {
        &self.constants
    }

    pub fn is_registry(&self) -> bool {
        self.keys.is_registry()
    }

    /// Metadata a client needs to build its wallet for this token. Only the
    /// registry can produce it. The tokenization delegation is published
    /// without its signature.
    pub fn token_on_chain(&self) -> Result<TokenOnChain> {
        let keys = match &self.keys {
            WalletKeys::Registry(keys) => keys,
            WalletKeys::Client(_) => return Err(self.wrong_role("token-on-chain")),
        };
        Ok(TokenOnChain {
            index: self.index_hash(),
            public_key: self.root_public_key.clone(),
            asset_id: self.asset_id(),
            org_uid: self.token_index.org_uid.clone(),
            warehouse_project_id: self.token_index.warehouse_project_id.clone(),
            vintage_year: self.token_index.vintage_year,
            sequence_num: self.token_index.sequence_num,
            tokenization: keys.tokenization.delegation.to_metadata(false),
            detokenization: keys.detokenization.delegation.to_metadata(true),
            permissionless_retirement: keys.permissionless_retirement.delegation.to_metadata(true),
        })
    }

    // -----------------------------------------------------------------------
    // Internals shared by the flows
    // -----------------------------------------------------------------------

    pub(crate) fn ledger(&self) -> &dyn LedgerClient {
        self.ledger.as_ref()
    }

    pub(crate) fn scripts(&self) -> &dyn ScriptProvider {
        self.scripts.as_ref()
    }

    pub(crate) fn assembler(&self) -> TransactionAssembler<'_> {
        TransactionAssembler::new(
            self.ledger.as_ref(),
            self.scripts.as_ref(),
            &self.constants,
            &self.issuance_script,
        )
    }

    /// Signer holding every delegation of this wallet, plus the mode secret
    /// key when `mode` is given and the wallet is a registry.
    pub(crate) fn signer(&self, mode: Option<GatewayMode>) -> Signer {
        let mut signer = Signer::new();
        for delegation in self.keys.delegations() {
            signer = signer.with_delegation(
                self.root_public_key.clone(),
                delegation.message.to_vec(),
                delegation.signature.clone(),
            );
        }
        if let Some(secret_key) = mode.and_then(|mode| self.keys.secret_key(mode)) {
            signer = signer.with_secret_key(secret_key.clone());
        }
        signer
    }

    pub(crate) fn mode_secret_key(&self, operation: &'static str, mode: GatewayMode) -> Result<&SecretKey> {
        self.keys
            .secret_key(mode)
            .ok_or_else(|| self.wrong_role(operation))
    }

    pub(crate) fn ensure_client(&self, operation: &'static str) -> Result<()> {
        if self.is_registry() {
            return Err(self.wrong_role(operation));
        }
        Ok(())
    }

    fn wrong_role(&self, operation: &'static str) -> GatewayError {
        GatewayError::WrongRole {
            operation,
            role: if self.is_registry() { "registry" } else { "client" }.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::{InMemoryLedger, SharedChain};
    use crate::scripts::reference::ReferenceScripts;

    fn ledger() -> Arc<InMemoryLedger> {
        Arc::new(InMemoryLedger::new(
            SecretKey::from_seed(&[40; 32]),
            NetworkConstants::simulator(),
            SharedChain::new(),
        ))
    }

    async fn registry() -> ClimateWallet {
        ClimateWallet::create(
            TokenIndex::new("org", "project", 2021, 1),
            &SecretKey::from_seed(&[41; 32]),
            ledger(),
            Arc::new(ReferenceScripts::new()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn registry_publishes_a_token_clients_accept() {
        let registry = registry().await;
        let token = registry.token_on_chain().unwrap();
        assert!(token.tokenization.signature.is_none());
        assert!(token.detokenization.signature.is_some());
        assert!(token.permissionless_retirement.public_key.is_none());

        let client = ClimateWallet::from_token(&token, ledger(), Arc::new(ReferenceScripts::new()))
            .await
            .unwrap();
        assert!(!client.is_registry());
        assert_eq!(client.asset_id(), registry.asset_id());
        assert_eq!(client.index_hash(), registry.index_hash());
        assert!(client.keys().delegation(GatewayMode::Tokenization).is_none());
        assert!(client.keys().delegation(GatewayMode::PermissionlessRetirement).is_some());
    }

    #[tokio::test]
    async fn tampered_token_is_asset_id_mismatch() {
        let mut token = registry().await.token_on_chain().unwrap();
        token.sequence_num += 1;
        let err = ClimateWallet::from_token(&token, ledger(), Arc::new(ReferenceScripts::new()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GatewayError::AssetIdMismatch { .. }));
    }

    #[tokio::test]
    async fn client_cannot_publish_or_use_mode_keys() {
        let token = registry().await.token_on_chain().unwrap();
        let client = ClimateWallet::from_token(&token, ledger(), Arc::new(ReferenceScripts::new()))
            .await
            .unwrap();
        assert!(matches!(client.token_on_chain(), Err(GatewayError::WrongRole { .. })));
        assert!(client
            .mode_secret_key("tokenize", GatewayMode::Tokenization)
            .is_err());
        assert!(client.ensure_client("retire").is_ok());
    }

    #[tokio::test]
    async fn registry_signer_holds_the_mode_key() {
        let registry = registry().await;
        let pk = registry.keys().public_key(GatewayMode::Detokenization).unwrap();
        assert!(registry.signer(Some(GatewayMode::Detokenization)).has_secret_key(&pk));
        assert!(!registry.signer(None).has_secret_key(&pk));
        assert_eq!(registry.constants(), &NetworkConstants::simulator());
    }
}
