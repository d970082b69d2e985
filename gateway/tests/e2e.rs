//! End-to-end tests for the climate gateway.
//!
//! A registry and a client each run their own in-memory ledger, attached to
//! one shared chain. Tokens are minted by the registry, travel to the
//! client, come back through the `detok1…` handshake and are retired,
//! exactly as two independent services would do it. Every pushed bundle is
//! signature-checked by the ledger before it is included.
//!
//! Each test builds its own chain; nothing is shared between tests.

use std::sync::Arc;

use climate_gateway::chain::{tree_hash, Bytes32, SpendBundle};
use climate_gateway::config::{ExecutionMode, GatewayConfig, NetworkConstants, DEFAULT_WALLET_ID};
use climate_gateway::crypto::{SecretKey, Signature};
use climate_gateway::handshake;
use climate_gateway::ledger::memory::{InMemoryLedger, SharedChain};
use climate_gateway::ledger::LedgerClient;
use climate_gateway::ops::{
    ActivitiesRequest, AmountPayment, DetokenizationFileRequest, DetokenizationTxRequest, Gateway,
    PermissionlessRetirementTxRequest, RetirementPayment, TokenizationPayment, TokenizationTxRequest,
};
use climate_gateway::scripts::reference::ReferenceScripts;
use climate_gateway::scripts::ScriptProvider;
use climate_gateway::transaction::{required_signatures, verify_spend_bundle, BundleAccounting};
use climate_gateway::wallet::keys::master_to_root;
use climate_gateway::wallet::Beneficiary;
use climate_gateway::{ClimateWallet, GatewayError, GatewayMode, TokenIndex, TokenOnChain};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const REGISTRY_FUNDS: u64 = 10_000;
const CLIENT_FUNDS: u64 = 100;

/// Two ledgers on one chain, both funded in their standard wallet.
struct Network {
    chain: SharedChain,
    registry_ledger: Arc<InMemoryLedger>,
    client_ledger: Arc<InMemoryLedger>,
    scripts: Arc<ReferenceScripts>,
}

impl Network {
    fn new() -> Self {
        let chain = SharedChain::new();
        let registry_ledger = Arc::new(InMemoryLedger::new(
            SecretKey::from_seed(&[1; 32]),
            NetworkConstants::simulator(),
            chain.clone(),
        ));
        let client_ledger = Arc::new(InMemoryLedger::new(
            SecretKey::from_seed(&[2; 32]),
            NetworkConstants::simulator(),
            chain.clone(),
        ));
        registry_ledger
            .fund(DEFAULT_WALLET_ID, REGISTRY_FUNDS)
            .expect("fund registry");
        client_ledger.fund(DEFAULT_WALLET_ID, CLIENT_FUNDS).expect("fund client");
        Self {
            chain,
            registry_ledger,
            client_ledger,
            scripts: Arc::new(ReferenceScripts::new()),
        }
    }

    fn gateway(&self, execution_mode: ExecutionMode, ledger: &Arc<InMemoryLedger>) -> Gateway {
        let config = GatewayConfig {
            execution_mode,
            wallet_id: DEFAULT_WALLET_ID,
        };
        Gateway::new(config, ledger.clone(), self.scripts.clone())
    }

    fn registry(&self) -> Gateway {
        self.gateway(ExecutionMode::Registry, &self.registry_ledger)
    }

    fn client(&self) -> Gateway {
        self.gateway(ExecutionMode::Client, &self.client_ledger)
    }

    fn explorer(&self) -> Gateway {
        self.gateway(ExecutionMode::Explorer, &self.client_ledger)
    }

    async fn client_puzzle_hash(&self) -> Bytes32 {
        self.client_ledger.first_puzzle_hash().await.expect("client puzzle hash")
    }

    /// Mint `amount` to the client (fee 10) and have the client track the
    /// asset. Returns the published token and the client's asset wallet id.
    async fn mint_to_client(&self, amount: u64) -> (TokenOnChain, u32) {
        let request = TokenizationTxRequest {
            token: token_index(),
            payment: TokenizationPayment {
                to_puzzle_hash: self.client_puzzle_hash().await,
                amount,
                fee: 10,
            },
        };
        let response = self
            .registry()
            .create_tokenization_tx(request)
            .await
            .expect("tokenization");
        let wallet_id = self.client_ledger.add_cat_wallet(response.token.asset_id);
        (response.token, wallet_id)
    }

    fn gateway_puzzle_hash(&self, asset_id: &Bytes32) -> Bytes32 {
        let gateway_hash = tree_hash(&self.scripts.gateway_script().expect("gateway script")).expect("gateway hash");
        self.scripts.tracked_asset_script_hash(asset_id, &gateway_hash)
    }
}

fn token_index() -> TokenIndex {
    TokenIndex::new("org-verra", "project-42", 2023, 1)
}

fn additional_data() -> Bytes32 {
    NetworkConstants::simulator().agg_sig_me_additional_data
}

fn detokenization_request(amount: u64, fee: u64, token: &TokenOnChain) -> DetokenizationFileRequest {
    DetokenizationFileRequest {
        token: token.clone(),
        payment: AmountPayment { amount, fee },
    }
}

// ---------------------------------------------------------------------------
// Test: Tokenization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tokenization_mints_to_the_client() {
    let net = Network::new();
    let (token, cat_wallet) = net.mint_to_client(1_000).await;

    assert_eq!(net.client_ledger.balance(cat_wallet).unwrap(), 1_000);
    assert_eq!(
        net.registry_ledger.balance(DEFAULT_WALLET_ID).unwrap(),
        REGISTRY_FUNDS - 1_000 - 10
    );

    let pushed = net.registry_ledger.pushed();
    assert_eq!(pushed.len(), 1);
    let record = &pushed[0];
    assert_eq!(record.tx_type, 256 + 1);
    assert_eq!(record.amount, 1_000);

    let bundle = record.spend_bundle.as_ref().expect("bundle");
    assert!(verify_spend_bundle(bundle, net.scripts.as_ref(), &additional_data()).unwrap());
    assert_eq!(bundle.fees(net.scripts.as_ref()).unwrap(), 10);

    let minted = net
        .scripts
        .tracked_asset_script_hash(&token.asset_id, &net.client_puzzle_hash().await);
    assert!(record
        .additions
        .iter()
        .any(|coin| coin.puzzle_hash == minted && coin.amount == 1_000));
}

#[tokio::test]
async fn tokenization_spend_demands_delegation_and_mode_key() {
    let net = Network::new();
    let (token, _) = net.mint_to_client(1_000).await;
    let record = &net.registry_ledger.pushed()[0];
    let bundle = record.spend_bundle.as_ref().expect("bundle");

    let gateway_puzzle_hash = net.gateway_puzzle_hash(&token.asset_id);
    let gateway_spend = bundle
        .coin_spends
        .iter()
        .find(|spend| spend.coin.puzzle_hash == gateway_puzzle_hash)
        .expect("gateway spend");
    let (mode, _) = net.scripts.parse_gateway_spend(gateway_spend, true).unwrap();
    assert_eq!(mode, GatewayMode::Tokenization);

    let pairs = required_signatures(gateway_spend, net.scripts.as_ref(), &additional_data()).unwrap();
    assert_eq!(pairs.len(), 2);
    assert!(pairs.contains(&(token.public_key.clone(), token.tokenization.mod_hash.to_vec())));
    let mode_key = token.tokenization.public_key.clone().expect("tokenization key");
    assert!(pairs.iter().any(|(public_key, _)| *public_key == mode_key));
}

#[tokio::test]
async fn published_token_rebuilds_the_same_asset() {
    let net = Network::new();
    let (token, _) = net.mint_to_client(1_000).await;

    assert!(token.tokenization.signature.is_none());
    assert!(token.detokenization.signature.is_some());
    assert!(token.permissionless_retirement.public_key.is_none());

    let client = ClimateWallet::from_token(&token, net.client_ledger.clone(), net.scripts.clone())
        .await
        .expect("client wallet");
    assert_eq!(client.asset_id(), token.asset_id);
    assert_eq!(client.index_hash(), token.index);

    let registry_root = master_to_root(&net.registry_ledger.master_secret_key().await.unwrap());
    assert_eq!(registry_root.public_key(), token.public_key);
}

// ---------------------------------------------------------------------------
// Test: Detokenization Handshake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn detokenization_request_lacks_only_the_registry_signature() {
    let net = Network::new();
    let (token, cat_wallet) = net.mint_to_client(1_000).await;

    let file = net
        .client()
        .create_detokenization_file(token.asset_id, detokenization_request(500, 0, &token))
        .await
        .expect("detokenization file");
    assert!(file.content.starts_with("detok1"));
    assert!(file.tx.record.spend_bundle.is_none());
    // Nothing moves until the registry counter-signs.
    assert!(net.client_ledger.pushed().is_empty());
    assert_eq!(net.client_ledger.balance(cat_wallet).unwrap(), 1_000);

    let bundle = handshake::decode(&file.content).expect("decode");
    assert!(!verify_spend_bundle(&bundle, net.scripts.as_ref(), &additional_data()).unwrap());

    let detokenization_key = token.detokenization.public_key.clone().expect("detokenization key");
    let mut pairs = Vec::new();
    for spend in &bundle.coin_spends {
        pairs.extend(required_signatures(spend, net.scripts.as_ref(), &additional_data()).unwrap());
    }
    let (missing, present): (Vec<_>, Vec<_>) = pairs
        .into_iter()
        .partition(|(public_key, _)| *public_key == detokenization_key);
    assert_eq!(missing.len(), 1);
    assert!(bundle.signature().aggregate_verify(&present));
}

#[tokio::test]
async fn registry_parses_the_request_file() {
    let net = Network::new();
    let (token, _) = net.mint_to_client(1_000).await;
    let file = net
        .client()
        .create_detokenization_file(token.asset_id, detokenization_request(500, 5, &token))
        .await
        .expect("detokenization file");

    let parsed = net
        .registry()
        .parse_detokenization_file(&file.content)
        .expect("parse");
    let summary = parsed.gateway.expect("gateway spend");
    assert_eq!(summary.mode, GatewayMode::Detokenization);
    assert_eq!(summary.asset_id, token.asset_id);
    assert_eq!(summary.amount, 500);
    assert_eq!(summary.fee, 5);
    assert_eq!(summary.from_puzzle_hash, net.client_puzzle_hash().await);
    assert_eq!(
        summary.gateway_coin_spend.coin.puzzle_hash,
        net.gateway_puzzle_hash(&token.asset_id)
    );
}

#[tokio::test]
async fn registry_completes_a_detokenization() {
    let net = Network::new();
    let (token, cat_wallet) = net.mint_to_client(1_000).await;
    let file = net
        .client()
        .create_detokenization_file(token.asset_id, detokenization_request(500, 5, &token))
        .await
        .expect("detokenization file");

    let response = net
        .registry()
        .create_detokenization_tx(
            token.asset_id,
            DetokenizationTxRequest {
                token: token_index(),
                content: file.content.clone(),
            },
        )
        .await
        .expect("detokenization tx");

    let bundle = response.tx.record.spend_bundle.as_ref().expect("bundle");
    assert!(!bundle.signature().is_identity());
    assert!(verify_spend_bundle(bundle, net.scripts.as_ref(), &additional_data()).unwrap());
    assert_eq!(response.tx.record.tx_type, 256 + 2);
    assert_eq!(response.tx.record.amount, 500);
    assert_eq!(response.tx.record.fee_amount, 5);

    assert_eq!(net.client_ledger.balance(cat_wallet).unwrap(), 500);
    assert_eq!(net.client_ledger.balance(DEFAULT_WALLET_ID).unwrap(), CLIENT_FUNDS - 5);
}

#[tokio::test]
async fn request_cannot_be_completed_twice() {
    let net = Network::new();
    let (token, _) = net.mint_to_client(1_000).await;
    let file = net
        .client()
        .create_detokenization_file(token.asset_id, detokenization_request(300, 0, &token))
        .await
        .expect("detokenization file");
    let request = DetokenizationTxRequest {
        token: token_index(),
        content: file.content,
    };

    net.registry()
        .create_detokenization_tx(token.asset_id, request.clone())
        .await
        .expect("first completion");
    let err = net
        .registry()
        .create_detokenization_tx(token.asset_id, request)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Ledger(_)), "{err}");
}

#[tokio::test]
async fn tampered_request_is_invalid_artifact() {
    let net = Network::new();
    let (token, _) = net.mint_to_client(1_000).await;
    let file = net
        .client()
        .create_detokenization_file(token.asset_id, detokenization_request(500, 0, &token))
        .await
        .expect("detokenization file");

    let mut content = file.content;
    let last = content.pop().expect("non-empty");
    content.push(if last == 'q' { 'p' } else { 'q' });

    let err = net
        .registry()
        .create_detokenization_tx(
            token.asset_id,
            DetokenizationTxRequest {
                token: token_index(),
                content,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidArtifact(_)), "{err}");
    assert_eq!(net.registry_ledger.pushed().len(), 1);
}

#[tokio::test]
async fn artifact_roundtrips_through_the_codec() {
    let net = Network::new();
    let (token, _) = net.mint_to_client(1_000).await;
    let file = net
        .client()
        .create_detokenization_file(token.asset_id, detokenization_request(500, 0, &token))
        .await
        .expect("detokenization file");

    let bundle = handshake::decode(&file.content).unwrap();
    assert_eq!(handshake::encode(&bundle).unwrap(), file.content);
    // Surrounding whitespace from a copied file is tolerated.
    assert_eq!(handshake::decode(&format!("  {}\n", file.content)).unwrap(), bundle);
}

// ---------------------------------------------------------------------------
// Test: Permissionless Retirement & Activity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retirement_is_listed_with_its_beneficiary() {
    let net = Network::new();
    let (token, cat_wallet) = net.mint_to_client(1_000).await;

    let beneficiary_puzzle_hash = Bytes32::new([0xab; 32]);
    net.client()
        .create_permissionless_retirement_tx(
            token.asset_id,
            PermissionlessRetirementTxRequest {
                token: token.clone(),
                payment: RetirementPayment {
                    amount: 200,
                    fee: 0,
                    beneficiary_name: Some("Acme Corp".into()),
                    beneficiary_address: Some("Main Street 1".into()),
                    beneficiary_puzzle_hash: Some(beneficiary_puzzle_hash.to_string()),
                },
            },
        )
        .await
        .expect("retirement");
    assert_eq!(net.client_ledger.balance(cat_wallet).unwrap(), 800);

    let retirements = net
        .explorer()
        .list_activities(
            &token,
            ActivitiesRequest {
                mode: Some(GatewayMode::PermissionlessRetirement),
                ..Default::default()
            },
        )
        .await
        .expect("activities");
    assert_eq!(retirements.len(), 1);
    let activity = &retirements[0];
    assert_eq!(activity.amount, 200);
    assert_eq!(activity.asset_id, token.asset_id);
    assert_eq!(activity.vintage_year, 2023);
    assert_eq!(activity.beneficiary_name.as_deref(), Some("Acme Corp"));
    assert_eq!(activity.beneficiary_address.as_deref(), Some("Main Street 1"));
    assert_eq!(
        activity.beneficiary_puzzle_hash,
        Some(format!("0x{beneficiary_puzzle_hash}"))
    );
    assert_eq!(activity.height, net.chain.height());
}

#[tokio::test]
async fn activity_history_covers_every_mode_in_order() {
    let net = Network::new();
    let (token, cat_wallet) = net.mint_to_client(1_000).await;
    let file = net
        .client()
        .create_detokenization_file(token.asset_id, detokenization_request(400, 0, &token))
        .await
        .expect("detokenization file");
    net.registry()
        .create_detokenization_tx(
            token.asset_id,
            DetokenizationTxRequest {
                token: token_index(),
                content: file.content,
            },
        )
        .await
        .expect("detokenization tx");

    let client = ClimateWallet::from_token(&token, net.client_ledger.clone(), net.scripts.clone())
        .await
        .unwrap();
    client
        .retire(100, 0, &Beneficiary::default(), cat_wallet)
        .await
        .expect("retirement");

    let activities = net
        .registry()
        .list_activities(&token, ActivitiesRequest::default())
        .await
        .unwrap();
    let modes: Vec<GatewayMode> = activities.iter().map(|a| a.mode).collect();
    assert_eq!(
        modes,
        [
            GatewayMode::Tokenization,
            GatewayMode::Detokenization,
            GatewayMode::PermissionlessRetirement
        ]
    );
    let amounts: Vec<u64> = activities.iter().map(|a| a.amount).collect();
    assert_eq!(amounts, [1_000, 400, 100]);

    // A beneficiary with neither hash nor address falls back to the
    // retiring wallet's own puzzle hash.
    assert_eq!(
        activities[2].beneficiary_puzzle_hash,
        Some(format!("0x{}", net.client_puzzle_hash().await))
    );

    let before_retirement = net
        .registry()
        .list_activities(
            &token,
            ActivitiesRequest {
                end_height: Some(activities[1].height),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(before_retirement.len(), 2);
}

#[tokio::test]
async fn retirement_without_published_signature_is_missing_authorization() {
    let net = Network::new();
    let (mut token, cat_wallet) = net.mint_to_client(1_000).await;
    token.permissionless_retirement.signature = None;

    let err = net
        .client()
        .create_permissionless_retirement_tx(
            token.asset_id,
            PermissionlessRetirementTxRequest {
                token,
                payment: RetirementPayment {
                    amount: 100,
                    fee: 0,
                    beneficiary_name: None,
                    beneficiary_address: None,
                    beneficiary_puzzle_hash: None,
                },
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::MissingAuthorization { .. }), "{err}");
    assert_eq!(net.client_ledger.balance(cat_wallet).unwrap(), 1_000);
}

#[tokio::test]
async fn malformed_beneficiary_puzzle_hash_is_rejected() {
    let net = Network::new();
    let (token, _) = net.mint_to_client(1_000).await;
    let err = net
        .client()
        .create_permissionless_retirement_tx(
            token.asset_id,
            PermissionlessRetirementTxRequest {
                token,
                payment: RetirementPayment {
                    amount: 100,
                    fee: 0,
                    beneficiary_name: None,
                    beneficiary_address: None,
                    beneficiary_puzzle_hash: Some("0x1234".into()),
                },
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidBeneficiaryAddress(_)), "{err}");
}

// ---------------------------------------------------------------------------
// Test: Rejections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn asset_id_mismatch_rejects_before_spending() {
    let net = Network::new();
    let (token, cat_wallet) = net.mint_to_client(1_000).await;

    let err = net
        .client()
        .create_detokenization_file(Bytes32::new([9; 32]), detokenization_request(500, 0, &token))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::AssetIdMismatch { .. }), "{err}");
    assert!(net.client_ledger.pushed().is_empty());
    assert_eq!(net.client_ledger.balance(cat_wallet).unwrap(), 1_000);
}

#[tokio::test]
async fn insufficient_balance_is_reported() {
    let net = Network::new();
    let (token, _) = net.mint_to_client(1_000).await;

    let err = net
        .client()
        .create_detokenization_file(token.asset_id, detokenization_request(5_000, 0, &token))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InsufficientBalance { amount: 5_000 }), "{err}");

    let err = net
        .registry()
        .create_tokenization_tx(TokenizationTxRequest {
            token: token_index(),
            payment: TokenizationPayment {
                to_puzzle_hash: Bytes32::new([3; 32]),
                amount: REGISTRY_FUNDS,
                fee: 10,
            },
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InsufficientBalance { .. }), "{err}");
}

#[tokio::test]
async fn tokenization_amount_plus_fee_overflow_is_insufficient_balance() {
    let net = Network::new();
    let err = net
        .registry()
        .create_tokenization_tx(TokenizationTxRequest {
            token: token_index(),
            payment: TokenizationPayment {
                to_puzzle_hash: Bytes32::new([3; 32]),
                amount: u64::MAX,
                fee: 1,
            },
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InsufficientBalance { .. }), "{err}");
    assert!(net.registry_ledger.pushed().is_empty());
    assert_eq!(net.registry_ledger.balance(DEFAULT_WALLET_ID).unwrap(), REGISTRY_FUNDS);
}

#[tokio::test]
async fn operations_are_gated_by_role() {
    let net = Network::new();
    let (token, _) = net.mint_to_client(1_000).await;

    let err = net
        .client()
        .create_tokenization_tx(TokenizationTxRequest {
            token: token_index(),
            payment: TokenizationPayment {
                to_puzzle_hash: Bytes32::new([3; 32]),
                amount: 1,
                fee: 0,
            },
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::WrongRole { .. }), "{err}");

    assert!(matches!(
        net.client().parse_detokenization_file("detok1qqqq"),
        Err(GatewayError::WrongRole { .. })
    ));
    let err = net
        .explorer()
        .create_detokenization_file(token.asset_id, detokenization_request(1, 0, &token))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::WrongRole { .. }), "{err}");
}

#[tokio::test]
async fn wallets_refuse_the_other_sides_flows() {
    let net = Network::new();
    let (token, cat_wallet) = net.mint_to_client(1_000).await;

    let client = ClimateWallet::from_token(&token, net.client_ledger.clone(), net.scripts.clone())
        .await
        .unwrap();
    let err = client
        .tokenize(Bytes32::new([3; 32]), 1, 0, DEFAULT_WALLET_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::WrongRole { .. }), "{err}");

    let root = master_to_root(&net.registry_ledger.master_secret_key().await.unwrap());
    let registry = ClimateWallet::create(token_index(), &root, net.registry_ledger.clone(), net.scripts.clone())
        .await
        .unwrap();
    let err = registry
        .retire(1, 0, &Beneficiary::default(), cat_wallet)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::WrongRole { .. }), "{err}");
}

#[tokio::test]
async fn tokenizing_from_an_asset_wallet_is_wrong_wallet_type() {
    let net = Network::new();
    let (token, _) = net.mint_to_client(1_000).await;
    let registry_cat = net.registry_ledger.add_cat_wallet(token.asset_id);

    let root = master_to_root(&net.registry_ledger.master_secret_key().await.unwrap());
    let registry = ClimateWallet::create(token_index(), &root, net.registry_ledger.clone(), net.scripts.clone())
        .await
        .unwrap();
    let err = registry
        .tokenize(Bytes32::new([3; 32]), 1, 0, registry_cat)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::WrongWalletType { .. }), "{err}");
}

// ---------------------------------------------------------------------------
// Test: Aggregation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bundle_aggregation_is_order_independent() {
    let net = Network::new();
    let (token, _) = net.mint_to_client(1_000).await;
    let file = net
        .client()
        .create_detokenization_file(token.asset_id, detokenization_request(500, 0, &token))
        .await
        .expect("detokenization file");
    let unsigned = handshake::decode(&file.content).unwrap();

    let a = SecretKey::from_seed(&[7; 32]).sign(b"a");
    let b = SecretKey::from_seed(&[8; 32]).sign(b"b");
    assert_eq!(Signature::aggregate([&a, &b]), Signature::aggregate([&b, &a]));

    let extra = SpendBundle::new(Vec::new(), a.clone().into());
    let left = SpendBundle::aggregate(&[unsigned.clone(), extra.clone()]);
    let right = SpendBundle::aggregate(&[extra, unsigned.clone()]);
    assert_eq!(left.aggregated_signature, right.aggregated_signature);
    assert_eq!(left.coin_spends.len(), unsigned.coin_spends.len());
}
