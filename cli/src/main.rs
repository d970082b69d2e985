// Copyright (c) 2026 Climate Gateway Contributors. MIT License.
// See LICENSE for details.

//! # Climate Gateway CLI
//!
//! Entry point for the `climate-gateway` binary. Parses CLI arguments,
//! initializes logging and dispatches:
//!
//! - `keys`: derive a token's public metadata from a root key
//! - `parse-file`: inspect a `detok1…` request file
//! - `simulate`: run a full registry/client cycle on an in-memory ledger
//! - `version`: print build version information
//!
//! Command output is JSON on stdout; logs go to stderr.

mod cli;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use climate_gateway::config::{
    ExecutionMode, GatewayConfig, NetworkConstants, DEFAULT_WALLET_ID, DETOKENIZATION_HRP,
};
use climate_gateway::crypto::SecretKey;
use climate_gateway::handshake::parse_detokenization_request;
use climate_gateway::ledger::memory::{InMemoryLedger, SharedChain};
use climate_gateway::ledger::LedgerClient;
use climate_gateway::ops::{
    ActivitiesRequest, AmountPayment, DetokenizationFileRequest, DetokenizationTxRequest, Gateway,
    PermissionlessRetirementTxRequest, RetirementPayment, TokenizationPayment, TokenizationTxRequest,
};
use climate_gateway::scripts::reference::ReferenceScripts;
use climate_gateway::{ClimateWallet, TokenIndex};

use cli::{Commands, GatewayCli, KeysArgs, ParseFileArgs, SimulateArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = GatewayCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Keys(args) => derive_keys(args).await,
        Commands::ParseFile(args) => parse_file(args),
        Commands::Simulate(args) => simulate(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("failed to render output")?);
    Ok(())
}

/// Prints the `TokenOnChain` record a registry would publish for a token.
async fn derive_keys(args: KeysArgs) -> Result<()> {
    let root_key = SecretKey::from_hex(args.root_key.trim()).context("invalid root key")?;
    let constants = NetworkConstants::by_name(&args.network)
        .with_context(|| format!("unknown network: {}", args.network))?;
    let token = args.token;
    let index = TokenIndex::new(
        token.org_uid,
        token.warehouse_project_id,
        token.vintage_year,
        token.sequence_num,
    );

    // Offline: the ledger only supplies network constants.
    let ledger = Arc::new(InMemoryLedger::new(SecretKey::generate(), constants, SharedChain::new()));
    let wallet = ClimateWallet::create(index, &root_key, ledger, Arc::new(ReferenceScripts::new()))
        .await
        .context("failed to create registry wallet")?;
    print_json(&wallet.token_on_chain()?)
}

fn parse_file(args: ParseFileArgs) -> Result<()> {
    let content = match (args.content, args.file) {
        (Some(content), _) => content,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("either --content or --file is required"),
    };
    let parsed = parse_detokenization_request(&content, &ReferenceScripts::new())
        .context("failed to parse detokenization file")?;
    if parsed.gateway.is_none() {
        tracing::warn!("request carries no gateway spend");
    }
    print_json(&parsed)
}

/// Runs tokenize, request detokenization, complete, retire and scan with a
/// registry and a client on one in-memory chain. Prints the activity list.
async fn simulate(args: SimulateArgs) -> Result<()> {
    let (registry_funds, client_funds) = args.funding()?;

    let chain = SharedChain::new();
    let scripts = Arc::new(ReferenceScripts::new());
    let registry_ledger = Arc::new(InMemoryLedger::new(
        SecretKey::generate(),
        NetworkConstants::simulator(),
        chain.clone(),
    ));
    let client_ledger = Arc::new(InMemoryLedger::new(
        SecretKey::generate(),
        NetworkConstants::simulator(),
        chain.clone(),
    ));
    registry_ledger.fund(DEFAULT_WALLET_ID, registry_funds)?;
    if client_funds > 0 {
        client_ledger.fund(DEFAULT_WALLET_ID, client_funds)?;
    }

    let registry = Gateway::new(GatewayConfig::default(), registry_ledger.clone(), scripts.clone());
    let client = Gateway::new(
        GatewayConfig {
            execution_mode: ExecutionMode::Client,
            wallet_id: DEFAULT_WALLET_ID,
        },
        client_ledger.clone(),
        scripts,
    );
    let index = TokenIndex::new("simulated-org", "simulated-project", 2024, 0);

    // --- Tokenization ---
    let tokenization = registry
        .create_tokenization_tx(TokenizationTxRequest {
            token: index.clone(),
            payment: TokenizationPayment {
                to_puzzle_hash: client_ledger.first_puzzle_hash().await?,
                amount: args.amount,
                fee: args.fee,
            },
        })
        .await
        .context("tokenization failed")?;
    let token = tokenization.token;
    let asset_id = token.asset_id;
    client_ledger.add_cat_wallet(asset_id);
    tracing::info!(%asset_id, tx = %tokenization.tx.id, "minted to client");

    // --- Detokenization handshake ---
    let file = client
        .create_detokenization_file(
            asset_id,
            DetokenizationFileRequest {
                token: token.clone(),
                payment: AmountPayment {
                    amount: args.detokenize,
                    fee: args.fee,
                },
            },
        )
        .await
        .context("detokenization request failed")?;
    tracing::info!(chars = file.content.len(), "client produced request file");

    let parsed = registry.parse_detokenization_file(&file.content)?;
    if let Some(summary) = &parsed.gateway {
        tracing::info!(mode = %summary.mode, amount = summary.amount, fee = summary.fee, "registry inspected request");
    }
    let detokenization = registry
        .create_detokenization_tx(
            asset_id,
            DetokenizationTxRequest {
                token: index,
                content: file.content,
            },
        )
        .await
        .context("detokenization completion failed")?;
    tracing::info!(tx = %detokenization.tx.id, "registry completed detokenization");

    // --- Retirement ---
    let retirement = client
        .create_permissionless_retirement_tx(
            asset_id,
            PermissionlessRetirementTxRequest {
                token: token.clone(),
                payment: RetirementPayment {
                    amount: args.retire,
                    fee: args.fee,
                    beneficiary_name: Some(args.beneficiary_name),
                    beneficiary_address: None,
                    beneficiary_puzzle_hash: None,
                },
            },
        )
        .await
        .context("retirement failed")?;
    tracing::info!(tx = %retirement.tx.id, "client retired");

    let activities = client
        .list_activities(&token, ActivitiesRequest::default())
        .await
        .context("activity scan failed")?;
    tracing::info!(height = chain.height(), activities = activities.len(), "simulation finished");
    print_json(&activities)
}

fn print_version() {
    println!("climate-gateway {}", env!("CARGO_PKG_VERSION"));
    println!("artifact prefix {}1", DETOKENIZATION_HRP);
}
