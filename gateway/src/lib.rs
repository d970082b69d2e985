// Copyright (c) 2026 Climate Gateway Contributors. MIT License.
// See LICENSE for details.

//! # Climate Gateway: Core Library
//!
//! A wallet for carbon-credit tokens that exist on a coin-set ledger as a
//! tracked asset. Every token lineage is minted, burned and retired through
//! one script, the **gateway**, and every gateway spend is authorized by a
//! registry root key that signed its consent once, up front, per mode.
//!
//! Two parties use it:
//!
//! - the **registry** mints tokens and counter-signs burn requests;
//! - **clients** hold tokens, request burns through an offline text
//!   artifact, and retire tokens on their own.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants, network constants, execution modes.
//! - **crypto**: BLS keys, signatures and aggregation; SHA-256.
//! - **chain**: Ledger coin and spend types, CLVM helpers and conditions.
//! - **scripts**: The spend-script provider seam and a reference provider.
//! - **ledger**: The ledger-client seam and an in-memory ledger.
//! - **transaction**: Spend bundles, signing, gateway transaction assembly.
//! - **wallet**: Mode keys, registry and client flows.
//! - **handshake**: The `detok1…` artifact and its inspection.
//! - **activity**: Chain history of a token's gateway spends.
//! - **ops**: Role-gated operations with request/response types.
//!
//! ## Ground Rules
//!
//! 1. One gateway spend per transaction, atomic with the transfer that
//!    funds it.
//! 2. Secret keys never leave the wallet and are never logged.
//! 3. Nothing is retried; every failure is a typed [`GatewayError`].

pub mod activity;
pub mod chain;
pub mod config;
pub mod crypto;
mod encoding;
pub mod error;
pub mod handshake;
pub mod ledger;
pub mod ops;
pub mod scripts;
pub mod transaction;
pub mod wallet;

pub use error::{GatewayError, Result};
pub use wallet::token::{GatewayMode, TokenIndex, TokenOnChain};
pub use wallet::ClimateWallet;
