//! # Transaction Module
//!
//! Everything needed to turn a gateway operation into one atomic, signed
//! spend bundle.
//!
//! ## Architecture
//!
//! ```text
//! types.rs    Payment, TransactionRequest and TransactionRecord
//! bundle.rs   BundleAccounting: created coins, fees and memos of a bundle
//! signing.rs  Signer: local keys, delegated signatures, partial signing
//! builder.rs  TransactionAssembler: base transaction + gateway spend
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Select** coins through the ledger client.
//! 2. **Assemble** with [`TransactionAssembler::assemble`].
//! 3. **Push**, or hand the partially signed bundle to the counter-party
//!    (detokenization).
//!
//! All amounts are `u64` in the smallest denomination.

pub mod builder;
pub mod bundle;
pub mod signing;
pub mod types;

pub use builder::{metadata_program, AssemblyRequest, GatewayTransaction, TransactionAssembler};
pub use bundle::BundleAccounting;
pub use crate::chain::SpendBundle;
pub use signing::{required_signatures, verify_spend_bundle, Signer};
pub use types::{Payment, TransactionRecord, TransactionRequest};
