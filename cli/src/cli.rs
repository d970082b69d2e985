//! # CLI Interface
//!
//! Command-line structure of the `climate-gateway` binary, built with
//! `clap` derive. Four subcommands: `keys`, `parse-file`, `simulate` and
//! `version`.

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Climate gateway operator tool.
///
/// Derives the public metadata of a token from a registry root key,
/// inspects detokenization request files, and runs a full
/// mint/burn/retire cycle against an in-memory ledger.
#[derive(Parser, Debug)]
#[command(
    name = "climate-gateway",
    about = "Climate gateway operator tool",
    version,
    propagate_version = true
)]
pub struct GatewayCli {
    /// Log output format.
    #[arg(long, global = true, env = "CLIMATE_GATEWAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, global = true, env = "CLIMATE_GATEWAY_LOG", default_value = "climate_gateway=info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive mode keys and print the token's on-chain metadata.
    Keys(KeysArgs),
    /// Decode a detokenization request file and summarise it.
    ParseFile(ParseFileArgs),
    /// Tokenize, request detokenization, complete it, retire and scan,
    /// all on an in-memory ledger.
    Simulate(SimulateArgs),
    /// Print version information and exit.
    Version,
}

/// The four fields identifying a token lineage.
#[derive(Args, Debug, Clone)]
pub struct TokenArgs {
    #[arg(long, env = "CLIMATE_GATEWAY_ORG_UID")]
    pub org_uid: String,

    #[arg(long, env = "CLIMATE_GATEWAY_WAREHOUSE_PROJECT_ID")]
    pub warehouse_project_id: String,

    #[arg(long)]
    pub vintage_year: u32,

    #[arg(long, default_value_t = 0)]
    pub sequence_num: u32,
}

#[derive(Args, Debug)]
pub struct KeysArgs {
    /// Hex-encoded climate root secret key.
    ///
    /// Prefer the environment variable over the flag so the key stays out
    /// of shell history.
    #[arg(long, env = "CLIMATE_GATEWAY_ROOT_KEY", hide_env_values = true)]
    pub root_key: String,

    /// Network whose domain-separation constants apply.
    #[arg(long, env = "CLIMATE_GATEWAY_NETWORK", default_value = "mainnet")]
    pub network: String,

    #[command(flatten)]
    pub token: TokenArgs,
}

#[derive(Args, Debug)]
pub struct ParseFileArgs {
    /// Artifact text (`detok1…`).
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub content: Option<String>,

    /// File containing the artifact text.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Amount minted to the client.
    #[arg(long, default_value_t = 1_000)]
    pub amount: u64,

    /// Fee paid by each transaction that needs one.
    #[arg(long, default_value_t = 10)]
    pub fee: u64,

    /// Amount the client asks the registry to detokenize.
    #[arg(long, default_value_t = 500)]
    pub detokenize: u64,

    /// Amount the client retires.
    #[arg(long, default_value_t = 200)]
    pub retire: u64,

    /// Beneficiary recorded with the retirement.
    #[arg(long, default_value = "Example Beneficiary")]
    pub beneficiary_name: String,
}

impl SimulateArgs {
    /// Standard-wallet funds for the registry and the client. The client
    /// pays the detokenization and retirement fees.
    pub fn funding(&self) -> Result<(u64, u64)> {
        let burned = self
            .detokenize
            .checked_add(self.retire)
            .context("detokenize + retire overflows")?;
        ensure!(
            burned <= self.amount,
            "detokenize + retire ({burned}) exceeds the minted amount ({})",
            self.amount
        );
        let registry = self.amount.checked_add(self.fee).context("amount + fee overflows")?;
        let client = self.fee.checked_mul(2).context("client fee budget overflows")?;
        Ok((registry, client))
    }
}
