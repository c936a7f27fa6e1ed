//! # CLI Interface
//!
//! Defines the command-line argument structure for `strata-node` using
//! `clap` derive. Supports three subcommands: `run`, `keygen`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use strata_vault::config::{
    DEFAULT_API_PORT, DEFAULT_ASSET_DECIMALS, DEFAULT_METRICS_PORT, DEFAULT_MIN_DEPOSIT,
};

use crate::logging::LogFormat;

/// Strata vault operator node.
///
/// Runs a single in-memory vault over paper providers, serves the REST
/// API for deposits, withdrawals, permits, and operator actions, and
/// exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "strata-node",
    about = "Strata vault operator node",
    version,
    propagate_version = true
)]
pub struct StrataNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Strata node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the vault node.
    Run(RunArgs),
    /// Generate a fresh Ed25519 keypair and print (or write) it.
    Keygen(KeygenArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the REST API.
    #[arg(long, env = "STRATA_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "STRATA_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Ticker of the pooled asset.
    #[arg(long, default_value = "USDX")]
    pub asset: String,

    /// Decimal precision of the pooled asset.
    #[arg(long, default_value_t = DEFAULT_ASSET_DECIMALS)]
    pub asset_decimals: u8,

    /// Minimum size of a single deposit, in base asset units.
    #[arg(long, default_value_t = DEFAULT_MIN_DEPOSIT)]
    pub min_deposit: u128,

    /// Withdraw fee rate at 1e18 precision (0 = no fee, max 5e16 = 5%).
    #[arg(long, default_value_t = 0)]
    pub withdraw_fee: u128,

    /// Per-user deposit limit in base asset units.
    #[arg(long, default_value_t = 1_000_000_000_000_000_000_000_000)]
    pub user_limit: u128,

    /// Vault-wide deposit limit in base asset units. Must exceed the
    /// per-user limit.
    #[arg(long, default_value_t = 1_000_000_000_000_000_000_000_000_000)]
    pub vault_limit: u128,

    /// Seed amount placed into the vault at startup. The node issues
    /// these assets to itself; the minted shares are unredeemable.
    #[arg(long, default_value_t = DEFAULT_MIN_DEPOSIT)]
    pub seed_amount: u128,

    /// Hex-encoded Ed25519 operator secret key.
    ///
    /// If not provided, a fresh keypair is generated and its address is
    /// logged. **Never pass this flag in production** — use the
    /// environment variable or a key file instead.
    #[arg(long, env = "STRATA_OPERATOR_KEY")]
    pub operator_key: Option<String>,

    /// Log output format.
    #[arg(long, env = "STRATA_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Write the hex-encoded secret key to this file (mode 0600 on Unix)
    /// instead of printing it.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}
