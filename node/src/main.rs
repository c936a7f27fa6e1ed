// Copyright (c) 2026 Strata Contributors. MIT License.
// See LICENSE for details.

//! # Strata Vault Node
//!
//! Entry point for the `strata-node` binary. Parses CLI arguments,
//! initializes logging and metrics, builds and seeds an in-memory vault
//! over paper providers, and serves the HTTP API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the vault node
//! - `keygen`  — generate an Ed25519 keypair
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;

use strata_vault::access::StaticAccessGuard;
use strata_vault::crypto::{Address, StrataKeypair};
use strata_vault::provider::PaperProvider;
use strata_vault::vault::{StrataVault, VaultConfig};

use cli::{Commands, StrataNodeCli};
use metrics::VaultMetrics;

/// Broadcast channel capacity for live event streaming.
/// 256 is large enough to absorb short bursts without dropping events
/// for connected WebSocket clients.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = StrataNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen(args) => keygen(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the vault node: seeds the vault, then serves the API and
/// metrics endpoints until shutdown.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "strata_node=info,strata_vault=info,tower_http=debug",
        args.log_format,
    );

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        asset = %args.asset,
        "starting strata-node"
    );

    // --- Operator identity ---
    let operator_keypair = match &args.operator_key {
        Some(hex_key) => StrataKeypair::from_hex(hex_key).context("invalid operator key")?,
        None => {
            let keypair = StrataKeypair::generate();
            tracing::warn!("no operator key provided, generated an ephemeral one");
            keypair
        }
    };
    let operator = operator_keypair.address();
    tracing::info!(operator = %operator, "operator identity loaded");

    // --- Vault ---
    let config = VaultConfig {
        user_deposit_limit: args.user_limit,
        vault_deposit_limit: args.vault_limit,
        min_deposit: args.min_deposit,
        withdraw_fee: args.withdraw_fee,
        treasury: Address::derive("strata/treasury"),
    };
    let mut vault = StrataVault::new(
        &args.asset,
        args.asset_decimals,
        Box::new(PaperProvider::new("paper-a")),
        config,
        Box::new(StaticAccessGuard::single_operator(operator)),
    )
    .context("invalid vault configuration")?;
    vault
        .set_providers(
            &operator,
            vec![
                Box::new(PaperProvider::new("paper-a")),
                Box::new(PaperProvider::new("paper-b")),
            ],
        )
        .context("failed to register providers")?;

    // --- Seeding ---
    // The node issues the seed to the operator and deposits it; the
    // minted shares belong to the vault itself and stay locked forever.
    vault
        .asset_book_mut()
        .issue(&operator, args.seed_amount)
        .context("failed to issue seed assets")?;
    vault
        .seed(&operator, args.seed_amount)
        .context("failed to seed the vault")?;
    vault
        .unpause_all(&operator)
        .context("failed to unpause the vault")?;
    vault.take_events();
    tracing::info!(
        vault = %vault.address(),
        seed = args.seed_amount,
        "vault seeded and open"
    );

    // --- Metrics ---
    let vault_metrics = Arc::new(VaultMetrics::new());
    vault_metrics.refresh(vault.total_assets(), vault.total_supply(), vault.holder_count());

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: "devnet".to_string(),
        vault: Arc::new(RwLock::new(vault)),
        event_tx,
        metrics: Arc::clone(&vault_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&vault_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("strata-node stopped");
    Ok(())
}

/// Generates a fresh Ed25519 keypair and prints (or writes) it.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = StrataKeypair::generate();
    let secret_hex = hex::encode(keypair.secret_key_bytes());

    match &args.out {
        Some(path) => {
            std::fs::write(path, &secret_hex)
                .with_context(|| format!("failed to write key to {}", path.display()))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
            }
            println!("Secret key written to {}", path.display());
        }
        None => {
            println!("Secret key : {}", secret_hex);
        }
    }
    println!("Public key : {}", keypair.public_key().to_hex());
    println!("Address    : {}", keypair.address().to_hex());
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("strata-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
