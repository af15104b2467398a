// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Star Registry Node
//!
//! Entry point for the `star-node` binary. Parses CLI arguments, initializes
//! logging and metrics, opens the database and serves the HTTP API.
//!
//! The binary supports five subcommands:
//!
//! - `run`    : serve the registry API and metrics
//! - `init`   : create the data directory and write the genesis block
//! - `keygen` : generate a key to register stars with
//! - `sign`   : sign a validation challenge with a WIF key
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use star_registry::clock::SystemClock;
use star_registry::config::{RegistryConfig, PROTOCOL_VERSION};
use star_registry::crypto::{sign_message, Network, StarKeypair};
use star_registry::storage::db::StarDB;
use star_registry::RegistryService;

use cli::{Commands, StarNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = StarNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args, cli.log_format).await,
        Commands::Init(args) => init_node(args, cli.log_format),
        Commands::Keygen(args) => {
            keygen(args);
            Ok(())
        }
        Commands::Sign(args) => sign(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Opens the database at `data_dir`, creating the directory if needed.
fn open_database(data_dir: &Path) -> Result<StarDB> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
    let db = StarDB::open(data_dir)
        .with_context(|| format!("failed to open database at {}", data_dir.display()))?;
    tracing::info!(path = %data_dir.display(), "database opened");
    Ok(db)
}

/// Starts the registry node: API server plus metrics endpoint.
async fn run_node(args: cli::RunArgs, log_format: LogFormat) -> Result<()> {
    logging::init_logging(logging::RUN_DIRECTIVES, log_format);

    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting star-node"
    );

    // --- Persistent storage ---
    let db = open_database(&args.data_dir)?;

    // --- Registry ---
    let mut config = RegistryConfig::default();
    if let Some(window) = args.validation_window {
        config.validation_window_secs = window;
    }
    let service = RegistryService::open(&db, Arc::new(SystemClock), config);
    let genesis = service
        .initialize()
        .context("failed to initialize the chain")?;
    tracing::info!(hash = %genesis.hash, "chain ready");

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            PROTOCOL_VERSION,
        ),
        service: Arc::new(service),
        metrics: Arc::clone(&node_metrics),
    };
    app_state.refresh_gauges();

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
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
            tracing::info!("shutdown signal received");
        }
    }

    db.flush().context("failed to flush database on shutdown")?;
    tracing::info!("star-node stopped");
    Ok(())
}

/// Creates the data directory and writes the genesis block.
fn init_node(args: cli::InitArgs, log_format: LogFormat) -> Result<()> {
    logging::init_logging(logging::COMMAND_DIRECTIVES, log_format);

    let db = open_database(&args.data_dir)?;
    let service = RegistryService::open(&db, Arc::new(SystemClock), RegistryConfig::default());
    let genesis = service
        .initialize()
        .context("failed to write genesis block")?;
    db.flush().context("failed to flush database")?;

    println!("Registry initialized.");
    println!("  Data directory : {}", args.data_dir.display());
    println!("  Genesis hash   : {}", genesis.hash);
    println!("  Genesis time   : {}", genesis.time);

    Ok(())
}

/// Generates a key and prints it. The key is never written to disk.
fn keygen(args: cli::KeygenArgs) {
    let mut keypair = StarKeypair::generate();
    if args.testnet {
        // Same secret, testnet encoding.
        let secret = keypair.signing_key().to_bytes();
        if let Ok(testnet) = StarKeypair::from_secret_bytes(&secret, Network::Testnet) {
            keypair = testnet;
        }
    }

    println!("Address : {}", keypair.address());
    println!("WIF     : {}", keypair.to_wif());
}

/// Signs a message the way a wallet's "Sign message" would and prints the
/// base64 signature.
fn sign(args: cli::SignArgs) -> Result<()> {
    let keypair = StarKeypair::from_wif(&args.wif).context("could not decode WIF key")?;
    let signature =
        sign_message(&keypair, &args.message).context("failed to sign message")?;
    println!("{}", signature);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("star-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
