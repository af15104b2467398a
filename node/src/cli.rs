//! # CLI Interface
//!
//! Defines the command-line argument structure for `star-node` using
//! `clap` derive. Supports five subcommands: `run`, `init`, `keygen`,
//! `sign`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use star_registry::config::{DEFAULT_DB_LOCATION, DEFAULT_METRICS_PORT, DEFAULT_PORT};

use crate::logging::LogFormat;

/// Star registry node.
///
/// Serves the star registry HTTP API over a local sled database, and ships
/// the wallet-side helpers needed to answer a validation challenge.
#[derive(Parser, Debug)]
#[command(
    name = "star-node",
    about = "Star registry node",
    version,
    propagate_version = true
)]
pub struct StarNodeCli {
    /// Log output format.
    #[arg(long, global = true, env = "STAR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the star node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the registry node.
    Run(RunArgs),
    /// Initialize a data directory and write the genesis block.
    Init(InitArgs),
    /// Generate a secp256k1 key and print its WIF and address.
    Keygen(KeygenArgs),
    /// Sign a challenge message with a WIF key.
    Sign(SignArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the sled database directory.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "STAR_DATA_DIR", default_value = DEFAULT_DB_LOCATION)]
    pub data_dir: PathBuf,

    /// Port for the REST API.
    #[arg(long, short = 'p', env = "STAR_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "STAR_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Seconds a validation challenge stays signable.
    #[arg(
        long,
        env = "STAR_VALIDATION_WINDOW",
        value_parser = clap::value_parser!(u64).range(1..=i64::MAX as u64)
    )]
    pub validation_window: Option<u64>,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "STAR_DATA_DIR", default_value = DEFAULT_DB_LOCATION)]
    pub data_dir: PathBuf,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Emit a testnet key and address.
    #[arg(long)]
    pub testnet: bool,
}

/// Arguments for the `sign` subcommand.
#[derive(Parser, Debug)]
pub struct SignArgs {
    /// Message to sign, normally the `challengeMessage` from
    /// `/requestValidation`.
    pub message: String,

    /// Private key in Wallet Import Format.
    #[arg(long, env = "STAR_WIF", hide_env_values = true)]
    pub wif: String,
}
