//! # Structured Logging
//!
//! One `tracing` subscriber for the whole process, on stderr. stdout is kept
//! for what `init`, `keygen` and `sign` print, so their output can be piped.
//!
//! What the registry emits:
//!
//! - `info`: genesis creation, issued challenges, admitted addresses and
//!   every appended star.
//! - `warn`: expired windows, bad signatures, rejected blocks and submissions.
//! - `debug`: challenge reuse and replacement, HTTP request spans from
//!   `tower_http`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter for `star-node run`: request traces included.
pub const RUN_DIRECTIVES: &str = "star_node=info,star_registry=info,tower_http=debug";

/// Filter for one-shot subcommands.
pub const COMMAND_DIRECTIVES: &str = "star_node=info,star_registry=info";

/// Log output format, chosen with `--log-format` or `STAR_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines with file and line numbers.
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

/// `RUST_LOG` if set and valid, `default_directives` otherwise.
fn build_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Install the global subscriber. Call once, before the database is opened,
/// so storage and genesis events are captured.
pub fn init_logging(default_directives: &str, format: LogFormat) {
    let env_filter = build_filter(default_directives);

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
                .init();
        }
    }

    tracing::debug!(?format, "logging initialized");
}
