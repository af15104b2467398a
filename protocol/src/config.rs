//! # Registry Configuration & Constants
//!
//! Every magic number in the registry lives here. The challenge layout and
//! the genesis payload in particular are part of the on-disk and wire
//! contract with external signers; changing them orphans every existing
//! chain and every signature anybody has ever produced.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Registry protocol version reported by the node.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Payload of the height-0 block. Written exactly once per data directory.
pub const GENESIS_BLOCK_DATA: &str = "[---GENESIS-BLOCK---]";

// ---------------------------------------------------------------------------
// Validation Workflow
// ---------------------------------------------------------------------------

/// Seconds an issued challenge stays signable. Five minutes.
pub const VALIDATION_WINDOW_SECS: u64 = 300;

/// Trailing segment of every challenge message:
/// `"<address>:<issuedAt>:starRegistry"`.
pub const CHALLENGE_SUFFIX: &str = "starRegistry";

/// Separator between challenge message segments.
pub const CHALLENGE_SEPARATOR: char = ':';

// ---------------------------------------------------------------------------
// Input Limits
// ---------------------------------------------------------------------------

/// Shortest address accepted (legacy base58 addresses bottom out at 26).
pub const MIN_ADDRESS_LEN: usize = 26;

/// Longest address accepted. Leaves room for bech32 witness addresses.
pub const MAX_ADDRESS_LEN: usize = 50;

/// Maximum size of a star story, in bytes, before hex encoding.
pub const STORY_BYTE_LIMIT: usize = 500;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Default on-disk location of the sled database.
pub const DEFAULT_DB_LOCATION: &str = "./data";

/// sled tree holding the block sequence.
pub const CHAIN_NAMESPACE: &str = "chain";

/// sled tree holding outstanding validation requests.
pub const REQUESTS_NAMESPACE: &str = "requests";

/// sled tree holding validated addresses awaiting their one append.
pub const MEMPOOL_NAMESPACE: &str = "mempool";

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default Prometheus scrape port.
pub const DEFAULT_METRICS_PORT: u16 = 8001;

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Runtime knobs for [`crate::registry::RegistryService`].
///
/// Defaults mirror the constants above. Tests shrink the window or the story
/// limit to exercise edge cases without waiting five minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Validation window in seconds.
    pub validation_window_secs: u64,
    /// Story size limit in bytes.
    pub story_byte_limit: usize,
    /// Genesis payload.
    pub genesis_data: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            validation_window_secs: VALIDATION_WINDOW_SECS,
            story_byte_limit: STORY_BYTE_LIMIT,
            genesis_data: GENESIS_BLOCK_DATA.to_string(),
        }
    }
}
