// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Star Registry: Core Library
//!
//! A single-node, append-only ledger of named stars. Anybody may read it;
//! writing requires proving control of a Bitcoin address by signing a
//! short-lived challenge with it.
//!
//! ## Architecture
//!
//! - **crypto**: Hashing, address parsing, keys and the Bitcoin
//!   signed-message scheme.
//! - **storage**: The `KvStore` abstraction over sled, blocks and the ledger.
//! - **validation**: Challenge issuance, signature checks, admission pool.
//! - **registry**: `RegistryService`, the API everything else calls.
//! - **clock**: Injectable time source.
//! - **config**: Protocol constants and runtime knobs.
//!
//! ## Write Path
//!
//! ```text
//! request_validation ─▶ sign challenge ─▶ validate_signature ─▶ submit_entry
//!      (issued)            (wallet)           (admitted)          (appended)
//! ```
//!
//! The library has no transport. The `star-node` binary puts HTTP in front
//! of [`registry::RegistryService`].

pub mod clock;
pub mod config;
pub mod crypto;
pub mod registry;
pub mod storage;
pub mod validation;

pub use registry::{RegistryError, RegistryService};
