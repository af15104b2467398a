//! # Storage Module
//!
//! Persistence for the registry: the ledger and the records behind the
//! validation workflow.
//!
//! ## Architecture
//!
//! ```text
//! block.rs : Block structure, payload types, hash/verify operations
//! chain.rs : Ledger: append protocol, lookups, full-chain verification
//! db.rs    : KvStore abstraction, sled and in-memory backends
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! StarEntry → Block → Ledger
//!                       ↓
//!                    StarDB (chain tree)
//! ```
//!
//! ## Design Decisions
//!
//! 1. **SHA-256 for block hashes.** Lowercase hex, so hashes can be pasted
//!    straight into a lookup URL.
//!
//! 2. **One sled tree per collection.** The chain, outstanding requests and
//!    the admission pool never share a keyspace.
//!
//! 3. **JSON on disk.** The stored block is the same document the API
//!    returns, which keeps hand inspection of a data directory trivial.

pub mod block;
pub mod chain;
pub mod db;

pub use block::{Block, BlockBody, Star, StarEntry};
pub use chain::{ChainError, ChainVerification, Ledger};
pub use db::{DbError, DbResult, KvStore, KvStoreExt, MemoryStore, SledStore, StarDB};
