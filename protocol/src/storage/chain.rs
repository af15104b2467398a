//! # Ledger
//!
//! The append-only block sequence, persisted in a [`KvStore`] keyed by
//! height.
//!
//! ## Invariants
//!
//! For every stored block at height `h`:
//!
//! ```text
//! block[h].height            == h
//! block[h].hash              == H(block[h] without hash)
//! block[h].previousBlockHash == block[h-1].hash      (h > 0)
//! block[0].previousBlockHash == ""
//! ```
//!
//! [`Ledger::append`] refuses anything that would break them, and
//! [`Ledger::verify_chain`] re-checks them over the whole store.
//!
//! ## Concurrency
//!
//! Reads go straight to the store. Height assignment is serialized by a
//! single append lock so two concurrent [`Ledger::create_and_append`] calls
//! can never produce the same height.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::block::{Block, BlockBody};
use super::db::{sequence_key, DbError, KvStore, KvStoreExt};
use crate::clock::SharedClock;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur when extending the ledger.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Block height does not match the next free slot.
    #[error("unexpected block height: expected {expected}, got {got}")]
    HeightMismatch { expected: u64, got: u64 },

    /// Block's previousBlockHash does not match the current tip.
    #[error("block at height {height} does not extend the chain tip")]
    LinkMismatch { height: u64 },

    /// The block's stored hash does not match its content.
    #[error("block hash mismatch: {0}")]
    HashMismatch(String),

    #[error("database error: {0}")]
    Db(#[from] DbError),
}

pub type ChainResult<T> = Result<T, ChainError>;

// ---------------------------------------------------------------------------
// Verification Report
// ---------------------------------------------------------------------------

/// Outcome of a full [`Ledger::verify_chain`] walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ChainVerification {
    /// Every block checked out.
    Valid { blocks: u64 },
    /// The first broken height and what was wrong with it.
    Invalid { height: u64, reason: String },
}

impl ChainVerification {
    pub fn is_valid(&self) -> bool {
        matches!(self, ChainVerification::Valid { .. })
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Hash-linked block sequence over an injected store.
pub struct Ledger<S: KvStore> {
    store: S,
    clock: SharedClock,
    append_lock: Arc<Mutex<()>>,
}

impl<S: KvStore + Clone> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: Arc::clone(&self.clock),
            append_lock: Arc::clone(&self.append_lock),
        }
    }
}

impl<S: KvStore> Ledger<S> {
    pub fn new(store: S, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Write the genesis block if the store is empty.
    ///
    /// Safe to call on every startup: an existing chain is left untouched.
    /// Returns the genesis block either way.
    pub fn initialize(&self, genesis_data: &str) -> ChainResult<Block> {
        let _guard = self.append_lock.lock();
        if let Some(existing) = self.get_by_height(0)? {
            debug!(hash = %existing.hash, "chain already initialized");
            return Ok(existing);
        }

        let genesis = self.create_block(BlockBody::Genesis(genesis_data.to_string()))?;
        self.store.put(&sequence_key(0), &genesis)?;
        self.store.flush()?;
        info!(hash = %genesis.hash, "genesis block created");
        Ok(genesis)
    }

    /// Build the next block for `body` without touching the store.
    pub fn create_block(&self, body: BlockBody) -> ChainResult<Block> {
        let height = self.len()?;
        let previous_block_hash = match self.tip()? {
            Some(tip) => tip.hash,
            None => String::new(),
        };
        Ok(Block::new(height, body, self.clock.now_secs(), previous_block_hash))
    }

    /// Persist a block built by [`create_block`](Self::create_block).
    ///
    /// The block must sit exactly at the next free height and link to the
    /// current tip.
    pub fn append(&self, block: Block) -> ChainResult<Block> {
        let _guard = self.append_lock.lock();
        self.append_locked(block)
    }

    /// Create and append in one step, under the append lock.
    pub fn create_and_append(&self, body: BlockBody) -> ChainResult<Block> {
        let _guard = self.append_lock.lock();
        let block = self.create_block(body)?;
        self.append_locked(block)
    }

    fn append_locked(&self, block: Block) -> ChainResult<Block> {
        let expected = self.len()?;
        if block.height != expected {
            warn!(expected, got = block.height, "rejected block at wrong height");
            return Err(ChainError::HeightMismatch {
                expected,
                got: block.height,
            });
        }

        let tip_hash = match self.tip()? {
            Some(tip) => tip.hash,
            None => String::new(),
        };
        if block.previous_block_hash != tip_hash {
            warn!(height = block.height, "rejected block that does not extend tip");
            return Err(ChainError::LinkMismatch {
                height: block.height,
            });
        }

        block.verify_hash().map_err(ChainError::HashMismatch)?;

        self.store.put(&sequence_key(block.height), &block)?;
        self.store.flush()?;
        info!(height = block.height, hash = %block.hash, "block appended");
        Ok(block)
    }

    pub fn get_by_height(&self, height: u64) -> ChainResult<Option<Block>> {
        debug!(height, "lookup by height");
        Ok(self.store.get(&sequence_key(height))?)
    }

    /// Linear scan; first block whose hash matches.
    pub fn get_by_hash(&self, hash: &str) -> ChainResult<Option<Block>> {
        debug!(%hash, "lookup by hash");
        Ok(self.get_all_by(|block| block.hash == hash)?.into_iter().next())
    }

    /// Linear scan in height order.
    pub fn get_all_by<F>(&self, predicate: F) -> ChainResult<Vec<Block>>
    where
        F: Fn(&Block) -> bool,
    {
        Ok(self
            .store
            .scan_all::<Block>()?
            .into_iter()
            .map(|(_, block)| block)
            .filter(|block| predicate(block))
            .collect())
    }

    /// Number of stored blocks.
    pub fn len(&self) -> ChainResult<u64> {
        Ok(self.store.len()? as u64)
    }

    pub fn is_empty(&self) -> ChainResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Height of the tip, or `None` before genesis.
    pub fn height(&self) -> ChainResult<Option<u64>> {
        Ok(self.len()?.checked_sub(1))
    }

    pub fn tip(&self) -> ChainResult<Option<Block>> {
        match self.height()? {
            Some(h) => self.get_by_height(h),
            None => Ok(None),
        }
    }

    /// Walk every block from genesis and re-check the chain invariants.
    pub fn verify_chain(&self) -> ChainResult<ChainVerification> {
        let mut previous_hash = String::new();
        let mut count = 0u64;

        for (key, block) in self.store.scan_all::<Block>()? {
            let position = super::db::decode_sequence_key(&key)?;
            let failure = if position != count {
                Some(format!("gap in chain: expected height {count}, found {position}"))
            } else if block.height != position {
                Some(format!("stored height {} at position {position}", block.height))
            } else if let Err(reason) = block.verify_hash() {
                Some(reason)
            } else if block.previous_block_hash != previous_hash {
                Some(format!("block {} does not link to its predecessor", block.height))
            } else {
                None
            };

            if let Some(reason) = failure {
                warn!(height = count, %reason, "chain verification failed");
                return Ok(ChainVerification::Invalid {
                    height: count,
                    reason,
                });
            }

            previous_hash = block.hash;
            count += 1;
        }

        Ok(ChainVerification::Valid { blocks: count })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
