//! # Registry Service
//!
//! The one entry point callers use. It owns the ledger and the validation
//! workflow, applies input checks and turns lower-level errors into
//! [`RegistryError`]s.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{messages, RegistryError, RejectReason};
use super::input::{check_address, check_star, StarInput};
use super::story::with_decoded_story;
use crate::clock::{SharedClock, SystemClock};
use crate::config::RegistryConfig;
use crate::storage::block::{Block, BlockBody, StarEntry};
use crate::storage::chain::{ChainVerification, Ledger};
use crate::storage::db::{KvStore, MemoryStore, SledStore, StarDB};
use crate::validation::{
    AddressLocks, AdmissionPool, ValidationResponse, ValidationStatus, ValidationWorkflow,
};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Point-in-time counters for the node's status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    /// Height of the tip. `None` before genesis.
    pub chain_height: Option<u64>,
    pub blocks: u64,
    pub pending_requests: usize,
    pub admitted: usize,
}

/// Ledger plus validation workflow over one kind of store.
pub struct RegistryService<S: KvStore> {
    ledger: Ledger<S>,
    workflow: ValidationWorkflow<S>,
    locks: AddressLocks,
    config: RegistryConfig,
}

impl<S: KvStore + Clone> Clone for RegistryService<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            workflow: self.workflow.clone(),
            locks: self.locks.clone(),
            config: self.config.clone(),
        }
    }
}

impl RegistryService<SledStore> {
    /// Service over the three namespaces of a sled database.
    pub fn open(db: &StarDB, clock: SharedClock, config: RegistryConfig) -> Self {
        Self::new(db.chain(), db.requests(), db.mempool(), clock, config)
    }
}

impl RegistryService<MemoryStore> {
    /// Volatile service on the system clock.
    pub fn in_memory(config: RegistryConfig) -> Self {
        Self::new(
            MemoryStore::new(),
            MemoryStore::new(),
            MemoryStore::new(),
            Arc::new(SystemClock),
            config,
        )
    }
}

impl<S: KvStore> RegistryService<S> {
    pub fn new(
        chain: S,
        requests: S,
        mempool: S,
        clock: SharedClock,
        config: RegistryConfig,
    ) -> Self {
        let locks = AddressLocks::new();
        let workflow = ValidationWorkflow::new(
            requests,
            AdmissionPool::new(mempool),
            Arc::clone(&clock),
            config.validation_window_secs,
            locks.clone(),
        );
        Self {
            ledger: Ledger::new(chain, clock),
            workflow,
            locks,
            config,
        }
    }

    /// Ensure the genesis block exists.
    pub fn initialize(&self) -> RegistryResult<Block> {
        Ok(self.ledger.initialize(&self.config.genesis_data)?)
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn request_validation(&self, address: &str) -> RegistryResult<ValidationResponse> {
        if !check_address(address) {
            return Err(RegistryError::invalid_request());
        }
        Ok(self.workflow.request_validation(address)?)
    }

    pub fn validate_signature(
        &self,
        address: &str,
        signature: &str,
    ) -> RegistryResult<ValidationStatus> {
        if !check_address(address) || signature.trim().is_empty() {
            return Err(RegistryError::invalid_request());
        }
        Ok(self.workflow.validate_signature(address, signature)?)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Append a star for an admitted address.
    ///
    /// The block is appended before the admission is consumed, so a failed
    /// append leaves the address admitted and free to retry. Both steps run
    /// under the address lock, so the admission cannot be spent twice.
    pub fn submit_entry(&self, address: &str, star: StarInput) -> RegistryResult<Block> {
        if !check_address(address) {
            return Err(self.reject(address, RejectReason::InvalidAddress));
        }
        if !check_star(&star, self.config.story_byte_limit) {
            return Err(self.reject(address, RejectReason::InvalidStar));
        }

        let lock = self.locks.for_address(address);
        let _guard = lock.lock();

        if !self.workflow.pool().is_admitted(address)? {
            return Err(self.reject(address, RejectReason::NotAdmitted));
        }

        let body = BlockBody::Star(StarEntry {
            address: address.to_string(),
            star: star.into_star(),
        });
        let block = self.ledger.create_and_append(body)?;
        self.workflow.pool().consume(address)?;

        info!(%address, height = block.height, "star registered");
        Ok(block)
    }

    fn reject(&self, address: &str, reason: RejectReason) -> RegistryError {
        warn!(%address, ?reason, "submission rejected");
        RegistryError::Rejected(reason)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn lookup_by_hash(&self, hash: &str) -> RegistryResult<Block> {
        if hash.trim().is_empty() {
            return Err(RegistryError::invalid_request());
        }
        match self.ledger.get_by_hash(hash)? {
            Some(block) => Ok(with_decoded_story(block)),
            None => {
                debug!(%hash, "no block with hash");
                Err(RegistryError::NotFound(messages::hash_not_found(hash)))
            }
        }
    }

    pub fn lookup_by_address(&self, address: &str) -> RegistryResult<Vec<Block>> {
        if !check_address(address) {
            return Err(RegistryError::invalid_request());
        }
        let blocks = self
            .ledger
            .get_all_by(|block| block.body.address() == Some(address))?;
        if blocks.is_empty() {
            return Err(RegistryError::NotFound(messages::address_not_found(address)));
        }
        Ok(blocks.into_iter().map(with_decoded_story).collect())
    }

    pub fn lookup_by_height(&self, height: u64) -> RegistryResult<Block> {
        match self.ledger.get_by_height(height)? {
            Some(block) => Ok(with_decoded_story(block)),
            None => Err(RegistryError::NotFound(messages::height_not_found(height))),
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn verify_chain(&self) -> RegistryResult<ChainVerification> {
        Ok(self.ledger.verify_chain()?)
    }

    pub fn status(&self) -> RegistryResult<RegistryStatus> {
        Ok(RegistryStatus {
            chain_height: self.ledger.height()?,
            blocks: self.ledger.len()?,
            pending_requests: self.workflow.pending_requests()?,
            admitted: self.workflow.pool().len()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
