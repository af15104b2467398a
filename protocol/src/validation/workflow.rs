//! # Validation Workflow
//!
//! The gate in front of the ledger. Per address:
//!
//! ```text
//! NoRequest ──request──▶ Issued ──valid signature──▶ Validated ──append──▶ Consumed
//!                          │
//!                          └──window elapsed──▶ Expired (removed)
//! ```
//!
//! A request is keyed by address, so re-requesting while a live request
//! exists hands back the same challenge with a recomputed window instead of
//! minting a second one.
//!
//! ## Concurrency
//!
//! Every request/validate/submit sequence for one address runs under that
//! address's lock (see [`AddressLocks`]). Different addresses never contend.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::mempool::AdmissionPool;
use super::request::{AdmissionEntry, ValidationRequest, ValidationResponse, ValidationStatus};
use crate::clock::SharedClock;
use crate::crypto::signatures::{verify_message, MessageSignatureError};
use crate::storage::db::{DbError, KvStore, KvStoreExt};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Why a signature validation did not admit the address.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// No outstanding request for this address.
    #[error("no validation request for this account")]
    AccountNotFound,

    /// The request's window closed before the signature arrived.
    #[error("validation window exceeded")]
    ExpiredWindow,

    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] MessageSignatureError),

    #[error("database error: {0}")]
    Storage(#[from] DbError),
}

// ---------------------------------------------------------------------------
// Per-address locks
// ---------------------------------------------------------------------------

/// Lazily created mutex per address.
///
/// An entry lives only while some [`AddressLock`] for it is alive, so the map
/// holds the addresses currently being worked on, not every address seen.
#[derive(Debug, Clone, Default)]
pub struct AddressLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl AddressLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `address`. Hold the guard from [`AddressLock::lock`] for
    /// the whole sequence that must not interleave.
    pub fn for_address(&self, address: &str) -> AddressLock {
        let mutex = Arc::clone(
            self.locks
                .entry(address.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        AddressLock {
            address: address.to_string(),
            mutex,
            locks: Arc::clone(&self.locks),
        }
    }

    /// Addresses with a live lock handle.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Handle on one address's mutex. Dropping the last handle prunes the entry.
#[derive(Debug)]
pub struct AddressLock {
    address: String,
    mutex: Arc<Mutex<()>>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl AddressLock {
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.mutex.lock()
    }

    pub fn same_lock(&self, other: &AddressLock) -> bool {
        Arc::ptr_eq(&self.mutex, &other.mutex)
    }
}

impl Drop for AddressLock {
    fn drop(&mut self) {
        // Two owners left: the map and this handle. `remove_if` holds the
        // shard lock, so no `for_address` can clone in between.
        self.locks
            .remove_if(&self.address, |_, mutex| Arc::strong_count(mutex) == 2);
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// Issues challenges and promotes verified addresses into the admission pool.
pub struct ValidationWorkflow<S: KvStore> {
    requests: S,
    pool: AdmissionPool<S>,
    clock: SharedClock,
    window_secs: u64,
    locks: AddressLocks,
}

impl<S: KvStore + Clone> Clone for ValidationWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
            pool: self.pool.clone(),
            clock: Arc::clone(&self.clock),
            window_secs: self.window_secs,
            locks: self.locks.clone(),
        }
    }
}

impl<S: KvStore> ValidationWorkflow<S> {
    pub fn new(
        requests: S,
        pool: AdmissionPool<S>,
        clock: SharedClock,
        window_secs: u64,
        locks: AddressLocks,
    ) -> Self {
        Self {
            requests,
            pool,
            clock,
            window_secs,
            locks,
        }
    }

    pub fn pool(&self) -> &AdmissionPool<S> {
        &self.pool
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Number of outstanding (possibly expired) requests.
    pub fn pending_requests(&self) -> Result<usize, DbError> {
        self.requests.len()
    }

    /// Issue a challenge for `address`, or return the live one.
    pub fn request_validation(&self, address: &str) -> Result<ValidationResponse, DbError> {
        let lock = self.locks.for_address(address);
        let _guard = lock.lock();
        let now = self.clock.now_secs();

        if let Some(existing) = self.find_request(address)? {
            let remaining = existing.window_remaining(now, self.window_secs);
            if remaining > 0 {
                debug!(%address, remaining, "returning live validation request");
                return Ok(response(existing, remaining));
            }
            debug!(%address, "replacing expired validation request");
            self.requests.delete(address.as_bytes())?;
        }

        let request = ValidationRequest::new(address, now);
        self.requests.put(address.as_bytes(), &request)?;
        self.requests.flush()?;
        info!(%address, issued_at = now, "validation request issued");
        Ok(response(request, self.window_secs as i64))
    }

    /// Check `signature` against the outstanding challenge for `address` and,
    /// if it holds, move the address into the admission pool.
    pub fn validate_signature(
        &self,
        address: &str,
        signature: &str,
    ) -> Result<ValidationStatus, ValidationError> {
        let lock = self.locks.for_address(address);
        let _guard = lock.lock();
        let now = self.clock.now_secs();

        let request = self
            .find_request(address)?
            .ok_or(ValidationError::AccountNotFound)?;

        let remaining = request.window_remaining(now, self.window_secs);
        if remaining <= 0 {
            self.requests.delete(address.as_bytes())?;
            self.requests.flush()?;
            warn!(%address, issued_at = request.issued_at, "validation window exceeded");
            return Err(ValidationError::ExpiredWindow);
        }

        if let Err(e) = verify_message(address, &request.challenge_message, signature) {
            warn!(%address, error = %e, "signature rejected");
            return Err(e.into());
        }

        self.requests.delete(address.as_bytes())?;
        self.pool.admit(AdmissionEntry {
            address: address.to_string(),
            validated_at: now,
            challenge_message: request.challenge_message.clone(),
        })?;
        self.requests.flush()?;
        info!(%address, "signature verified, address admitted");

        Ok(ValidationStatus {
            address: request.address,
            issued_at: request.issued_at,
            window_remaining: remaining,
            verified: true,
            message_signature: "valid".to_string(),
        })
    }

    /// Linear scan of outstanding requests; first match by address.
    fn find_request(&self, address: &str) -> Result<Option<ValidationRequest>, DbError> {
        Ok(self
            .requests
            .scan_all::<ValidationRequest>()?
            .into_iter()
            .map(|(_, request)| request)
            .find(|request| request.address == address))
    }
}

fn response(request: ValidationRequest, window_remaining: i64) -> ValidationResponse {
    ValidationResponse {
        address: request.address,
        issued_at: request.issued_at,
        challenge_message: request.challenge_message,
        window_remaining,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::VALIDATION_WINDOW_SECS;
    use crate::crypto::address::Network;
    use crate::crypto::keys::StarKeypair;
    use crate::crypto::signatures::sign_message;
    use crate::storage::db::MemoryStore;

    const T0: u64 = 1_700_000_000;

    fn setup() -> (ValidationWorkflow<MemoryStore>, ManualClock, StarKeypair) {
        let clock = ManualClock::new(T0);
        let workflow = ValidationWorkflow::new(
            MemoryStore::new(),
            AdmissionPool::new(MemoryStore::new()),
            Arc::new(clock.clone()),
            VALIDATION_WINDOW_SECS,
            AddressLocks::new(),
        );
        let mut secret = [0u8; 32];
        secret[31] = 7;
        let keypair = StarKeypair::from_secret_bytes(&secret, Network::Mainnet).unwrap();
        (workflow, clock, keypair)
    }

    fn sign(keypair: &StarKeypair, message: &str) -> String {
        sign_message(keypair, message).unwrap()
    }

    #[test]
    fn fresh_request_has_full_window() {
        let (workflow, _, kp) = setup();
        let response = workflow.request_validation(&kp.address()).unwrap();
        assert_eq!(response.window_remaining, 300);
        assert_eq!(response.issued_at, T0);
        assert_eq!(
            response.challenge_message,
            format!("{}:{}:starRegistry", kp.address(), T0)
        );
    }

    #[test]
    fn live_request_is_returned_unchanged() {
        let (workflow, clock, kp) = setup();
        let first = workflow.request_validation(&kp.address()).unwrap();
        clock.advance(120);
        let second = workflow.request_validation(&kp.address()).unwrap();
        assert_eq!(second.challenge_message, first.challenge_message);
        assert_eq!(second.window_remaining, 180);
        assert_eq!(workflow.pending_requests().unwrap(), 1);
    }

    #[test]
    fn expired_request_is_reissued() {
        let (workflow, clock, kp) = setup();
        workflow.request_validation(&kp.address()).unwrap();
        clock.advance(300);
        let fresh = workflow.request_validation(&kp.address()).unwrap();
        assert_eq!(fresh.issued_at, T0 + 300);
        assert_eq!(fresh.window_remaining, 300);
        assert_eq!(workflow.pending_requests().unwrap(), 1);
    }

    #[test]
    fn valid_signature_at_299_seconds_is_admitted() {
        let (workflow, clock, kp) = setup();
        let response = workflow.request_validation(&kp.address()).unwrap();
        clock.advance(299);
        let status = workflow
            .validate_signature(&kp.address(), &sign(&kp, &response.challenge_message))
            .unwrap();
        assert!(status.verified);
        assert_eq!(status.window_remaining, 1);
        assert_eq!(status.message_signature, "valid");
        assert!(workflow.pool().is_admitted(&kp.address()).unwrap());
        assert_eq!(workflow.pending_requests().unwrap(), 0);
    }

    #[test]
    fn valid_signature_at_300_and_301_seconds_is_expired() {
        for elapsed in [300, 301] {
            let (workflow, clock, kp) = setup();
            let response = workflow.request_validation(&kp.address()).unwrap();
            let signature = sign(&kp, &response.challenge_message);
            clock.advance(elapsed);
            assert!(matches!(
                workflow.validate_signature(&kp.address(), &signature),
                Err(ValidationError::ExpiredWindow)
            ));
            // Expired requests can never be promoted afterwards.
            assert!(matches!(
                workflow.validate_signature(&kp.address(), &signature),
                Err(ValidationError::AccountNotFound)
            ));
            assert!(!workflow.pool().is_admitted(&kp.address()).unwrap());
        }
    }

    #[test]
    fn unknown_account() {
        let (workflow, _, kp) = setup();
        assert!(matches!(
            workflow.validate_signature(&kp.address(), "AAAA"),
            Err(ValidationError::AccountNotFound)
        ));
    }

    #[test]
    fn wrong_signer_is_rejected_and_request_survives() {
        let (workflow, _, kp) = setup();
        let response = workflow.request_validation(&kp.address()).unwrap();
        let impostor = StarKeypair::generate();
        let forged = sign(&impostor, &response.challenge_message);

        assert!(matches!(
            workflow.validate_signature(&kp.address(), &forged),
            Err(ValidationError::InvalidSignature(MessageSignatureError::SignerMismatch))
        ));
        assert_eq!(workflow.pending_requests().unwrap(), 1);

        // The rightful owner can still answer.
        let genuine = sign(&kp, &response.challenge_message);
        assert!(workflow.validate_signature(&kp.address(), &genuine).is_ok());
    }

    #[test]
    fn signature_over_wrong_message_is_rejected() {
        let (workflow, _, kp) = setup();
        workflow.request_validation(&kp.address()).unwrap();
        let signature = sign(&kp, "something else entirely");
        assert!(matches!(
            workflow.validate_signature(&kp.address(), &signature),
            Err(ValidationError::InvalidSignature(_))
        ));
    }

    #[test]
    fn replayed_signature_finds_no_account() {
        let (workflow, _, kp) = setup();
        let response = workflow.request_validation(&kp.address()).unwrap();
        let signature = sign(&kp, &response.challenge_message);
        workflow.validate_signature(&kp.address(), &signature).unwrap();
        assert!(matches!(
            workflow.validate_signature(&kp.address(), &signature),
            Err(ValidationError::AccountNotFound)
        ));
        assert_eq!(workflow.pool().len().unwrap(), 1);
    }

    #[test]
    fn address_locks_are_shared_per_address() {
        let locks = AddressLocks::new();
        let a = locks.for_address("alice");
        let b = locks.for_address("alice");
        let c = locks.for_address("bob");
        assert!(a.same_lock(&b));
        assert!(!a.same_lock(&c));
    }

    #[test]
    fn address_locks_are_pruned_when_released() {
        let locks = AddressLocks::new();
        let a = locks.for_address("alice");
        let b = locks.for_address("alice");
        assert_eq!(locks.len(), 1);

        drop(a);
        assert_eq!(locks.len(), 1);
        drop(b);
        assert!(locks.is_empty());

        let shared = AddressLocks::new();
        let (store, clock) = (MemoryStore::new(), ManualClock::new(T0));
        let workflow = ValidationWorkflow::new(
            store,
            AdmissionPool::new(MemoryStore::new()),
            Arc::new(clock),
            VALIDATION_WINDOW_SECS,
            shared.clone(),
        );
        for n in 0..10 {
            workflow
                .request_validation(&format!("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SA{n:02}"))
                .unwrap();
        }
        assert!(shared.is_empty());
    }
}
