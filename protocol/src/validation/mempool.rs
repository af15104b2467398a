//! Admission pool.
//!
//! Addresses that answered their challenge wait here until they append a
//! block. The pool is keyed by address, so an address is either admitted
//! once or not at all. Entries never expire; the only way out is
//! [`AdmissionPool::consume`].

use tracing::debug;

use super::request::AdmissionEntry;
use crate::storage::db::{DbResult, KvStore, KvStoreExt};

/// Persistent set of admitted addresses.
#[derive(Debug, Clone)]
pub struct AdmissionPool<S: KvStore> {
    store: S,
}

impl<S: KvStore> AdmissionPool<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Admit an address, replacing any earlier entry for it.
    pub fn admit(&self, entry: AdmissionEntry) -> DbResult<()> {
        debug!(address = %entry.address, "address admitted");
        self.store.put(entry.address.as_bytes(), &entry)?;
        self.store.flush()
    }

    pub fn is_admitted(&self, address: &str) -> DbResult<bool> {
        Ok(self.store.get_raw(address.as_bytes())?.is_some())
    }

    pub fn get(&self, address: &str) -> DbResult<Option<AdmissionEntry>> {
        self.store.get(address.as_bytes())
    }

    /// Remove the admission. Returns whether there was one.
    pub fn consume(&self, address: &str) -> DbResult<bool> {
        if !self.is_admitted(address)? {
            return Ok(false);
        }
        self.store.delete(address.as_bytes())?;
        self.store.flush()?;
        debug!(%address, "admission consumed");
        Ok(true)
    }

    /// All admitted entries, ordered by address.
    pub fn entries(&self) -> DbResult<Vec<AdmissionEntry>> {
        Ok(self
            .store
            .scan_all::<AdmissionEntry>()?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect())
    }

    pub fn len(&self) -> DbResult<usize> {
        self.store.len()
    }

    pub fn is_empty(&self) -> DbResult<bool> {
        self.store.is_empty()
    }
}
