//! # StarDB: Persistent Storage Engine
//!
//! The persistence layer for the registry, built on sled's embedded
//! key-value store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! sled organizes data into named "trees". Each tree is an independent
//! B+ tree with its own keyspace:
//!
//! | Tree       | Key                  | Value                      |
//! |------------|----------------------|----------------------------|
//! | `chain`    | `height` (8B BE)     | `json(Block)`              |
//! | `requests` | `address` (UTF-8)    | `json(ValidationRequest)`  |
//! | `mempool`  | `address` (UTF-8)    | `json(AdmissionEntry)`     |
//!
//! Sequence keys are stored as big-endian u64 so that sled's lexicographic
//! ordering matches numeric ordering and [`KvStore::scan_raw`] returns the
//! chain in height order.
//!
//! ## The `KvStore` seam
//!
//! Everything above this module talks to a [`KvStore`], never to sled
//! directly. [`SledStore`] is the durable implementation; [`MemoryStore`]
//! satisfies the same contract in RAM so unit tests need no filesystem.
//! Typed access (JSON encode/decode, append) lives in [`KvStoreExt`] and works
//! for both.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};

use crate::config::{CHAIN_NAMESPACE, MEMPOOL_NAMESPACE, REQUESTS_NAMESPACE};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// A raw key/value pair as returned by a full scan.
pub type RawEntry = (Vec<u8>, Vec<u8>);

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Encode a sequence number (chain height) as an order-preserving key.
pub fn sequence_key(n: u64) -> [u8; 8] {
    n.to_be_bytes()
}

/// Decode a key produced by [`sequence_key`].
pub fn decode_sequence_key(key: &[u8]) -> DbResult<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| DbError::Serialization("invalid sequence key bytes".to_string()))?;
    Ok(u64::from_be_bytes(bytes))
}

// ---------------------------------------------------------------------------
// KvStore
// ---------------------------------------------------------------------------

/// Ordered byte-keyed storage.
///
/// Implementations must return [`scan_raw`](KvStore::scan_raw) results in
/// ascending key order and treat deleting an absent key as a no-op.
pub trait KvStore: Send + Sync {
    fn get_raw(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>>;

    /// Insert or overwrite.
    fn put_raw(&self, key: &[u8], value: &[u8]) -> DbResult<()>;

    fn delete(&self, key: &[u8]) -> DbResult<()>;

    /// Materialize the whole collection in key order.
    fn scan_raw(&self) -> DbResult<Vec<RawEntry>>;

    fn len(&self) -> DbResult<usize>;

    fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Block until writes are durable. A no-op for volatile stores.
    fn flush(&self) -> DbResult<()> {
        Ok(())
    }
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn get_raw(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        (**self).get_raw(key)
    }

    fn put_raw(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        (**self).put_raw(key, value)
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        (**self).delete(key)
    }

    fn scan_raw(&self) -> DbResult<Vec<RawEntry>> {
        (**self).scan_raw()
    }

    fn len(&self) -> DbResult<usize> {
        (**self).len()
    }

    fn flush(&self) -> DbResult<()> {
        (**self).flush()
    }
}

/// Typed (JSON) access on top of any [`KvStore`].
pub trait KvStoreExt: KvStore {
    /// Fetch and decode a value. `None` if the key is absent.
    fn get<T: DeserializeOwned>(&self, key: &[u8]) -> DbResult<Option<T>> {
        match self.get_raw(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Encode and store a value, overwriting any existing one.
    fn put<T: Serialize>(&self, key: &[u8], value: &T) -> DbResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| DbError::Serialization(e.to_string()))?;
        self.put_raw(key, &bytes)
    }

    /// Decode every entry in key order. Linear in the collection size.
    fn scan_all<T: DeserializeOwned>(&self) -> DbResult<Vec<(Vec<u8>, T)>> {
        self.scan_raw()?
            .into_iter()
            .map(|(key, bytes)| Ok((key, decode(&bytes)?)))
            .collect()
    }

    /// Store `value` at `sequence_key(len)` and return that sequence number.
    fn append<T: Serialize>(&self, value: &T) -> DbResult<u64> {
        let next = self.len()? as u64;
        self.put(&sequence_key(next), value)?;
        Ok(next)
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    serde_json::from_slice(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// SledStore
// ---------------------------------------------------------------------------

/// A [`KvStore`] backed by one sled tree.
///
/// sled trees are thread-safe and cheap to clone; clones address the same
/// on-disk keyspace.
#[derive(Debug, Clone)]
pub struct SledStore {
    tree: Tree,
}

impl SledStore {
    pub fn new(tree: Tree) -> Self {
        Self { tree }
    }
}

impl KvStore for SledStore {
    fn get_raw(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    fn put_raw(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        self.tree.remove(key)?;
        Ok(())
    }

    fn scan_raw(&self) -> DbResult<Vec<RawEntry>> {
        let mut entries = Vec::with_capacity(self.tree.len());
        for item in self.tree.iter() {
            let (key, value) = item?;
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    fn len(&self) -> DbResult<usize> {
        Ok(self.tree.len())
    }

    fn flush(&self) -> DbResult<()> {
        self.tree.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// A volatile [`KvStore`] over a `BTreeMap`. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get_raw(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put_raw(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn scan_raw(&self) -> DbResult<Vec<RawEntry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn len(&self) -> DbResult<usize> {
        Ok(self.entries.read().len())
    }
}

// ---------------------------------------------------------------------------
// StarDB
// ---------------------------------------------------------------------------

/// The registry's sled database: one tree per collection.
///
/// # Thread Safety
///
/// sled is inherently thread-safe. `StarDB` and the [`SledStore`] handles it
/// hands out can be shared across threads without external locking.
#[derive(Debug, Clone)]
pub struct StarDB {
    db: Db,
    chain: SledStore,
    requests: SledStore,
    mempool: SledStore,
}

impl StarDB {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    ///
    /// Ideal for tests that want real sled behaviour without cleanup.
    pub fn open_temporary() -> DbResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let chain = SledStore::new(db.open_tree(CHAIN_NAMESPACE)?);
        let requests = SledStore::new(db.open_tree(REQUESTS_NAMESPACE)?);
        let mempool = SledStore::new(db.open_tree(MEMPOOL_NAMESPACE)?);
        Ok(Self {
            db,
            chain,
            requests,
            mempool,
        })
    }

    /// Block sequence.
    pub fn chain(&self) -> SledStore {
        self.chain.clone()
    }

    /// Outstanding validation requests.
    pub fn requests(&self) -> SledStore {
        self.requests.clone()
    }

    /// Validated addresses awaiting an append.
    pub fn mempool(&self) -> SledStore {
        self.mempool.clone()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
