//! Sharded Storage Engine
//!
//! This module implements the in-memory store behind every command. It keeps
//! two independent maps: scalar entries (with optional expiry) and FIFO queues.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Keys hash to one of 64 shards; each shard has its own
//!    locks, so unrelated keys rarely contend.
//! 2. **Passive Expiry**: Expired entries are only removed when a GET touches
//!    them. There is no background sweeper.
//! 3. **Async RwLock**: Shard locks are `tokio::sync::RwLock`, so a caller
//!    waiting on a lock can be cancelled by a deadline without leaking it.
//! 4. **Separate Queue Storage**: Queues live in their own map; a key may exist
//!    as an entry and as a queue at the same time.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ data    │ │ data    │ │ data    │ │ data    │           │
//! │  │ queues  │ │ queues  │ │ queues  │ │ queues  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write (including insertion of a new key) holds the shard's write
//! lock for the whole check-and-modify, which makes NX/XX atomic. GET holds
//! only the read lock unless it has to drop an expired entry.

use crate::protocol::Condition;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// Errors returned by store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// GET on a key that is absent or expired
    #[error("key not found")]
    KeyNotFound,

    /// QPOP on a queue that is absent or empty
    #[error("queue is empty or not found")]
    QueueEmpty,
}

/// Result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A stored scalar value with optional expiry time.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The stored value
    pub value: String,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// Creates an entry, expiring after `ttl` if one is given.
    ///
    /// A TTL too large to represent as an `Instant` never expires.
    pub fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    /// Checks if this entry has expired.
    ///
    /// An entry whose expiry equals the current instant counts as expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

/// A single shard containing a portion of the keys.
#[derive(Debug, Default)]
pub(crate) struct Shard {
    pub(crate) data: RwLock<HashMap<String, Entry>>,
    pub(crate) queues: RwLock<HashMap<String, VecDeque<String>>>,
}

/// The store shared by every command.
///
/// Wrap it in an `Arc` and share it across tasks; all methods take `&self`.
///
/// # Example
///
/// ```
/// use tidekv::storage::StorageEngine;
///
/// # tokio_test::block_on(async {
/// let engine = StorageEngine::new();
///
/// engine.set("name", "tide".to_string(), None, None).await;
/// assert_eq!(engine.get("name").await.unwrap(), "tide");
///
/// engine.qpush("jobs", vec!["a".to_string(), "b".to_string()]).await;
/// assert_eq!(engine.qpop("jobs").await.unwrap(), "a");
/// # });
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,

    /// Statistics: number of live scalar entries (approximate)
    key_count: AtomicU64,
    get_count: AtomicU64,
    set_count: AtomicU64,
    qpush_count: AtomicU64,
    qpop_count: AtomicU64,
    /// Statistics: entries removed by passive expiry
    expired_count: AtomicU64,
    /// Statistics: conditional SETs whose condition did not hold
    skipped_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an empty storage engine.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            qpush_count: AtomicU64::new(0),
            qpop_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
            skipped_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    pub(crate) fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    pub(crate) fn shard(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Writes a value, honoring an optional NX/XX condition.
    ///
    /// An expired entry that has not been removed yet counts as absent.
    ///
    /// # Returns
    ///
    /// `true` if the value was written, `false` if the condition did not hold.
    pub async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
        condition: Option<Condition>,
    ) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.shard(key).data.write().await;

        let existing = data.get(key).map(|entry| !entry.is_expired());
        let present = existing == Some(true);

        let allowed = match condition {
            None => true,
            Some(Condition::Nx) => !present,
            Some(Condition::Xx) => present,
        };

        if !allowed {
            self.skipped_count.fetch_add(1, Ordering::Relaxed);
            debug!(key, ?condition, "Condition not met, SET skipped");
            return false;
        }

        if existing.is_none() {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        } else if existing == Some(false) {
            // Overwriting an entry that had already expired
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }

        data.insert(key.to_string(), Entry::new(value, ttl));
        true
    }

    /// Reads a value.
    ///
    /// Expired entries are removed here (passive expiry) and reported the same
    /// way as keys that were never set.
    pub async fn get(&self, key: &str) -> StorageResult<String> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.shard(key);

        // Fast path: shared lock for live or missing keys
        {
            let data = shard.data.read().await;
            match data.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(entry.value.clone()),
                Some(_) => {}
                None => return Err(StorageError::KeyNotFound),
            }
        }

        // Key looked expired - take the write lock and check again
        let mut data = shard.data.write().await;
        match data.get(key) {
            Some(entry) if entry.is_expired() => {
                data.remove(key);
                self.key_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                trace!(key, "Removed expired key");
                Err(StorageError::KeyNotFound)
            }
            // Race: another writer replaced the entry in between
            Some(entry) => Ok(entry.value.clone()),
            None => Err(StorageError::KeyNotFound),
        }
    }

    /// Appends values to the back of a queue, creating it if needed.
    ///
    /// # Returns
    ///
    /// The length of the queue after the push.
    pub async fn qpush(&self, key: &str, values: Vec<String>) -> usize {
        self.qpush_count.fetch_add(1, Ordering::Relaxed);

        let mut queues = self.shard(key).queues.write().await;
        let queue = queues.entry(key.to_string()).or_default();
        queue.extend(values);
        queue.len()
    }

    /// Removes and returns the front of a queue.
    ///
    /// A queue whose last element is popped is removed from the map.
    pub async fn qpop(&self, key: &str) -> StorageResult<String> {
        self.qpop_count.fetch_add(1, Ordering::Relaxed);

        let mut queues = self.shard(key).queues.write().await;
        let queue = queues.get_mut(key).ok_or(StorageError::QueueEmpty)?;
        let value = queue.pop_front().ok_or(StorageError::QueueEmpty)?;

        if queue.is_empty() {
            queues.remove(key);
        }

        Ok(value)
    }

    /// Returns the number of elements queued under a key.
    pub async fn queue_len(&self, key: &str) -> usize {
        let queues = self.shard(key).queues.read().await;
        queues.get(key).map(VecDeque::len).unwrap_or(0)
    }

    /// Returns the approximate number of scalar entries.
    ///
    /// Expired entries that have not been touched since are still counted.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if no scalar entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            qpush_ops: self.qpush_count.load(Ordering::Relaxed),
            qpop_ops: self.qpop_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
            skipped_sets: self.skipped_count.load(Ordering::Relaxed),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of scalar entries currently stored
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// Total SET operations, applied or not
    pub set_ops: u64,
    /// Total QPUSH operations
    pub qpush_ops: u64,
    /// Total QPOP operations
    pub qpop_ops: u64,
    /// Entries dropped because they had expired
    pub expired: u64,
    /// Conditional SETs skipped because the condition did not hold
    pub skipped_sets: u64,
}
