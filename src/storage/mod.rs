//! Storage Engine Module
//!
//! This module provides the in-memory store for TideKV: scalar entries with
//! optional TTL and per-key FIFO queues, spread over sharded async locks.
//!
//! ## Features
//!
//! - **Sharded Storage**: 64 independent shards reduce lock contention
//! - **RwLock**: Multiple concurrent readers, exclusive writers
//! - **Conditional Writes**: NX/XX checked and applied under one lock
//! - **Lazy Expiry**: Expired keys are cleaned on access
//!
//! ## Example
//!
//! ```
//! use tidekv::storage::{StorageEngine, StorageError};
//! use tidekv::protocol::Condition;
//!
//! # tokio_test::block_on(async {
//! let engine = StorageEngine::new();
//!
//! assert!(engine.set("lock", "owner-1".to_string(), None, Some(Condition::Nx)).await);
//! assert!(!engine.set("lock", "owner-2".to_string(), None, Some(Condition::Nx)).await);
//! assert_eq!(engine.get("lock").await.unwrap(), "owner-1");
//!
//! assert_eq!(engine.qpop("empty").await, Err(StorageError::QueueEmpty));
//! # });
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::{Entry, StorageEngine, StorageError, StorageResult, StorageStats};
