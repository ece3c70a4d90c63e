//! # TideKV - A Small In-Memory Key-Value and Queue Engine
//!
//! TideKV parses one-line text commands into typed operations and runs them
//! against an in-memory store of scalar values (with optional TTL and NX/XX
//! conditional writes) and per-key FIFO queues.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              TideKV                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │  Command    │    │              StorageEngine                   │   │
//! │  │  Parser     │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │             │    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use tidekv::{CommandHandler, CommandError, StorageEngine};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
//!
//! handler.command("SET session abc EX 60 NX").await.unwrap();
//! assert_eq!(handler.command("GET session").await, Ok(Some("abc".to_string())));
//!
//! handler.command("QPUSH jobs a b").await.unwrap();
//! assert_eq!(handler.command("QPOP jobs").await, Ok(Some("a".to_string())));
//!
//! assert_eq!(handler.command("SET x y EX soon").await.unwrap_err().to_string(),
//!            "malformed argument: invalid expiry 'soon': invalid digit found in string");
//! assert_eq!(handler.command("DEL x").await, Err(CommandError::InvalidCommand));
//! # });
//! ```
//!
//! ## Supported Commands
//!
//! - `SET key value [EX seconds] [NX|XX]`
//! - `GET key`
//! - `QPUSH key value [value ...]`
//! - `QPOP key`
//!
//! ## Module Overview
//!
//! - [`protocol`]: Command grammar, operation types, and reply framing
//! - [`storage`]: Sharded store with passive TTL expiry and queues
//! - [`commands`]: Parse-validate-execute dispatcher with deadlines
//! - [`connection`]: Line-protocol client connections
//!
//! ## Design Highlights
//!
//! ### Thread Safety
//!
//! The store uses 64 shards, each with its own async RwLock. Conditional
//! writes check and write under the same lock, so concurrent `SET k v NX`
//! calls have exactly one winner.
//!
//! ### Deadlines
//!
//! Every command runs under a deadline. A command that cannot finish in time
//! is aborted and reported as a timeout; it never completes later.
//!
//! ### Lazy Expiry
//!
//! Keys with a TTL are only checked when read. There is no background sweep.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandError, CommandHandler, EngineConfig};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{CommandParser, Grammar, Operation, ParseError, Reply};
pub use storage::{StorageEngine, StorageError};

/// The default port TideKV listens on
pub const DEFAULT_PORT: u16 = 6380;

/// The default host TideKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of TideKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
