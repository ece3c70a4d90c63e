//! Command Handler Module
//!
//! This module is the engine's front door: it receives raw command lines,
//! parses them, executes them against the storage engine under a deadline,
//! and returns the result.
//!
//! ## Architecture
//!
//! ```text
//! Command line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ CommandParser   │  (protocol module)
//! └────────┬────────┘
//!          │ Operation
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Validate     │
//! │  - Dispatch     │
//! │  - Deadline     │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `SET key value [EX seconds] [NX|XX]`
//! - `GET key`
//! - `QPUSH key value [value ...]`
//! - `QPOP key`

pub mod handler;

// Re-export the main command handler
pub use handler::{
    CommandError, CommandHandler, CommandResult, EngineConfig, DEFAULT_COMMAND_TIMEOUT,
};
