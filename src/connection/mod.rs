//! Connection Module
//!
//! This module serves the engine over TCP using a plain line protocol.
//! Each client connection is handled by its own async task.
//!
//! ```text
//! TcpListener (main.rs)
//!        │ accept()
//!        ▼
//! ConnectionHandler ── one task per client
//!        │ line → CommandHandler::command → Reply
//!        ▼
//! client socket
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use tidekv::connection::{handle_connection, ConnectionStats};
//! use tidekv::commands::CommandHandler;
//! use tidekv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = CommandHandler::new(storage);
//!
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler, stats));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
