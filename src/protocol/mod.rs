//! Command Protocol
//!
//! This module owns everything between a raw command line and a validated
//! operation, plus the framing used to send replies back.
//!
//! ## Modules
//!
//! - `operation`: The typed [`Operation`] descriptor
//! - `parser`: The line grammar and [`CommandParser`]
//! - `types`: The [`Reply`] type and its wire format
//!
//! ## Example
//!
//! ```
//! use tidekv::protocol::{CommandParser, Payload};
//!
//! let parser = CommandParser::new();
//! let op = parser.parse("QPUSH jobs a b").unwrap().unwrap();
//! assert_eq!(op.key, "jobs");
//! assert!(matches!(op.payload, Payload::QPush(ref v) if v.len() == 2));
//! ```

pub mod operation;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use operation::{CommandName, Condition, Operation, Payload, SetArgs};
pub use parser::{CommandParser, Grammar, ParseError, ParseResult};
pub use types::Reply;
