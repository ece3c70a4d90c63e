//! Operation Descriptors
//!
//! An [`Operation`] is the validated, immutable description of one command.
//! It is produced by the [`CommandParser`](super::CommandParser) and consumed
//! by the [`CommandHandler`](crate::commands::CommandHandler).
//!
//! Arguments that only make sense for one command live in that command's
//! [`Payload`] variant, so a GET can never carry an expiry and a QPUSH always
//! carries at least one value.

use std::fmt;
use std::time::Duration;

/// Canonical command names used for handler lookup.
///
/// These are distinct from the grammar keywords: the keyword `SET` maps to
/// [`CommandName::Set`] through the parser's [`Grammar`](super::Grammar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    Set,
    Get,
    QPush,
    QPop,
}

impl CommandName {
    /// Returns the canonical name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::Set => "Set",
            CommandName::Get => "Get",
            CommandName::QPush => "QPUSH",
            CommandName::QPop => "QPOP",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write condition for SET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Only set the key if it does not already exist.
    Nx,
    /// Only set the key if it already exists.
    Xx,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Nx => f.write_str("NX"),
            Condition::Xx => f.write_str("XX"),
        }
    }
}

/// Arguments of a SET command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetArgs {
    /// The value to store
    pub value: String,
    /// Time-to-live in whole seconds
    pub expiry: Option<u64>,
    /// Optional NX/XX write condition
    pub condition: Option<Condition>,
}

impl SetArgs {
    /// Returns the expiry as a `Duration`, if one was given.
    pub fn ttl(&self) -> Option<Duration> {
        self.expiry.map(Duration::from_secs)
    }
}

/// Command-specific arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Set(SetArgs),
    Get,
    /// Values to append, in order. Never empty.
    QPush(Vec<String>),
    QPop,
}

/// A parsed and validated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// The key the command targets
    pub key: String,
    /// Command-specific arguments
    pub payload: Payload,
    /// The raw command string, kept for diagnostics
    pub query: String,
}

impl Operation {
    /// Returns the canonical name of this operation.
    pub fn name(&self) -> CommandName {
        match self.payload {
            Payload::Set(_) => CommandName::Set,
            Payload::Get => CommandName::Get,
            Payload::QPush(_) => CommandName::QPush,
            Payload::QPop => CommandName::QPop,
        }
    }
}
