//! Command Line Parser
//!
//! This module turns one raw command line into a validated [`Operation`].
//! Parsing never touches the store.
//!
//! ## Grammar
//!
//! Tokens are separated by single spaces and keywords are case-sensitive.
//!
//! ```text
//! SET key value [EX seconds] [NX|XX]
//! GET key
//! QPUSH key value [value ...]
//! QPOP key
//! ```
//!
//! ## Outcomes
//!
//! [`CommandParser::parse`] has three outcomes:
//!
//! - `Ok(Some(op))` - a valid command
//! - `Ok(None)` - structurally invalid (unknown command, wrong arity, bad
//!   keyword order); this is not an error at parse time
//! - `Err(ParseError)` - an argument sits in the right place but is malformed,
//!   e.g. `SET k v EX soon`
//!
//! Callers must check for the error first, then for validity.

use crate::protocol::operation::{CommandName, Condition, Operation, Payload, SetArgs};
use std::collections::HashMap;
use std::num::ParseIntError;
use thiserror::Error;
use tracing::trace;

/// Errors raised for malformed arguments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The token after `EX` is not a non-negative integer
    #[error("invalid expiry '{token}': {source}")]
    InvalidExpiry {
        token: String,
        #[source]
        source: ParseIntError,
    },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Keyword tables for the command grammar.
///
/// The grammar is plain configuration handed to the parser at construction.
/// [`Grammar::default`] holds the standard keywords; extra aliases can be
/// registered with [`Grammar::with_command`].
#[derive(Debug, Clone)]
pub struct Grammar {
    /// Leading keyword -> canonical command
    commands: HashMap<String, CommandName>,
    /// Keyword introducing an expiry in seconds
    expiry_keyword: String,
    /// Condition keywords each command accepts
    conditions: HashMap<CommandName, Vec<(String, Condition)>>,
}

impl Default for Grammar {
    fn default() -> Self {
        let commands = [
            ("SET", CommandName::Set),
            ("GET", CommandName::Get),
            ("QPUSH", CommandName::QPush),
            ("QPOP", CommandName::QPop),
        ]
        .into_iter()
        .map(|(kw, name)| (kw.to_string(), name))
        .collect();

        let mut conditions = HashMap::new();
        conditions.insert(
            CommandName::Set,
            vec![
                ("NX".to_string(), Condition::Nx),
                ("XX".to_string(), Condition::Xx),
            ],
        );
        conditions.insert(CommandName::QPush, Vec::new());
        conditions.insert(CommandName::QPop, Vec::new());

        Self {
            commands,
            expiry_keyword: "EX".to_string(),
            conditions,
        }
    }
}

impl Grammar {
    /// Registers an additional leading keyword for a command.
    pub fn with_command(mut self, keyword: impl Into<String>, name: CommandName) -> Self {
        self.commands.insert(keyword.into(), name);
        self
    }

    /// Looks up the canonical command for a leading keyword.
    pub fn command(&self, keyword: &str) -> Option<CommandName> {
        self.commands.get(keyword).copied()
    }

    /// Returns true if the token introduces an expiry.
    pub fn is_expiry_keyword(&self, token: &str) -> bool {
        self.expiry_keyword == token
    }

    /// Resolves a condition keyword declared for the given command.
    pub fn condition(&self, name: CommandName, keyword: &str) -> Option<Condition> {
        self.conditions
            .get(&name)?
            .iter()
            .find(|(kw, _)| kw == keyword)
            .map(|(_, cond)| *cond)
    }
}

/// Parses raw command lines into [`Operation`]s.
///
/// # Example
///
/// ```
/// use tidekv::protocol::{CommandParser, CommandName};
///
/// let parser = CommandParser::new();
/// let op = parser.parse("SET name tide EX 60 NX").unwrap().unwrap();
/// assert_eq!(op.name(), CommandName::Set);
///
/// // Wrong arity is "not valid", not an error
/// assert_eq!(parser.parse("GET").unwrap(), None);
///
/// // A non-numeric expiry is an error
/// assert!(parser.parse("SET name tide EX soon").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandParser {
    grammar: Grammar,
}

impl CommandParser {
    /// Creates a parser with the standard grammar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser with a custom grammar.
    pub fn with_grammar(grammar: Grammar) -> Self {
        Self { grammar }
    }

    /// Parses one command line.
    ///
    /// See the module docs for the meaning of each outcome.
    pub fn parse(&self, input: &str) -> ParseResult<Option<Operation>> {
        if input.is_empty() {
            return Ok(None);
        }

        let tokens: Vec<&str> = input.split(' ').collect();

        let name = match self.grammar.command(tokens[0]) {
            Some(name) => name,
            None => {
                trace!(keyword = tokens[0], "Unknown command keyword");
                return Ok(None);
            }
        };

        let payload = match name {
            CommandName::Set => match self.parse_set(&tokens)? {
                Some(args) => Payload::Set(args),
                None => return Ok(None),
            },
            CommandName::Get if tokens.len() == 2 => Payload::Get,
            CommandName::QPush if tokens.len() >= 3 => {
                Payload::QPush(tokens[2..].iter().map(|t| t.to_string()).collect())
            }
            CommandName::QPop if tokens.len() == 2 => Payload::QPop,
            _ => return Ok(None),
        };

        let key = tokens[1];
        if key.is_empty() {
            return Ok(None);
        }

        Ok(Some(Operation {
            key: key.to_string(),
            payload,
            query: input.to_string(),
        }))
    }

    /// Parses the tail of a SET command.
    ///
    /// Accepted shapes, by token count:
    ///
    /// ```text
    /// 3: SET key value
    /// 4: SET key value NX|XX
    /// 5: SET key value EX seconds
    /// 6: SET key value EX seconds NX|XX
    /// ```
    fn parse_set(&self, tokens: &[&str]) -> ParseResult<Option<SetArgs>> {
        let (expiry, condition) = match tokens.len() {
            3 => (None, None),
            4 => match self.grammar.condition(CommandName::Set, tokens[3]) {
                Some(cond) => (None, Some(cond)),
                None => return Ok(None),
            },
            5 | 6 => {
                if !self.grammar.is_expiry_keyword(tokens[3]) {
                    return Ok(None);
                }

                // The expiry is checked before the trailing condition.
                let expiry = parse_expiry(tokens[4])?;

                let condition = match tokens.get(5) {
                    Some(kw) => match self.grammar.condition(CommandName::Set, kw) {
                        Some(cond) => Some(cond),
                        None => return Ok(None),
                    },
                    None => None,
                };

                (Some(expiry), condition)
            }
            _ => return Ok(None),
        };

        Ok(Some(SetArgs {
            value: tokens[2].to_string(),
            expiry,
            condition,
        }))
    }
}

/// Parses an expiry token as whole seconds.
fn parse_expiry(token: &str) -> ParseResult<u64> {
    token
        .parse::<u64>()
        .map_err(|source| ParseError::InvalidExpiry {
            token: token.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> ParseResult<Option<Operation>> {
        CommandParser::new().parse(input)
    }

    fn set_args(input: &str) -> SetArgs {
        match parse(input).unwrap().unwrap().payload {
            Payload::Set(args) => args,
            other => panic!("Expected SET payload, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse(""), Ok(None));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse("DEL foo"), Ok(None));
        assert_eq!(parse("set foo bar"), Ok(None));
    }

    #[test]
    fn test_set_plain() {
        let op = parse("SET foo bar").unwrap().unwrap();
        assert_eq!(op.name(), CommandName::Set);
        assert_eq!(op.key, "foo");
        assert_eq!(op.query, "SET foo bar");
        assert_eq!(
            op.payload,
            Payload::Set(SetArgs {
                value: "bar".to_string(),
                expiry: None,
                condition: None,
            })
        );
    }

    #[test]
    fn test_set_with_condition() {
        assert_eq!(set_args("SET foo bar NX").condition, Some(Condition::Nx));
        assert_eq!(set_args("SET foo bar XX").condition, Some(Condition::Xx));
        assert_eq!(parse("SET foo bar YY"), Ok(None));
    }

    #[test]
    fn test_set_with_expiry() {
        let args = set_args("SET foo bar EX 10");
        assert_eq!(args.expiry, Some(10));
        assert_eq!(args.condition, None);

        assert_eq!(set_args("SET foo bar EX 0").expiry, Some(0));
    }

    #[test]
    fn test_set_with_expiry_and_condition() {
        let args = set_args("SET foo bar EX 10 XX");
        assert_eq!(args.expiry, Some(10));
        assert_eq!(args.condition, Some(Condition::Xx));
    }

    #[test]
    fn test_set_ordering_rules() {
        // Condition must come after the expiry
        assert_eq!(parse("SET foo bar NX EX 10"), Ok(None));
        // EX without a number
        assert_eq!(parse("SET foo bar EX"), Ok(None));
        // Trailing token after the expiry must be a condition
        assert_eq!(parse("SET foo bar EX 10 PX"), Ok(None));
        // Position 3 must be EX when more than one token follows the value
        assert_eq!(parse("SET foo bar PX 10"), Ok(None));
        assert_eq!(parse("SET foo bar NX XX"), Ok(None));
    }

    #[test]
    fn test_set_arity() {
        assert_eq!(parse("SET"), Ok(None));
        assert_eq!(parse("SET foo"), Ok(None));
        assert_eq!(parse("SET foo bar EX 10 NX extra"), Ok(None));
    }

    #[test]
    fn test_set_malformed_expiry() {
        let err = parse("SET foo bar EX soon").unwrap_err();
        assert!(matches!(err, ParseError::InvalidExpiry { ref token, .. } if token == "soon"));

        // Negative values are rejected as malformed too
        assert!(parse("SET foo bar EX -5").is_err());

        // The expiry is checked before the trailing keyword
        assert!(parse("SET foo bar EX soon BAD").is_err());
    }

    #[test]
    fn test_get() {
        let op = parse("GET foo").unwrap().unwrap();
        assert_eq!(op.name(), CommandName::Get);
        assert_eq!(op.key, "foo");
        assert_eq!(op.payload, Payload::Get);

        assert_eq!(parse("GET"), Ok(None));
        assert_eq!(parse("GET foo bar"), Ok(None));
    }

    #[test]
    fn test_qpush() {
        let op = parse("QPUSH q a b c").unwrap().unwrap();
        assert_eq!(op.name(), CommandName::QPush);
        assert_eq!(
            op.payload,
            Payload::QPush(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );

        assert_eq!(parse("QPUSH q"), Ok(None));
    }

    #[test]
    fn test_qpop() {
        let op = parse("QPOP q").unwrap().unwrap();
        assert_eq!(op.payload, Payload::QPop);

        assert_eq!(parse("QPOP"), Ok(None));
        assert_eq!(parse("QPOP q extra"), Ok(None));
    }

    #[test]
    fn test_empty_key_rejected() {
        // Double space yields an empty key token
        assert_eq!(parse("GET  foo"), Ok(None));
        assert_eq!(parse("QPOP "), Ok(None));
    }

    #[test]
    fn test_custom_grammar() {
        let grammar = Grammar::default().with_command("PUT", CommandName::Set);
        let parser = CommandParser::with_grammar(grammar);

        let op = parser.parse("PUT foo bar NX").unwrap().unwrap();
        assert_eq!(op.name(), CommandName::Set);
        assert!(parser.parse("SET foo bar").unwrap().is_some());
    }

    #[test]
    fn test_grammar_conditions_are_per_command() {
        let grammar = Grammar::default();
        assert_eq!(grammar.condition(CommandName::Set, "NX"), Some(Condition::Nx));
        assert_eq!(grammar.condition(CommandName::QPush, "NX"), None);
        assert_eq!(grammar.condition(CommandName::Get, "XX"), None);
    }
}
