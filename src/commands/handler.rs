//! Command Dispatcher
//!
//! [`CommandHandler`] is the single entry point of the engine. It takes one
//! raw command line and runs it through:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │   parse()   │───>│  dispatch() │───>│  execute()  │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      StorageEngine          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A malformed argument fails before anything else happens. A structurally
//! invalid line fails with [`CommandError::InvalidCommand`]. A valid
//! operation runs on its own task under a deadline; if the deadline passes
//! first, the task is aborted (dropping any lock it was waiting on or
//! holding) and the caller gets [`CommandError::Timeout`]. A task that
//! completes while being aborted reports its real result.

use crate::protocol::{CommandParser, Operation, ParseError, Payload};
use crate::storage::{StorageEngine, StorageError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Default time a command may run before it is aborted.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors returned to the caller of [`CommandHandler::command`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// An argument was in the right position but could not be parsed
    #[error("malformed argument: {0}")]
    MalformedArgument(#[from] ParseError),

    /// Unknown command, wrong arity, or bad keyword order
    #[error("invalid command")]
    InvalidCommand,

    /// GET on an absent or expired key
    #[error("key not found")]
    KeyNotFound,

    /// QPOP on an absent or empty queue
    #[error("queue is empty or not found")]
    QueueEmpty,

    /// The command did not finish before its deadline
    #[error("command timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// The handler task failed without producing a result
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for CommandError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::KeyNotFound => CommandError::KeyNotFound,
            StorageError::QueueEmpty => CommandError::QueueEmpty,
        }
    }
}

/// Result type for command execution.
pub type CommandResult<T> = Result<T, CommandError>;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline applied by [`CommandHandler::command`]
    pub command_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// Parses command lines and executes them against the storage engine.
///
/// Cloning is cheap; every clone shares the same store.
///
/// # Example
///
/// ```
/// use tidekv::commands::{CommandHandler, CommandError};
/// use tidekv::storage::StorageEngine;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
///
/// assert_eq!(handler.command("SET foo bar").await, Ok(None));
/// assert_eq!(handler.command("GET foo").await, Ok(Some("bar".to_string())));
/// assert_eq!(handler.command("GET nope").await, Err(CommandError::KeyNotFound));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
    /// Line parser, shared between clones
    parser: Arc<CommandParser>,
    config: EngineConfig,
}

impl CommandHandler {
    /// Creates a handler with the standard grammar and default settings.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self::with_config(storage, CommandParser::new(), EngineConfig::default())
    }

    /// Creates a handler with a custom parser and settings.
    pub fn with_config(
        storage: Arc<StorageEngine>,
        parser: CommandParser,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            parser: Arc::new(parser),
            config,
        }
    }

    /// Returns the storage engine.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Returns the engine settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Executes a command line with the configured timeout.
    ///
    /// # Returns
    ///
    /// The value for GET and QPOP, `None` for SET and QPUSH. A conditional
    /// SET whose condition does not hold also returns `None`.
    pub async fn command(&self, raw: &str) -> CommandResult<Option<String>> {
        self.command_with_timeout(raw, self.config.command_timeout)
            .await
    }

    /// Executes a command line, giving up after `timeout`.
    pub async fn command_with_timeout(
        &self,
        raw: &str,
        timeout: Duration,
    ) -> CommandResult<Option<String>> {
        self.command_with_deadline(raw, Instant::now() + timeout)
            .await
    }

    /// Executes a command line, giving up at `deadline`.
    pub async fn command_with_deadline(
        &self,
        raw: &str,
        deadline: Instant,
    ) -> CommandResult<Option<String>> {
        let op = match self.parser.parse(raw) {
            Ok(Some(op)) => op,
            Ok(None) => {
                debug!(query = raw, "Invalid command");
                return Err(CommandError::InvalidCommand);
            }
            Err(e) => {
                debug!(query = raw, error = %e, "Malformed argument");
                return Err(e.into());
            }
        };

        let name = op.name();
        let started = Instant::now();

        let storage = Arc::clone(&self.storage);
        let task = tokio::spawn(dispatch(storage, op));

        let result = join_by_deadline(task, deadline, started).await;
        match &result {
            Err(CommandError::Timeout { elapsed }) => {
                warn!(query = raw, ?elapsed, "Command timed out");
            }
            Err(CommandError::Internal(e)) => {
                warn!(query = raw, error = %e, "Command task failed");
            }
            _ => {}
        }

        if result.is_ok() {
            info!(command = %name, query = raw, "Query executed");
        }

        result
    }
}

/// Waits for a command task until `deadline`, aborting it if the deadline
/// passes first.
///
/// An aborted task is awaited before returning. If it finished before the
/// abort took effect, its result is returned instead of a timeout, so a
/// `Timeout` always means the command had no effect.
async fn join_by_deadline(
    mut task: JoinHandle<CommandResult<Option<String>>>,
    deadline: Instant,
    started: Instant,
) -> CommandResult<Option<String>> {
    let joined = match timeout_at(deadline, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            task.abort();
            match task.await {
                Err(e) if e.is_cancelled() => {
                    return Err(CommandError::Timeout {
                        elapsed: started.elapsed(),
                    })
                }
                joined => joined,
            }
        }
    };

    joined.unwrap_or_else(|e| Err(CommandError::Internal(e.to_string())))
}

/// Routes an operation to its store handler by canonical command.
async fn dispatch(storage: Arc<StorageEngine>, op: Operation) -> CommandResult<Option<String>> {
    let Operation { key, payload, .. } = op;

    match payload {
        Payload::Set(args) => {
            let ttl = args.ttl();
            storage.set(&key, args.value, ttl, args.condition).await;
            Ok(None)
        }
        Payload::Get => Ok(Some(storage.get(&key).await?)),
        Payload::QPush(values) => {
            storage.qpush(&key, values).await;
            Ok(None)
        }
        Payload::QPop => Ok(Some(storage.qpop(&key).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_handler() -> CommandHandler {
        CommandHandler::new(Arc::new(StorageEngine::new()))
    }

    fn some(s: &str) -> CommandResult<Option<String>> {
        Ok(Some(s.to_string()))
    }

    #[tokio::test]
    async fn test_set_get() {
        let handler = create_handler();

        assert_eq!(handler.command("SET foo bar").await, Ok(None));
        assert_eq!(handler.command("GET foo").await, some("bar"));
    }

    #[tokio::test]
    async fn test_get_never_set() {
        let handler = create_handler();
        assert_eq!(handler.command("GET foo").await, Err(CommandError::KeyNotFound));
    }

    #[tokio::test]
    async fn test_set_with_expiry() {
        let handler = create_handler();

        handler.command("SET foo bar EX 1").await.unwrap();
        assert_eq!(handler.command("GET foo").await, some("bar"));

        tokio::time::sleep(Duration::from_millis(1100)).await;

        // Expired and never-set keys look the same
        assert_eq!(handler.command("GET foo").await, Err(CommandError::KeyNotFound));
    }

    #[tokio::test]
    async fn test_set_nx_keeps_existing() {
        let handler = create_handler();

        handler.command("SET foo bar").await.unwrap();
        assert_eq!(handler.command("SET foo baz NX").await, Ok(None));
        assert_eq!(handler.command("GET foo").await, some("bar"));
    }

    #[tokio::test]
    async fn test_set_xx_on_absent_key() {
        let handler = create_handler();

        assert_eq!(handler.command("SET foo bar XX").await, Ok(None));
        assert_eq!(handler.command("GET foo").await, Err(CommandError::KeyNotFound));
    }

    #[tokio::test]
    async fn test_set_expiry_and_condition() {
        let handler = create_handler();

        handler.command("SET foo bar").await.unwrap();
        handler.command("SET foo baz EX 100 XX").await.unwrap();
        assert_eq!(handler.command("GET foo").await, some("baz"));
    }

    #[tokio::test]
    async fn test_queue_fifo() {
        let handler = create_handler();

        assert_eq!(handler.command("QPUSH q a b c").await, Ok(None));
        assert_eq!(handler.command("QPOP q").await, some("a"));
        assert_eq!(handler.command("QPOP q").await, some("b"));
        assert_eq!(handler.command("QPOP q").await, some("c"));
        assert_eq!(handler.command("QPOP q").await, Err(CommandError::QueueEmpty));
    }

    #[tokio::test]
    async fn test_malformed_expiry_leaves_store_untouched() {
        let handler = create_handler();

        let err = handler.command("SET foo bar EX abc").await.unwrap_err();
        assert!(matches!(err, CommandError::MalformedArgument(_)));

        let stats = handler.storage().stats();
        assert_eq!(stats.set_ops, 0);
        assert_eq!(stats.keys, 0);
    }

    #[tokio::test]
    async fn test_invalid_commands() {
        let handler = create_handler();

        for raw in ["", "PING", "GET", "SET foo", "SET foo bar NX EX 10", "QPUSH q"] {
            assert_eq!(
                handler.command(raw).await,
                Err(CommandError::InvalidCommand),
                "{:?} should be invalid",
                raw
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_nx_race() {
        let handler = create_handler();
        let mut handles = vec![];

        for i in 0..16 {
            let handler = handler.clone();
            handles.push(tokio::spawn(async move {
                let raw = format!("SET race v{} NX", i);
                handler.command(&raw).await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(None));
        }

        let stats = handler.storage().stats();
        assert_eq!(stats.set_ops, 16);
        assert_eq!(stats.skipped_sets, 15);
        assert_eq!(stats.keys, 1);

        let value = handler.command("GET race").await.unwrap().unwrap();
        assert!(value.starts_with('v'));
    }

    #[tokio::test]
    async fn test_timeout_aborts_and_releases() {
        let handler = create_handler();
        let storage = Arc::clone(handler.storage());

        let guard = storage.shard("blocked").data.write().await;

        let err = handler
            .command_with_timeout("SET blocked late", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));

        // Keys on other shards are not stalled
        let other = (0..)
            .map(|i| format!("other-{}", i))
            .find(|k| storage.shard_index(k) != storage.shard_index("blocked"))
            .unwrap();
        assert_eq!(
            handler
                .command_with_timeout(&format!("SET {} v", other), Duration::from_secs(1))
                .await,
            Ok(None)
        );

        drop(guard);

        // The aborted write never lands
        assert_eq!(handler.command("GET blocked").await, Err(CommandError::KeyNotFound));
        assert_eq!(handler.command("SET blocked v").await, Ok(None));
        assert_eq!(handler.command("GET blocked").await, some("v"));
    }

    #[tokio::test]
    async fn test_huge_expiry_is_stored_without_expiring() {
        let handler = create_handler();

        assert_eq!(
            handler.command("SET k v EX 18446744073709551615").await,
            Ok(None)
        );
        assert_eq!(handler.command("GET k").await, some("v"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_task_finishing_during_abort_reports_its_result() {
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();

        let task = tokio::spawn(async move {
            started_tx.send(()).unwrap();
            // Blocks the worker so the abort lands mid-poll
            std::thread::sleep(Duration::from_millis(100));
            Ok(Some("done".to_string()))
        });
        started_rx.await.unwrap();

        let now = Instant::now();
        assert_eq!(join_by_deadline(task, now, now).await, some("done"));
    }

    #[tokio::test]
    async fn test_pending_task_times_out() {
        let task = tokio::spawn(std::future::pending::<CommandResult<Option<String>>>());

        let now = Instant::now();
        let err = join_by_deadline(task, now + Duration::from_millis(20), now)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_custom_timeout_config() {
        let handler = CommandHandler::with_config(
            Arc::new(StorageEngine::new()),
            CommandParser::new(),
            EngineConfig {
                command_timeout: Duration::from_millis(20),
            },
        );
        assert_eq!(handler.config().command_timeout, Duration::from_millis(20));

        let storage = Arc::clone(handler.storage());
        let _guard = storage.shard("q").queues.write().await;

        let err = handler.command("QPOP q").await.unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(CommandError::KeyNotFound.to_string(), "key not found");
        assert_eq!(
            CommandError::QueueEmpty.to_string(),
            "queue is empty or not found"
        );
        assert_eq!(CommandError::InvalidCommand.to_string(), "invalid command");
    }
}
