//! TideKV server
//!
//! Sets up logging, the storage engine, and a TCP listener that serves the
//! line protocol.

use std::sync::Arc;
use std::time::Duration;
use tidekv::commands::{CommandHandler, EngineConfig};
use tidekv::connection::{handle_connection, ConnectionStats};
use tidekv::protocol::CommandParser;
use tidekv::storage::StorageEngine;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Per-command deadline
    command_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: tidekv::DEFAULT_HOST.to_string(),
            port: tidekv::DEFAULT_PORT,
            command_timeout: tidekv::commands::DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    config.host = flag_value(&args, i, "--host").to_string();
                    i += 2;
                }
                "--port" | "-p" => {
                    config.port = flag_value(&args, i, "--port").parse().unwrap_or_else(|_| {
                        eprintln!("Error: invalid port number");
                        std::process::exit(1);
                    });
                    i += 2;
                }
                "--timeout-ms" | "-t" => {
                    let ms: u64 = flag_value(&args, i, "--timeout-ms")
                        .parse()
                        .unwrap_or_else(|_| {
                            eprintln!("Error: invalid timeout");
                            std::process::exit(1);
                        });
                    config.command_timeout = Duration::from_millis(ms);
                    i += 2;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("TideKV version {}", tidekv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Returns the value following flag `i`, or exits.
fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
TideKV - A Small In-Memory Key-Value and Queue Engine

USAGE:
    tidekv [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>        Port to listen on (default: 6380)
    -t, --timeout-ms <MS>    Per-command deadline in milliseconds (default: 5000)
    -v, --version            Print version information
        --help               Print this help message

Set RUST_LOG to change the log level (default: info).

CONNECTING:
    Send one command per line, e.g. with netcat:
    $ nc 127.0.0.1 6380
    SET name tide EX 60
    +OK
    GET name
    $4
    tide
    QPUSH jobs a b
    +OK
    QPOP jobs
    $1
    a
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Initiating startup, TideKV v{}", tidekv::VERSION);

    // Shared across all connections
    let storage = Arc::new(StorageEngine::new());
    let handler = CommandHandler::with_config(
        storage,
        CommandParser::new(),
        EngineConfig {
            command_timeout: config.command_timeout,
        },
    );
    info!(timeout = ?config.command_timeout, "Storage engine initialized");

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            // Without a signal handler, run until killed
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, handler, stats) => {}
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Accepts connections and spawns a task for each one.
async fn accept_loop(listener: TcpListener, handler: CommandHandler, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = handler.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
