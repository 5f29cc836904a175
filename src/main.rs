//! GlowKV server binary.
//!
//! Wires the stores, the snapshot engine, and the background tasks
//! together, then accepts connections until killed.

use glowkv::commands::CommandHandler;
use glowkv::connection::{handle_connection, ConnectionStats};
use glowkv::persistence::{start_snapshot_task, SnapshotEngine, DEFAULT_SNAPSHOT_PATH};
use glowkv::storage::{start_reaper, ExpirationIndex, Keyspace};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Snapshot file path
    snapshot_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: glowkv::DEFAULT_HOST.to_string(),
            port: glowkv::DEFAULT_PORT,
            snapshot_path: DEFAULT_SNAPSHOT_PATH.to_string(),
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
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--snapshot-path" | "-s" => {
                    if i + 1 < args.len() {
                        config.snapshot_path = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --snapshot-path requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("GlowKV version {}", glowkv::VERSION);
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

fn print_help() {
    println!(
        r#"
GlowKV - A Tiny In-Memory Key-Value Store with TTLs and Snapshots

USAGE:
    glowkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>            Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>            Port to listen on (default: 6378)
    -s, --snapshot-path <PATH>   Snapshot file (default: rdb.bin)
    -v, --version                Print version information
        --help                   Print this help message

EXAMPLES:
    glowkv                         # Start on 127.0.0.1:6378
    glowkv --port 7000             # Start on port 7000
    glowkv -s /var/lib/kv/rdb.bin  # Persist somewhere else

CONNECTING:
    The protocol is plain text, one line per request:
    $ glowkv-cli
    > SET name glow
    OK
    > GET name
    glow
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
         ________             __ ___    _
        / ____/ /___ _      __/ //_/ |  / /
       / / __/ / __ \ | /| / / ,<  | | / /
      / /_/ / / /_/ / |/ |/ / /| | | |/ /
      \____/_/\____/|__/|__/_/ |_| |___/

GlowKV v{} - In-Memory Key-Value Store
──────────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        glowkv::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    // Create the stores (shared across all connections and tasks)
    let keyspace = Arc::new(Keyspace::new());
    let expirations = Arc::new(ExpirationIndex::new());
    info!("Stores initialized");

    // Restore the previous snapshot, if any. A malformed snapshot is a
    // fatal startup error.
    let snapshots = Arc::new(SnapshotEngine::new(&config.snapshot_path));
    let restored = snapshots.try_load(&keyspace, &expirations)?;
    info!(
        entries = restored,
        path = %config.snapshot_path,
        "Snapshot load complete"
    );

    // Start the background lifecycle tasks.
    let _reaper = start_reaper(Arc::clone(&keyspace), Arc::clone(&expirations));
    let _snapshot_task = start_snapshot_task(
        Arc::clone(&snapshots),
        Arc::clone(&keyspace),
        Arc::clone(&expirations),
    );

    // One command engine, cloned per connection.
    let commands = CommandHandler::new(Arc::clone(&keyspace), Arc::clone(&expirations));

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received, stopping server...");
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, commands, stats) => {}
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let commands = commands.clone();
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, commands, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
