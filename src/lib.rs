//! # GlowKV - A Tiny In-Memory Key-Value Store with TTLs and Snapshots
//!
//! GlowKV is an in-memory key-value database written in Rust. It speaks a
//! line-oriented TCP protocol (one request line, one response line), gives
//! every key an optional time-to-live, and periodically persists a full
//! snapshot of its state to a binary file.
//!
//! ## Features
//!
//! - **Line protocol**: plain `\n`-terminated text commands, trivially
//!   usable from `nc` or the bundled `glowkv-cli`
//! - **Per-key TTL**: lazy normalization plus a background reaper driven by
//!   a keyed min-heap over absolute deadlines
//! - **Snapshot persistence**: periodic full-state dumps restored at startup
//! - **Async I/O**: built on Tokio, one task per connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              GlowKV                                 │
//! │                                                                     │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐              │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │              │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │              │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘              │
//! │                                               │                     │
//! │                                               ▼                     │
//! │  ┌─────────────┐    ┌──────────────────┐  ┌──────────────────────┐  │
//! │  │  Tokenizer  │    │     Keyspace     │  │   ExpirationIndex    │  │
//! │  │ (cut_smart) │    │ RwLock<HashMap>  │  │ keyed min-heap+RwLock│  │
//! │  └─────────────┘    └────────▲─────────┘  └──────────▲───────────┘  │
//! │                              │                       │              │
//! │             ┌────────────────┴───────┬───────────────┘              │
//! │             │        Reaper          │     SnapshotEngine           │
//! │             │ (background eviction)  │  (periodic rdb.bin dumps)    │
//! │             └────────────────────────┴──────────────────────────────┤
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use glowkv::commands::CommandHandler;
//! use glowkv::connection::{handle_connection, ConnectionStats};
//! use glowkv::persistence::{start_snapshot_task, SnapshotEngine};
//! use glowkv::storage::{start_reaper, ExpirationIndex, Keyspace};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let keyspace = Arc::new(Keyspace::new());
//!     let expirations = Arc::new(ExpirationIndex::new());
//!
//!     // Restore whatever the last run left behind.
//!     let snapshots = Arc::new(SnapshotEngine::new("rdb.bin"));
//!     snapshots.try_load(&keyspace, &expirations).unwrap();
//!
//!     // Background lifecycle tasks.
//!     let _reaper = start_reaper(Arc::clone(&keyspace), Arc::clone(&expirations));
//!     let _snapshots = start_snapshot_task(
//!         Arc::clone(&snapshots),
//!         Arc::clone(&keyspace),
//!         Arc::clone(&expirations),
//!     );
//!
//!     let commands = CommandHandler::new(keyspace, expirations);
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("127.0.0.1:6378").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         tokio::spawn(handle_connection(
//!             stream,
//!             addr,
//!             commands.clone(),
//!             Arc::clone(&stats),
//!         ));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `GET key` - fetch a value
//! - `SET key value [ttl_sec]` - store a value, optionally expiring; the
//!   value may be bare, `"quoted"`, or a JSON-like `{...}`/`[...]` block
//! - `DEL key` - remove a key
//! - `SETEXP key ttl_sec` - change the TTL of an existing key
//! - `PING` - liveness check
//! - `HELP` - one-line command summary
//! - `ESC` - close the connection
//!
//! ## Module Overview
//!
//! - [`protocol`]: the command-line tokenizer
//! - [`storage`]: keyspace, expiration index, and the reaper
//! - [`persistence`]: snapshot format, engine, and periodic task
//! - [`commands`]: command parsing and dispatch
//! - [`connection`]: per-client line loop
//!
//! ## Design Highlights
//!
//! ### Keyed min-heap
//!
//! The expiration index is a binary heap over deadlines with a side map
//! from key to heap slot, maintained on every swap. That keeps "what
//! expires next" at O(1) while still allowing O(log n) deadline updates and
//! removals addressed by key.
//!
//! ### Lazy + Active Expiry
//!
//! The reaper evicts due keys in the background in deadline order, so even
//! keys that are never read again get reclaimed; bursts are drained without
//! sleeping between evictions.
//!
//! ### Crash-consistent snapshots
//!
//! The snapshot engine deep-copies both stores (each under its own read
//! lock), streams every entry to disk, and fsyncs before the file handle
//! closes. Startup restores the file, so a crash costs at most one
//! snapshot interval of writes.

pub mod commands;
pub mod connection;
pub mod persistence;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandError, CommandHandler};
pub use connection::{handle_connection, ConnectionStats};
pub use persistence::{start_snapshot_task, SnapshotEngine, SnapshotTask};
pub use protocol::{cut_simple, cut_smart, TokenizeError};
pub use storage::{start_reaper, ExpirationIndex, Keyspace, Reaper};

/// The default port GlowKV listens on (one below the port Redis made
/// famous).
pub const DEFAULT_PORT: u16 = 6378;

/// The default host GlowKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of GlowKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
