//! Command Engine Module
//!
//! Turns one request line into one result string.
//!
//! ```text
//! "SET cfg {\"a\":1} 30"
//!        │
//!        ▼
//! ┌─────────────────┐
//! │ CommandHandler  │
//! │                 │
//! │  - tokenize     │   (protocol module)
//! │  - dispatch     │
//! │  - execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//!   Keyspace + ExpirationIndex
//! ```
//!
//! The command word is case-insensitive; arguments are case-sensitive and
//! parsed with the tokenizer (`cut_smart` for values, so quoted strings and
//! JSON-like blocks work, `cut_simple` for everything else). Failures come
//! back as [`CommandError`] values whose `Display` text is exactly what the
//! client sees after the `ERR: ` prefix.
//!
//! ## Command surface
//!
//! - `GET key`
//! - `SET key value [ttl_sec]`
//! - `DEL key`
//! - `SETEXP key ttl_sec`
//! - `PING`
//! - `HELP`
//! - `ESC`

pub mod handler;

// Re-export the main command handler
pub use handler::{CommandError, CommandHandler};
