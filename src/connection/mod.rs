//! Connection Handling Module
//!
//! Each accepted TCP connection gets its own async task running a
//! read-one-line / reply-one-line loop.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                      (main.rs)                              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept() + spawn
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐   ┌──────────────┐   ┌────────────────┐   │
//! │  │ Read bytes  │──>│ Split lines  │──>│ Execute command │   │
//! │  └─────────────┘   └──────────────┘   └───────┬────────┘   │
//! │                                               │             │
//! │                                               ▼             │
//! │                                       ┌──────────────┐      │
//! │                                       │ Write reply  │      │
//! │                                       └──────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The framing contract is strict: exactly one `\n`-terminated response per
//! accepted request line, flushed immediately. `ESC` is handled here rather
//! than in the command engine because closing the socket is a transport
//! concern.

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, COMMAND_MAX_LEN,
};
