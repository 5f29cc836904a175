//! Command Handlers
//!
//! Implements every command GlowKV speaks. Each handler parses its own
//! arguments off the raw argument string and mutates the two stores.
//!
//! Mutating commands touch the stores in a fixed order, Keyspace first and
//! ExpirationIndex second, so two writers can never deadlock against each
//! other and the index entry for a key always trails its value by at most
//! one store operation.
//!
//! Every `SET` pushes an expiration entry: real TTLs become absolute
//! millisecond deadlines, and the no-TTL case is stored as
//! [`NEVER_EXPIRES`] so `SETEXP` can later attach a real deadline to any
//! live key.

use crate::protocol::{cut_simple, cut_smart, TokenizeError};
use crate::storage::{now_ms, ExpirationIndex, Keyspace, NEVER_EXPIRES};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Single-line summary returned by `HELP`.
const HELP_TEXT: &str = "commands: GET key | SET key value [ttl_sec] | DEL key | \
                         SETEXP key ttl_sec | PING | HELP | ESC";

/// Errors a command can produce. The `Display` text is the exact message
/// sent to the client after the `ERR: ` prefix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The tokenizer or an argument decoder rejected the input.
    #[error("command parsing error: {0}")]
    Parse(String),

    /// GET on a key that is not present.
    #[error("No such KEY is present: {0}")]
    NoSuchKey(String),

    /// SETEXP on a key with no expiration entry.
    #[error("you tried to update expiration for a non existing key")]
    NoSuchExpiration,

    /// The command word is not in the dispatch table.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

impl From<TokenizeError> for CommandError {
    fn from(e: TokenizeError) -> Self {
        CommandError::Parse(e.to_string())
    }
}

/// Parses and executes commands against the shared stores.
///
/// Cloning is cheap; each connection task carries its own handle.
///
/// # Example
///
/// ```
/// use glowkv::commands::CommandHandler;
/// use glowkv::storage::{ExpirationIndex, Keyspace};
/// use std::sync::Arc;
///
/// let handler = CommandHandler::new(
///     Arc::new(Keyspace::new()),
///     Arc::new(ExpirationIndex::new()),
/// );
///
/// assert_eq!(handler.execute("SET greeting hello").unwrap(), "");
/// assert_eq!(handler.execute("GET greeting").unwrap(), "hello");
/// ```
#[derive(Debug, Clone)]
pub struct CommandHandler {
    keyspace: Arc<Keyspace>,
    expirations: Arc<ExpirationIndex>,
}

impl CommandHandler {
    /// Creates a handler over the given stores.
    pub fn new(keyspace: Arc<Keyspace>, expirations: Arc<ExpirationIndex>) -> Self {
        Self {
            keyspace,
            expirations,
        }
    }

    /// Executes one full command line.
    ///
    /// Returns the result string on success; an empty result means "done,
    /// nothing to report" and is rendered as `OK` by the connection layer.
    pub fn execute(&self, line: &str) -> Result<String, CommandError> {
        let (word, args) = cut_simple(line)?;
        self.dispatch(&word.to_uppercase(), args)
    }

    /// Dispatches a canonicalized command word to its handler.
    fn dispatch(&self, cmd: &str, args: &str) -> Result<String, CommandError> {
        match cmd {
            "GET" => self.cmd_get(args),
            "SET" => self.cmd_set(args),
            "DEL" => self.cmd_del(args),
            "SETEXP" => self.cmd_setexp(args),
            "PING" => Ok("PONG".to_string()),
            "HELP" => Ok(HELP_TEXT.to_string()),
            // The connection layer intercepts ESC to actually close; this
            // arm keeps the reply correct for any other caller.
            "ESC" => Ok("closing connection.".to_string()),
            _ => Err(CommandError::UnknownCommand(cmd.to_string())),
        }
    }

    /// `GET key`
    fn cmd_get(&self, args: &str) -> Result<String, CommandError> {
        let (key, _) = cut_simple(args)?;
        self.keyspace
            .get(key)
            .ok_or_else(|| CommandError::NoSuchKey(key.to_string()))
    }

    /// `SET key value [ttl_sec]`
    ///
    /// The value goes through `cut_smart`, so quoted strings and JSON-like
    /// blocks arrive as single tokens (delimiters included).
    fn cmd_set(&self, args: &str) -> Result<String, CommandError> {
        let (key, rest) = cut_simple(args)?;
        let (value, rest) = cut_smart(rest)?;

        let mut ttl_sec: i64 = -1;
        if !rest.is_empty() {
            let (ttl_tok, _) = cut_simple(rest)?;
            ttl_sec = ttl_tok
                .parse::<i64>()
                .map_err(|e| CommandError::Parse(e.to_string()))?;
        }

        let deadline_ms = deadline_from_ttl(ttl_sec);

        debug!(key, ttl_sec, deadline_ms, "SET");
        self.keyspace.set(key.to_string(), value.to_string());
        self.expirations.push(key.to_string(), deadline_ms);
        Ok(String::new())
    }

    /// `DEL key`
    fn cmd_del(&self, args: &str) -> Result<String, CommandError> {
        let (key, _) = cut_simple(args)?;

        debug!(key, "DEL");
        self.keyspace.remove(key);
        self.expirations.remove(key);
        Ok(String::new())
    }

    /// `SETEXP key ttl_sec`
    fn cmd_setexp(&self, args: &str) -> Result<String, CommandError> {
        let (key, rest) = cut_simple(args)?;
        let (ttl_tok, _) = cut_simple(rest)?;
        let ttl_sec = ttl_tok
            .parse::<i64>()
            .map_err(|e| CommandError::Parse(e.to_string()))?;

        let deadline_ms = deadline_from_ttl(ttl_sec);

        debug!(key, ttl_sec, deadline_ms, "SETEXP");
        if self.expirations.update_expiration(key, deadline_ms) {
            Ok(String::new())
        } else {
            Err(CommandError::NoSuchExpiration)
        }
    }
}

/// Converts a TTL in seconds to an absolute deadline. `-1` means "never".
fn deadline_from_ttl(ttl_sec: i64) -> i64 {
    if ttl_sec == -1 {
        NEVER_EXPIRES
    } else {
        now_ms() + ttl_sec * 1000
    }
}
