//! Line Protocol Module
//!
//! GlowKV speaks a plain line-oriented protocol: each client request is a
//! single `\n`-terminated line, each server response is a single line. There
//! is no framing beyond the newline and no binary prefixes.
//!
//! The only parsing machinery the protocol needs is a tokenizer that cuts a
//! command line into a command word and argument tokens. Values may be bare
//! words, quoted strings, or JSON-like blocks, so the tokenizer comes in two
//! flavors:
//!
//! - [`cut_simple`]: whitespace-delimited tokens only (command words, keys,
//!   TTL numbers)
//! - [`cut_smart`]: additionally understands `"quoted strings"` with
//!   backslash escapes and balanced `{...}` / `[...]` blocks (values)
//!
//! Both return the token together with the unconsumed remainder, so callers
//! thread the remainder through successive cuts:
//!
//! ```
//! use glowkv::protocol::cut_smart;
//!
//! let (value, rest) = cut_smart(r#"{"a":1}  42"#).unwrap();
//! assert_eq!(value, r#"{"a":1}"#);
//! assert_eq!(rest, "42");
//! ```

pub mod tokenizer;

// Re-export commonly used items
pub use tokenizer::{cut_simple, cut_smart, TokenizeError};
