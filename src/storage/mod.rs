//! Storage Module
//!
//! The in-memory heart of GlowKV: two stores plus the background task that
//! keeps them honest.
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │          Keyspace            │   │       ExpirationIndex        │
//! │  RwLock<HashMap<Key,Value>>  │   │  RwLock<min-heap + pos map>  │
//! └──────────────┬───────────────┘   └──────────────┬───────────────┘
//!                │      remove(key)     pop_min()   │
//!                └───────────┐      ┌───────────────┘
//!                            ▼      ▼
//!                     ┌────────────────────┐
//!                     │       Reaper       │
//!                     │ (background task)  │
//!                     └────────────────────┘
//! ```
//!
//! The [`Keyspace`] maps keys to values; the [`ExpirationIndex`] is a keyed
//! min-heap over absolute deadlines so the earliest-expiring key is always
//! one `peek()` away. The [`Reaper`] polls the index and evicts due keys
//! from both stores.
//!
//! Each store carries its own `RwLock`: readers share, writers exclude, and
//! `deep_copy` takes a consistent snapshot under the read lock. When a code
//! path touches both stores it locks the Keyspace before the
//! ExpirationIndex.

pub mod expiry;
pub mod keyspace;
pub mod reaper;

// Re-export commonly used types
pub use expiry::{now_ms, Expiration, ExpirationIndex, NEVER_EXPIRES, NO_EXP_TS};
pub use keyspace::Keyspace;
pub use reaper::{start_reaper, Reaper, ReaperConfig};
