//! Snapshot Persistence Module
//!
//! GlowKV persists its state as periodic full snapshots: every interval the
//! [`SnapshotEngine`] serializes a consistent copy of the keyspace and the
//! expiration index to a single binary file, and on startup it restores
//! whatever that file holds.
//!
//! ```text
//!  Keyspace ──deep_copy()──┐
//!                          ├──> SnapshotEngine::save ──> rdb.bin
//!  ExpirationIndex ────────┘         (flush + fsync)
//! ```
//!
//! The file is a flat concatenation of entries with no header, footer, or
//! checksum; see [`format`] for the exact layout. The snapshot file has its
//! own read-write lock so snapshots serialize among themselves and exclude
//! concurrent loads; in-memory consistency is the job of the store locks,
//! not this one.

pub mod format;
pub mod snapshot;

// Re-export commonly used types
pub use format::{read_entry, write_entry, FormatError, SnapshotEntry};
pub use snapshot::{
    start_snapshot_task, SnapshotEngine, SnapshotError, SnapshotTask, DEFAULT_SNAPSHOT_PATH,
    SNAPSHOT_INTERVAL,
};
