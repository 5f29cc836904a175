//! Snapshot Engine
//!
//! Writes point-in-time images of the in-memory state to disk and restores
//! them at startup.
//!
//! A snapshot starts from deep copies of the two stores. The copies are
//! taken sequentially, each under its own read lock, so the image is
//! crash-consistent but not strictly atomic across the stores: a TTL pushed
//! between the two copies can show up in one and not the other. The worst
//! outcome is a restored key whose TTL reverts to "never", which the next
//! snapshot corrects.
//!
//! On disk, every key present in the keyspace copy becomes one entry; its
//! deadline comes from the index copy, with both "absent" and the in-memory
//! [`NEVER_EXPIRES`] sentinel normalized to [`NO_EXP_TS`] so restored
//! entries without a TTL reappear without a deadline.
//!
//! The file itself is guarded by a read-write lock: saves serialize among
//! themselves and exclude loads. That lock never covers in-memory state.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::persistence::format::{self, FormatError};
use crate::storage::{now_ms, ExpirationIndex, Keyspace, NEVER_EXPIRES, NO_EXP_TS};

/// How often the background task writes a snapshot.
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(3);

/// Default snapshot file, relative to the server's working directory.
pub const DEFAULT_SNAPSHOT_PATH: &str = "rdb.bin";

/// Errors produced while saving or loading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot path exists but is not a regular file.
    #[error("snapshot path is not a regular file: {0}")]
    NotRegularFile(PathBuf),

    /// The file contents could not be decoded.
    #[error("snapshot format error: {0}")]
    Format(#[from] FormatError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Serializes and restores the in-memory state.
///
/// # Example
///
/// ```no_run
/// use glowkv::persistence::SnapshotEngine;
/// use glowkv::storage::{ExpirationIndex, Keyspace};
///
/// let keyspace = Keyspace::new();
/// let expirations = ExpirationIndex::new();
/// let engine = SnapshotEngine::new("rdb.bin");
///
/// engine.try_load(&keyspace, &expirations).unwrap();
/// // ... mutate the stores ...
/// engine.save(&keyspace, &expirations).unwrap();
/// ```
#[derive(Debug)]
pub struct SnapshotEngine {
    path: PathBuf,
    /// Guards the snapshot file, not the in-memory stores.
    file_lock: RwLock<()>,
    /// Completion timestamp of the most recent save (or startup load).
    last_snapshot_ms: AtomicI64,
}

impl SnapshotEngine {
    /// Creates an engine persisting to `path`. No file is touched yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_lock: RwLock::new(()),
            last_snapshot_ms: AtomicI64::new(0),
        }
    }

    /// The snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// UNIX milliseconds of the last completed save or startup load.
    pub fn last_snapshot_ms(&self) -> i64 {
        self.last_snapshot_ms.load(Ordering::Relaxed)
    }

    /// Writes a full snapshot of both stores to the file.
    ///
    /// Opens write-only with create-if-absent and truncate-on-open, streams
    /// every entry through a buffered writer, flushes, and fsyncs before
    /// returning. Returns the number of entries written.
    pub fn save(
        &self,
        keyspace: &Keyspace,
        expirations: &ExpirationIndex,
    ) -> Result<usize, SnapshotError> {
        let data = keyspace.deep_copy();
        let exps = expirations.deep_copy();

        let _guard = self.file_lock.write().unwrap();

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(&file);

        let keys = data.keys();
        debug!(entries = keys.len(), path = %self.path.display(), "Writing snapshot");

        for key in &keys {
            let value = match data.get(key) {
                Some(value) => value,
                None => continue,
            };
            let mut deadline_ms = exps.find_expiration(key).unwrap_or(NO_EXP_TS);
            if deadline_ms == NEVER_EXPIRES {
                deadline_ms = NO_EXP_TS;
            }
            format::write_entry(&mut writer, key, &value, deadline_ms)?;
        }

        // Flush our buffer to the kernel, then force the kernel to stable
        // storage before the file handle closes.
        writer.flush()?;
        file.sync_all()?;

        self.last_snapshot_ms.store(now_ms(), Ordering::Relaxed);
        Ok(keys.len())
    }

    /// Restores state from the snapshot file, if there is any.
    ///
    /// A missing file is created empty and loads nothing; an empty file
    /// loads nothing; a path that is not a regular file is an error. Every
    /// decoded entry lands in the keyspace, and entries with a real deadline
    /// are pushed into the expiration index. Any mid-stream decode failure,
    /// including a truncated trailing entry, aborts the load with an error.
    ///
    /// Returns the number of entries restored.
    pub fn try_load(
        &self,
        keyspace: &Keyspace,
        expirations: &ExpirationIndex,
    ) -> Result<usize, SnapshotError> {
        let _guard = self.file_lock.read().unwrap();

        match std::fs::metadata(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                File::create(&self.path)?;
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
            Ok(meta) => {
                if !meta.is_file() {
                    return Err(SnapshotError::NotRegularFile(self.path.clone()));
                }
                if meta.len() == 0 {
                    return Ok(0);
                }
            }
        }

        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let mut loaded = 0usize;

        while let Some(entry) = format::read_entry(&mut reader)? {
            keyspace.set(entry.key.clone(), entry.value);
            if entry.deadline_ms != NO_EXP_TS {
                expirations.push(entry.key, entry.deadline_ms);
            }
            loaded += 1;
        }

        self.last_snapshot_ms.store(now_ms(), Ordering::Relaxed);
        info!(entries = loaded, path = %self.path.display(), "Snapshot restored");
        Ok(loaded)
    }
}

/// A handle to the periodic snapshot task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct SnapshotTask {
    shutdown_tx: watch::Sender<bool>,
}

impl SnapshotTask {
    /// Spawns the periodic snapshot task over the given stores.
    pub fn start(
        engine: Arc<SnapshotEngine>,
        keyspace: Arc<Keyspace>,
        expirations: Arc<ExpirationIndex>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(snapshot_loop(
            engine,
            keyspace,
            expirations,
            interval,
            shutdown_rx,
        ));

        info!("Background snapshot task started");

        Self { shutdown_tx }
    }

    /// Stops the task. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for SnapshotTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main snapshot loop. Save failures are logged and the next tick
/// proceeds normally.
async fn snapshot_loop(
    engine: Arc<SnapshotEngine>,
    keyspace: Arc<Keyspace>,
    expirations: Arc<ExpirationIndex>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                match engine.save(&keyspace, &expirations) {
                    Ok(entries) => debug!(entries, "Snapshot completed"),
                    Err(e) => warn!(error = %e, "Snapshot failed"),
                }
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Snapshot task received shutdown signal");
                    return;
                }
            }
        }
    }
}

/// Starts the periodic snapshot task with the default interval.
pub fn start_snapshot_task(
    engine: Arc<SnapshotEngine>,
    keyspace: Arc<Keyspace>,
    expirations: Arc<ExpirationIndex>,
) -> SnapshotTask {
    SnapshotTask::start(engine, keyspace, expirations, SNAPSHOT_INTERVAL)
}
