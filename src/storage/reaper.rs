//! Background Expiration Reaper
//!
//! Active expiration for GlowKV. Lazy checks alone would leave a key that is
//! never read again resident forever, so a background task polls the
//! [`ExpirationIndex`] and evicts due keys from both stores.
//!
//! The loop is deliberately simple:
//!
//! 1. `peek()` the earliest deadline.
//! 2. Empty index, or a deadline still in the future: sleep the idle
//!    interval and retry.
//! 3. Deadline due: remove the key from the [`Keyspace`], pop it from the
//!    index, and loop again immediately so bursts of expirations drain in
//!    one pass.
//!
//! Keys stored with [`NEVER_EXPIRES`](crate::storage::NEVER_EXPIRES) carry a
//! deadline no realistic clock reaches, so the reaper never touches them.
//! The reaper only evicts entries whose deadline has already passed.

use crate::storage::{now_ms, ExpirationIndex, Keyspace};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// How long the reaper sleeps when there is nothing due.
pub const REAPER_IDLE_INTERVAL: Duration = Duration::from_secs(3);

/// Configuration for the reaper task.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Sleep between polls when the index is empty or the earliest deadline
    /// lies in the future.
    pub idle_interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            idle_interval: REAPER_IDLE_INTERVAL,
        }
    }
}

/// A handle to the running reaper task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct Reaper {
    shutdown_tx: watch::Sender<bool>,
}

impl Reaper {
    /// Spawns the reaper as a background task over the given stores.
    pub fn start(
        keyspace: Arc<Keyspace>,
        expirations: Arc<ExpirationIndex>,
        config: ReaperConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(reaper_loop(keyspace, expirations, config, shutdown_rx));

        info!("Background expiration reaper started");

        Self { shutdown_tx }
    }

    /// Stops the reaper. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main reaper loop.
async fn reaper_loop(
    keyspace: Arc<Keyspace>,
    expirations: Arc<ExpirationIndex>,
    config: ReaperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        // Drain everything that is already due, earliest first, without
        // sleeping between evictions.
        loop {
            match expirations.peek() {
                Some(entry) if entry.deadline_ms <= now_ms() => {
                    debug!(key = %entry.key, deadline_ms = entry.deadline_ms, "Evicting expired key");
                    keyspace.remove(&entry.key);
                    expirations.pop_min();
                }
                _ => break,
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.idle_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Reaper received shutdown signal");
                    return;
                }
            }
        }
    }
}

/// Starts the reaper with default configuration.
pub fn start_reaper(keyspace: Arc<Keyspace>, expirations: Arc<ExpirationIndex>) -> Reaper {
    Reaper::start(keyspace, expirations, ReaperConfig::default())
}
