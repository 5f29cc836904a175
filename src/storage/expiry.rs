//! Keyed Expiration Index
//!
//! A thread-safe min-priority queue over key deadlines. The backbone is a
//! classic array-backed binary heap ordered by `deadline_ms` ascending,
//! augmented with a key→slot map that is updated on every swap. The map buys
//! two things a plain heap cannot offer:
//!
//! - O(1) deadline lookup by key ([`ExpirationIndex::find_expiration`])
//! - O(log n) in-place deadline update and removal by key
//!
//! The raw heap moves (`swap`, `sift_up`, `sift_down`) live on the private
//! inner state and are only reachable from public methods that already hold
//! the lock. After every public operation the structure upholds: for every
//! slot `i`, `pos[items[i].key] == i`, and `pos.len() == items.len()`. A
//! stale map entry is a programmer error and aborts the process.
//!
//! Deadlines are absolute UNIX-epoch milliseconds. Keys without a TTL are
//! stored with [`NEVER_EXPIRES`] so that every live key has exactly one
//! index entry; the reaper can never reach such a deadline and the snapshot
//! engine normalizes it to [`NO_EXP_TS`] on disk.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Persisted sentinel meaning "no expiration".
pub const NO_EXP_TS: i64 = -1;

/// In-memory synonym for "no expiration"; sorts after every real deadline.
pub const NEVER_EXPIRES: i64 = i64::MAX;

/// Returns the current UNIX time in milliseconds.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_millis() as i64
}

/// One scheduled expiration: a key and its absolute deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiration {
    pub key: String,
    pub deadline_ms: i64,
}

/// Heap storage plus the key→slot map, kept in lockstep.
#[derive(Debug, Clone, Default)]
struct IndexInner {
    items: Vec<Expiration>,
    pos: HashMap<String, usize>,
}

impl IndexInner {
    fn less(&self, a: usize, b: usize) -> bool {
        self.items[a].deadline_ms < self.items[b].deadline_ms
    }

    /// Swaps two slots and rewrites their map entries.
    fn swap(&mut self, a: usize, b: usize) {
        self.items.swap(a, b);
        for &i in &[a, b] {
            let key = &self.items[i].key;
            *self
                .pos
                .get_mut(key)
                .expect("expiration index out of sync") = i;
        }
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.less(i, parent) {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let n = self.items.len();
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < n && self.less(right, left) {
                smallest = right;
            }
            if !self.less(smallest, i) {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }

    /// Restores heap order around slot `i` after its deadline changed.
    fn reheapify(&mut self, i: usize) {
        self.sift_down(i);
        self.sift_up(i);
    }

    /// Detaches slot `i` by swapping it with the last slot, popping, and
    /// re-heapifying whatever landed in `i`.
    fn remove_at(&mut self, i: usize) -> Expiration {
        let last = self.items.len() - 1;
        self.swap(i, last);
        let entry = self.items.pop().expect("remove_at on empty heap");
        self.pos.remove(&entry.key);
        if i < self.items.len() {
            self.reheapify(i);
        }
        entry
    }
}

/// The in-memory keyed min-priority queue over deadlines.
///
/// # Thread Safety
///
/// Wrapped in an `Arc` and shared across client handlers, the reaper, and
/// the snapshot engine. Readers (`peek`, `find_expiration`, `len`,
/// `deep_copy`) share the lock; mutations take it exclusively.
///
/// # Example
///
/// ```
/// use glowkv::storage::{ExpirationIndex, NEVER_EXPIRES};
///
/// let index = ExpirationIndex::new();
/// index.push("soon".to_string(), 1_000);
/// index.push("later".to_string(), 2_000);
/// index.push("never".to_string(), NEVER_EXPIRES);
///
/// assert_eq!(index.peek().unwrap().key, "soon");
/// assert_eq!(index.find_expiration("later"), Some(2_000));
/// ```
#[derive(Debug, Default)]
pub struct ExpirationIndex {
    inner: RwLock<IndexInner>,
}

impl ExpirationIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry with the smallest deadline without removing it.
    pub fn peek(&self) -> Option<Expiration> {
        let inner = self.inner.read().unwrap();
        inner.items.first().cloned()
    }

    /// Inserts `key` with `deadline_ms`, or overwrites the deadline of an
    /// existing entry and re-heapifies it in place. Either way the key ends
    /// up with exactly one entry.
    pub fn push(&self, key: String, deadline_ms: i64) {
        let mut inner = self.inner.write().unwrap();
        let existing = inner.pos.get(&key).copied();
        if let Some(i) = existing {
            inner.items[i].deadline_ms = deadline_ms;
            inner.reheapify(i);
        } else {
            let i = inner.items.len();
            inner.items.push(Expiration {
                key: key.clone(),
                deadline_ms,
            });
            inner.pos.insert(key, i);
            inner.sift_up(i);
        }
    }

    /// Removes and returns the entry with the smallest deadline.
    pub fn pop_min(&self) -> Option<Expiration> {
        let mut inner = self.inner.write().unwrap();
        if inner.items.is_empty() {
            return None;
        }
        Some(inner.remove_at(0))
    }

    /// Removes the entry for `key`, returning it if present.
    pub fn remove(&self, key: &str) -> Option<Expiration> {
        let mut inner = self.inner.write().unwrap();
        let i = *inner.pos.get(key)?;
        Some(inner.remove_at(i))
    }

    /// Overwrites the deadline of an existing entry. Returns `false` and
    /// leaves the index untouched when `key` is absent.
    pub fn update_expiration(&self, key: &str, deadline_ms: i64) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.pos.get(key).copied() {
            Some(i) => {
                inner.items[i].deadline_ms = deadline_ms;
                inner.reheapify(i);
                true
            }
            None => false,
        }
    }

    /// Returns the deadline for `key` in O(1), if the key is indexed.
    pub fn find_expiration(&self, key: &str) -> Option<i64> {
        let inner = self.inner.read().unwrap();
        inner.pos.get(key).map(|&i| inner.items[i].deadline_ms)
    }

    /// Returns the number of indexed keys.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap();
        inner.items.len()
    }

    /// Returns true when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clones the whole index into an independent instance under the read
    /// lock, so the snapshot is consistent with concurrent writers.
    pub fn deep_copy(&self) -> ExpirationIndex {
        let inner = self.inner.read().unwrap();
        ExpirationIndex {
            inner: RwLock::new(inner.clone()),
        }
    }

    /// Asserts the heap/map lockstep invariant. Test-only.
    #[cfg(test)]
    fn assert_consistent(&self) {
        let inner = self.inner.read().unwrap();
        assert_eq!(inner.pos.len(), inner.items.len());
        for (i, entry) in inner.items.iter().enumerate() {
            assert_eq!(inner.pos.get(&entry.key), Some(&i), "slot {}", i);
        }
        // Heap order: every parent sorts no later than its children.
        for i in 1..inner.items.len() {
            let parent = (i - 1) / 2;
            assert!(
                inner.items[parent].deadline_ms <= inner.items[i].deadline_ms,
                "heap order violated at slot {}",
                i
            );
        }
    }
}
