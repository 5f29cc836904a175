//! Thread-Safe Keyspace
//!
//! A concurrent string→string map behind a single `RwLock`. Multiple readers
//! proceed in parallel; writers take exclusive access. All operations are
//! total: the keyspace is pure in-memory state and nothing here can fail.
//!
//! # Thread Safety
//!
//! This struct is designed to be wrapped in an `Arc` and shared across every
//! client handler task plus the reaper and the snapshot engine.
//!
//! # Example
//!
//! ```
//! use glowkv::storage::Keyspace;
//!
//! let keyspace = Keyspace::new();
//! keyspace.set("name".to_string(), "glow".to_string());
//! assert_eq!(keyspace.get("name"), Some("glow".to_string()));
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

/// The in-memory mapping from key to value.
#[derive(Debug, Default)]
pub struct Keyspace {
    data: RwLock<HashMap<String, String>>,
}

impl Keyspace {
    /// Creates an empty keyspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, or `None` if the key is absent.
    pub fn get(&self, key: &str) -> Option<String> {
        let data = self.data.read().unwrap();
        data.get(key).cloned()
    }

    /// Inserts or overwrites the mapping for `key`.
    pub fn set(&self, key: String, value: String) {
        let mut data = self.data.write().unwrap();
        data.insert(key, value);
    }

    /// Removes `key`. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) {
        let mut data = self.data.write().unwrap();
        data.remove(key);
    }

    /// Returns whether `key` is present.
    pub fn exists(&self, key: &str) -> bool {
        let data = self.data.read().unwrap();
        data.contains_key(key)
    }

    /// Returns the number of stored mappings.
    pub fn len(&self) -> usize {
        let data = self.data.read().unwrap();
        data.len()
    }

    /// Returns true when no mappings are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every stored key. Order is unspecified.
    pub fn keys(&self) -> Vec<String> {
        let data = self.data.read().unwrap();
        data.keys().cloned().collect()
    }

    /// Clones the whole keyspace into an independent instance.
    ///
    /// The read lock is held for the duration of the copy, so the snapshot
    /// is consistent with respect to concurrent writers.
    pub fn deep_copy(&self) -> Keyspace {
        let data = self.data.read().unwrap();
        Keyspace {
            data: RwLock::new(data.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let ks = Keyspace::new();
        ks.set("key".into(), "value".into());
        assert_eq!(ks.get("key"), Some("value".to_string()));
        assert_eq!(ks.get("missing"), None);
    }

    #[test]
    fn set_overwrites() {
        let ks = Keyspace::new();
        ks.set("key".into(), "one".into());
        ks.set("key".into(), "two".into());
        assert_eq!(ks.get("key"), Some("two".to_string()));
        assert_eq!(ks.len(), 1);
    }

    #[test]
    fn remove_and_exists() {
        let ks = Keyspace::new();
        ks.set("key".into(), "value".into());
        assert!(ks.exists("key"));
        ks.remove("key");
        assert!(!ks.exists("key"));
        // Removing again is fine.
        ks.remove("key");
        assert!(ks.is_empty());
    }

    #[test]
    fn keys_lists_everything() {
        let ks = Keyspace::new();
        ks.set("a".into(), "1".into());
        ks.set("b".into(), "2".into());
        let mut keys = ks.keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn deep_copy_is_independent() {
        let ks = Keyspace::new();
        ks.set("key".into(), "value".into());

        let copy = ks.deep_copy();
        ks.set("key".into(), "changed".into());
        ks.set("new".into(), "entry".into());

        assert_eq!(copy.get("key"), Some("value".to_string()));
        assert!(!copy.exists("new"));
        assert_eq!(copy.len(), 1);
    }

    #[test]
    fn concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let ks = Arc::new(Keyspace::new());
        let mut handles = vec![];

        for i in 0..8 {
            let ks = Arc::clone(&ks);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    ks.set(key.clone(), "value".into());
                    assert!(ks.get(&key).is_some());
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ks.len(), 800);
    }
}
