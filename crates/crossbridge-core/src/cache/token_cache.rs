//! Bounded identity cache of weak references.

use crate::config::BridgeConfig;
use crate::error::Result;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};

/// Identity cache that never keeps a value alive by itself.
///
/// A lookup whose weak reference is gone counts as a miss. When the table is
/// full, dead entries are pruned first; if it is still full the value is
/// handed back without being stored.
pub struct TokenCache<K, V: ?Sized> {
    name: &'static str,
    max_size: usize,
    entries: Mutex<HashMap<K, Weak<V>>>,
}

impl<K, V> TokenCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: ?Sized,
{
    pub fn new(name: &'static str) -> Self {
        Self::with_capacity(name, BridgeConfig::TOKEN_CACHE_MAX_SIZE)
    }

    pub fn with_capacity(name: &'static str, max_size: usize) -> Self {
        Self {
            name,
            max_size,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<K, Weak<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the live value for `key` or build and remember a new one.
    pub fn get_or_load<F>(&self, key: &K, loader: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Result<Arc<V>>,
    {
        let mut entries = self.entries();

        if let Some(value) = entries.get(key).and_then(Weak::upgrade) {
            return Ok(value);
        }

        let value = loader()?;

        if entries.len() >= self.max_size {
            entries.retain(|_, weak| weak.strong_count() > 0);
        }
        if entries.len() < self.max_size || entries.contains_key(key) {
            entries.insert(key.clone(), Arc::downgrade(&value));
            debug!("[{}] Stored {:?} ({} entries)", self.name, key, entries.len());
        } else {
            warn!("[{}] Cache exceeded max {}", self.name, self.max_size);
        }

        Ok(value)
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries().get(key).and_then(Weak::upgrade)
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.entries().remove(key).and_then(|weak| weak.upgrade())
    }

    /// Number of stored entries, including ones whose value is already gone.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
