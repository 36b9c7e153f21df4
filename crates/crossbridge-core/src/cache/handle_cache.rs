//! Death-evicted keyed cache.
//!
//! `get` runs under one lock for the whole cache instance. Lookups for
//! different keys serialize through the loader, so there is never more than
//! one load in flight per cache.

use super::traits::{CacheStats, HandleBound};
use crate::config::CachePolicy;
use crate::error::Result;
use crate::transport::DeathWatch;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

struct CachedHandle<V> {
    value: V,
    watch: Option<DeathWatch>,
    generation: u64,
}

impl<V> CachedHandle<V> {
    fn detach(&self) {
        if let Some(watch) = &self.watch {
            watch.detach();
        }
    }
}

struct CacheState<K, V> {
    entries: HashMap<K, CachedHandle<V>>,
    next_generation: u64,
    hits: u64,
    loads: u64,
    evictions: u64,
}

type SharedState<K, V> = Arc<Mutex<CacheState<K, V>>>;

fn lock<K, V>(state: &Mutex<CacheState<K, V>>) -> MutexGuard<'_, CacheState<K, V>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keyed cache of handle-backed values.
pub struct HandleCache<K, V> {
    name: String,
    policy: CachePolicy,
    state: SharedState<K, V>,
}

impl<K, V> HandleCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: HandleBound + Send + 'static,
{
    pub fn new(name: impl Into<String>, policy: CachePolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                next_generation: 1,
                hits: 0,
                loads: 0,
                evictions: 0,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Return the live value for `key`, or load, watch and store a new one.
    ///
    /// A loader returning `None` stores nothing. A loaded value whose handle is
    /// already dead is returned but not stored.
    pub fn get<F>(&self, key: &K, loader: F) -> Result<Option<V>>
    where
        F: FnOnce() -> Result<Option<V>>,
    {
        if !self.policy.is_cached() {
            return loader();
        }

        let mut state = lock(&self.state);

        if let Some(cached) = state.entries.get(key) {
            if cached.value.handle().is_alive() {
                let value = cached.value.clone();
                state.hits += 1;
                return Ok(Some(value));
            }
            if let Some(stale) = state.entries.remove(key) {
                stale.detach();
                state.evictions += 1;
                debug!("[{}] Evicted dead entry {:?} on lookup", self.name, key);
            }
        }

        state.loads += 1;
        let Some(value) = loader()? else {
            return Ok(None);
        };

        let generation = state.next_generation;
        state.next_generation += 1;

        let weak: Weak<Mutex<CacheState<K, V>>> = Arc::downgrade(&self.state);
        let evict_key = key.clone();
        let cache_name = self.name.clone();
        let watch = DeathWatch::attach(&value.handle(), move |handle_id| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let mut state = lock(&state);
            let current = state
                .entries
                .get(&evict_key)
                .is_some_and(|entry| entry.generation == generation);
            if current {
                state.entries.remove(&evict_key);
                state.evictions += 1;
                debug!(
                    "[{}] Evicted {:?} after death of handle #{}",
                    cache_name, evict_key, handle_id
                );
            }
        });

        match watch {
            Ok(watch) => {
                state.entries.insert(
                    key.clone(),
                    CachedHandle {
                        value: value.clone(),
                        watch: Some(watch),
                        generation,
                    },
                );
                debug!("[{}] Cached {:?}", self.name, key);
            }
            Err(e) => {
                debug!("[{}] Not caching {:?}: {}", self.name, key, e);
            }
        }

        Ok(Some(value))
    }

    /// Drop the entry for `key`, detaching its death watch.
    pub fn remove(&self, key: &K) -> Option<V> {
        let removed = lock(&self.state).entries.remove(key);
        removed.map(|entry| {
            entry.detach();
            entry.value
        })
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let drained: Vec<CachedHandle<V>> =
            lock(&self.state).entries.drain().map(|(_, v)| v).collect();
        for entry in &drained {
            entry.detach();
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        lock(&self.state).entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = lock(&self.state);
        CacheStats {
            name: self.name.clone(),
            entries: state.entries.len(),
            hits: state.hits,
            loads: state.loads,
            evictions: state.evictions,
        }
    }
}

impl<K, V> Drop for HandleCache<K, V> {
    fn drop(&mut self) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for entry in state.entries.values() {
            entry.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::transport::{Binder, Endpoint};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn counting_loader(
        count: &Arc<AtomicUsize>,
        handle: &Binder,
    ) -> impl FnOnce() -> Result<Option<Binder>> {
        let count = count.clone();
        let handle = handle.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(Some(handle))
        }
    }

    #[test]
    fn test_loader_runs_once_while_alive() {
        let endpoint = Endpoint::new("cache.memo");
        let handle = endpoint.new_handle();
        let cache: HandleCache<String, Binder> = HandleCache::new("test", CachePolicy::Cached);
        let loads = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let got = cache
                .get(&"svc".to_string(), counting_loader(&loads, &handle))
                .unwrap();
            assert_eq!(got, Some(handle.clone()));
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_death_evicts_entry() {
        let endpoint = Endpoint::new("cache.death");
        let handle = endpoint.new_handle();
        let cache: HandleCache<String, Binder> = HandleCache::new("test", CachePolicy::Cached);
        let key = "svc".to_string();
        let loads = Arc::new(AtomicUsize::new(0));

        cache.get(&key, counting_loader(&loads, &handle)).unwrap();
        assert!(cache.contains(&key));

        endpoint.kill();
        assert!(!cache.contains(&key));
        assert_eq!(cache.stats().evictions, 1);

        let fresh = Endpoint::new("cache.death.2");
        let replacement = fresh.new_handle();
        let got = cache
            .get(&key, counting_loader(&loads, &replacement))
            .unwrap();
        assert_eq!(got, Some(replacement));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_absent_value_is_not_cached() {
        let cache: HandleCache<String, Binder> = HandleCache::new("test", CachePolicy::Cached);
        let got = cache.get(&"missing".to_string(), || Ok(None)).unwrap();
        assert!(got.is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_loader_error_propagates() {
        let cache: HandleCache<String, Binder> = HandleCache::new("test", CachePolicy::Cached);
        let result = cache.get(&"x".to_string(), || Err(BridgeError::transport("down")));
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_no_cache_policy_always_loads() {
        let endpoint = Endpoint::new("cache.nocache");
        let handle = endpoint.new_handle();
        let cache: HandleCache<String, Binder> = HandleCache::new("test", CachePolicy::NoCache);
        let loads = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            cache
                .get(&"svc".to_string(), counting_loader(&loads, &handle))
                .unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
        assert_eq!(endpoint.linked_count(), 0);
    }

    #[test]
    fn test_remove_detaches_watch() {
        let endpoint = Endpoint::new("cache.remove");
        let handle = endpoint.new_handle();
        let cache: HandleCache<String, Binder> = HandleCache::new("test", CachePolicy::Cached);
        let key = "svc".to_string();

        cache.get(&key, || Ok(Some(handle.clone()))).unwrap();
        assert_eq!(endpoint.linked_count(), 1);

        assert_eq!(cache.remove(&key), Some(handle));
        assert_eq!(endpoint.linked_count(), 0);
        assert!(cache.remove(&key).is_none());
    }

    #[test]
    fn test_dead_value_returned_but_not_stored() {
        let endpoint = Endpoint::new("cache.dead");
        let handle = endpoint.new_handle();
        endpoint.kill();

        let cache: HandleCache<String, Binder> = HandleCache::new("test", CachePolicy::Cached);
        let got = cache.get(&"svc".to_string(), || Ok(Some(handle.clone()))).unwrap();
        assert_eq!(got, Some(handle));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_drop_detaches_all_watches() {
        let endpoint = Endpoint::new("cache.drop");
        {
            let cache: HandleCache<u32, Binder> = HandleCache::new("test", CachePolicy::Cached);
            for i in 0..4 {
                let handle = endpoint.new_handle();
                cache.get(&i, move || Ok(Some(handle))).unwrap();
            }
            assert_eq!(endpoint.linked_count(), 4);
        }
        assert_eq!(endpoint.linked_count(), 0);
    }

    #[test]
    fn test_loads_never_overlap() {
        const THREADS: u32 = 6;
        let endpoint = Endpoint::new("cache.threads");
        let cache: Arc<HandleCache<u32, Binder>> =
            Arc::new(HandleCache::new("test", CachePolicy::Cached));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS as usize));

        let workers: Vec<_> = (0..THREADS)
            .map(|key| {
                let cache = cache.clone();
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                let barrier = barrier.clone();
                let handle = endpoint.new_handle();
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get(&key, move || {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(5));
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            Ok(Some(handle))
                        })
                        .unwrap()
                })
            })
            .collect();

        for worker in workers {
            assert!(worker.join().unwrap().is_some());
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), THREADS as usize);
    }
}
