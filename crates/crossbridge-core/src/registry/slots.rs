//! Per-name construction of locally registered services and invokers.
//!
//! Every name has its own slot. A factory runs holding only its own slot, so
//! it may resolve other names on the same registry, and it runs at most once
//! per registration however many threads ask for the name at the same time.

use crate::cache::CacheStats;
use crate::error::{BridgeError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, ThreadId};
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Slot<V> {
    value: Mutex<Option<V>>,
    /// Thread currently running the factory for this slot
    builder: Mutex<Option<ThreadId>>,
}

impl<V> Slot<V> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(None),
            builder: Mutex::new(None),
        })
    }
}

#[derive(Default)]
struct Counters {
    hits: u64,
    loads: u64,
    evictions: u64,
}

pub(crate) struct ConstructionSlots<V> {
    name: &'static str,
    slots: Mutex<HashMap<String, Arc<Slot<V>>>>,
    counters: Mutex<Counters>,
}

impl<V: Clone> ConstructionSlots<V> {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Mutex::new(HashMap::new()),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Return the built value for `key`, building it if needed.
    ///
    /// A stored value that `is_live` rejects is dropped and rebuilt. A build
    /// returning `None` or an error stores nothing. A factory that resolves its
    /// own name fails with `InvalidArgument` instead of waiting on itself.
    pub(crate) fn get_or_build<L, B>(&self, key: &str, is_live: L, build: B) -> Result<Option<V>>
    where
        L: Fn(&V) -> bool,
        B: FnOnce() -> Result<Option<V>>,
    {
        let slot = lock(&self.slots)
            .entry(key.to_string())
            .or_insert_with(Slot::new)
            .clone();

        let me = thread::current().id();
        if *lock(&slot.builder) == Some(me) {
            return Err(BridgeError::invalid_argument(
                "name",
                format!("construction of '{}' resolves '{}' again", key, key),
            ));
        }

        let mut value = lock(&slot.value);
        if let Some(current) = value.as_ref() {
            if is_live(current) {
                lock(&self.counters).hits += 1;
                return Ok(Some(current.clone()));
            }
            *value = None;
            lock(&self.counters).evictions += 1;
            debug!("[{}] Dropped dead instance of '{}'", self.name, key);
        }

        lock(&self.counters).loads += 1;
        *lock(&slot.builder) = Some(me);
        let built = build();
        *lock(&slot.builder) = None;

        if let Ok(fresh) = &built {
            *value = fresh.clone();
        }
        let empty = value.is_none();
        drop(value);

        if empty {
            self.release_empty(key, &slot);
        }
        built
    }

    /// Forget `key`. A build already running finishes into the detached slot.
    pub(crate) fn remove(&self, key: &str) {
        lock(&self.slots).remove(key);
    }

    // The slot may be busy in another thread's factory; never wait on it here
    // while the map is held.
    fn release_empty(&self, key: &str, slot: &Arc<Slot<V>>) {
        let mut slots = lock(&self.slots);
        if !slots.get(key).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            return;
        }
        let empty = match slot.value.try_lock() {
            Ok(value) => value.is_none(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_none(),
            Err(TryLockError::WouldBlock) => false,
        };
        if empty {
            slots.remove(key);
        }
    }

    pub(crate) fn stats(&self) -> CacheStats {
        let slots: Vec<Arc<Slot<V>>> = lock(&self.slots).values().cloned().collect();
        let entries = slots
            .iter()
            .filter(|slot| matches!(slot.value.try_lock(), Ok(value) if value.is_some()))
            .count();
        let counters = lock(&self.counters);
        CacheStats {
            name: self.name.to_string(),
            entries,
            hits: counters.hits,
            loads: counters.loads,
            evictions: counters.evictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn test_builds_once_and_counts() {
        let slots = ConstructionSlots::<i64>::new("numbers");
        let built = slots.get_or_build("a", |_| true, || Ok(Some(7))).unwrap();
        let again = slots.get_or_build("a", |_| true, || Ok(Some(8))).unwrap();
        assert_eq!(built, Some(7));
        assert_eq!(again, Some(7));

        let stats = slots.stats();
        assert_eq!((stats.entries, stats.hits, stats.loads), (1, 1, 1));
    }

    #[test]
    fn test_absent_value_not_stored() {
        let slots = ConstructionSlots::<i64>::new("numbers");
        assert_eq!(slots.get_or_build("a", |_| true, || Ok(None)).unwrap(), None);
        assert_eq!(slots.stats().entries, 0);
        assert_eq!(slots.get_or_build("a", |_| true, || Ok(Some(1))).unwrap(), Some(1));
    }

    #[test]
    fn test_dead_value_rebuilt() {
        let slots = ConstructionSlots::<i64>::new("numbers");
        slots.get_or_build("a", |_| true, || Ok(Some(1))).unwrap();
        let rebuilt = slots.get_or_build("a", |v| *v != 1, || Ok(Some(2))).unwrap();
        assert_eq!(rebuilt, Some(2));
        assert_eq!(slots.stats().evictions, 1);
    }

    #[test]
    fn test_remove_forces_rebuild() {
        let slots = ConstructionSlots::<i64>::new("numbers");
        slots.get_or_build("a", |_| true, || Ok(Some(1))).unwrap();
        slots.remove("a");
        assert_eq!(slots.get_or_build("a", |_| true, || Ok(Some(2))).unwrap(), Some(2));
    }

    #[test]
    fn test_build_error_leaves_slot_empty() {
        let slots = ConstructionSlots::<i64>::new("numbers");
        let err = slots
            .get_or_build("a", |_| true, || Err(BridgeError::invalid_argument("a", "nope")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(slots.get_or_build("a", |_| true, || Ok(Some(3))).unwrap(), Some(3));
    }

    #[test]
    fn test_factory_may_resolve_other_names() {
        let slots = ConstructionSlots::<i64>::new("numbers");
        let outer = slots
            .get_or_build("outer", |_| true, || {
                let inner = slots.get_or_build("inner", |_| true, || Ok(Some(20)))?;
                Ok(inner.map(|v| v + 1))
            })
            .unwrap();
        assert_eq!(outer, Some(21));
    }

    #[test]
    fn test_factory_resolving_itself_is_rejected() {
        let slots = ConstructionSlots::<i64>::new("numbers");
        let err = slots
            .get_or_build("loop", |_| true, || {
                slots.get_or_build("loop", |_| true, || Ok(Some(0)))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_concurrent_callers_share_one_build() {
        const THREADS: usize = 8;
        let slots = Arc::new(ConstructionSlots::<usize>::new("numbers"));
        let builds = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let slots = slots.clone();
                let builds = builds.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    slots
                        .get_or_build("a", |_| true, || {
                            thread::sleep(Duration::from_millis(20));
                            Ok(Some(builds.fetch_add(1, Ordering::SeqCst)))
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(0));
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
