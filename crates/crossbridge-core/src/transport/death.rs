//! Attach-once / detach-once death notification.

use super::{Binder, DeathLink, HandleId};
use crate::error::Result;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    Linking,
    Linked(DeathLink),
    Fired,
    Detached,
}

fn lock(state: &Mutex<WatchState>) -> MutexGuard<'_, WatchState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A single death watch on one transport handle.
///
/// The callback runs at most once. Firing moves the watch to its terminal
/// state before the callback is invoked, so a concurrent [`DeathWatch::detach`]
/// either wins (the callback never runs) or observes the watch as already gone.
pub struct DeathWatch {
    binder: Binder,
    state: Arc<Mutex<WatchState>>,
}

impl DeathWatch {
    /// Attach `on_death` to `binder`.
    ///
    /// Fails with a transport error if the handle is already dead.
    pub fn attach<F>(binder: &Binder, on_death: F) -> Result<Self>
    where
        F: FnOnce(HandleId) + Send + 'static,
    {
        let state = Arc::new(Mutex::new(WatchState::Linking));

        // The state lock is held across linking so a death racing with attach
        // waits until the link is recorded.
        let mut guard = lock(&state);
        let fire_state = state.clone();
        let link = binder.link_to_death(Box::new(move |id| {
            let should_fire = {
                let mut current = lock(&fire_state);
                match *current {
                    WatchState::Linking | WatchState::Linked(_) => {
                        *current = WatchState::Fired;
                        true
                    }
                    WatchState::Fired | WatchState::Detached => false,
                }
            };
            if should_fire {
                on_death(id);
            }
        }))?;
        *guard = WatchState::Linked(link);
        drop(guard);

        Ok(Self {
            binder: binder.clone(),
            state,
        })
    }

    /// The handle being watched.
    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    /// Detach the watch.
    ///
    /// Returns `true` only for the call that actually removed the link.
    pub fn detach(&self) -> bool {
        let mut state = lock(&self.state);
        match *state {
            WatchState::Linked(link) => {
                *state = WatchState::Detached;
                let unlinked = self.binder.unlink_to_death(link);
                debug!(
                    "Detached death watch from handle #{} (unlinked={})",
                    self.binder.id(),
                    unlinked
                );
                true
            }
            WatchState::Linking | WatchState::Fired | WatchState::Detached => false,
        }
    }

    /// Whether the watch is still armed.
    pub fn is_attached(&self) -> bool {
        matches!(*lock(&self.state), WatchState::Linked(_))
    }

    /// Whether the death callback has run.
    pub fn has_fired(&self) -> bool {
        matches!(*lock(&self.state), WatchState::Fired)
    }
}

impl fmt::Debug for DeathWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeathWatch")
            .field("handle", &self.binder.id())
            .field("state", &*lock(&self.state))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Endpoint;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce(HandleId) + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_fires_once_on_death() {
        let endpoint = Endpoint::new("watch.fire");
        let handle = endpoint.new_handle();
        let (count, on_death) = counter();

        let watch = DeathWatch::attach(&handle, on_death).unwrap();
        assert!(watch.is_attached());

        endpoint.kill();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(watch.has_fired());
        assert!(!watch.detach());
    }

    #[test]
    fn test_detach_is_idempotent() {
        let endpoint = Endpoint::new("watch.detach");
        let handle = endpoint.new_handle();
        let (count, on_death) = counter();

        let watch = DeathWatch::attach(&handle, on_death).unwrap();
        assert_eq!(endpoint.linked_count(), 1);

        assert!(watch.detach());
        assert!(!watch.detach());
        assert_eq!(endpoint.linked_count(), 0);

        endpoint.kill();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_attach_to_dead_handle_fails() {
        let endpoint = Endpoint::new("watch.dead");
        let handle = endpoint.new_handle();
        endpoint.kill();

        assert!(DeathWatch::attach(&handle, |_| {}).is_err());
    }
}
