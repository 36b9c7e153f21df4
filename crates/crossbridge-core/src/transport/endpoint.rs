//! In-process endpoint: the reference [`TransportHandle`] implementation.
//!
//! An [`Endpoint`] stands in for one process on the host. Every handle it
//! mints shares its liveness, and [`Endpoint::kill`] plays the part of the
//! process exiting: all handles turn dead and every linked recipient fires
//! exactly once.

use super::{Binder, CallerIdentity, DeathLink, DeathRecipient, HandleId, TransportHandle};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_ENDPOINT: AtomicU64 = AtomicU64::new(1);

struct LinkedRecipient {
    handle: HandleId,
    recipient: DeathRecipient,
}

struct EndpointInner {
    name: String,
    pid: u32,
    alive: AtomicBool,
    next_link: AtomicU64,
    links: Mutex<HashMap<DeathLink, LinkedRecipient>>,
}

impl EndpointInner {
    fn links(&self) -> std::sync::MutexGuard<'_, HashMap<DeathLink, LinkedRecipient>> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A simulated process that owns transport handles.
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<EndpointInner>,
}

impl Endpoint {
    /// Create a live endpoint.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EndpointInner {
                name: name.into(),
                pid: std::process::id(),
                alive: AtomicBool::new(true),
                next_link: AtomicU64::new(1),
                links: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create an endpoint with a generated unique name.
    pub fn anonymous() -> Self {
        let n = NEXT_ENDPOINT.fetch_add(1, Ordering::Relaxed);
        Self::new(format!("{}.{}", BridgeConfig::DEFAULT_ENDPOINT_PREFIX, n))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    pub fn identity(&self) -> CallerIdentity {
        CallerIdentity {
            pid: self.inner.pid,
            endpoint: self.inner.name.clone(),
        }
    }

    /// Mint a new handle owned by this endpoint.
    pub fn new_handle(&self) -> Binder {
        let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        Binder::new(Arc::new(LocalHandle {
            id,
            endpoint: self.inner.clone(),
        }))
    }

    /// Number of death recipients currently linked to handles of this endpoint.
    pub fn linked_count(&self) -> usize {
        self.inner.links().len()
    }

    /// Terminate the endpoint.
    ///
    /// Recipients run on the calling thread after the link table lock has been
    /// released. Killing an already dead endpoint does nothing.
    pub fn kill(&self) {
        if !self.inner.alive.swap(false, Ordering::SeqCst) {
            return;
        }

        let fired: Vec<LinkedRecipient> = self.inner.links().drain().map(|(_, r)| r).collect();
        info!(
            "Endpoint {} died, notifying {} recipient(s)",
            self.inner.name,
            fired.len()
        );

        for linked in fired {
            (linked.recipient)(linked.handle);
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.inner.name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

struct LocalHandle {
    id: HandleId,
    endpoint: Arc<EndpointInner>,
}

impl TransportHandle for LocalHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn is_alive(&self) -> bool {
        self.endpoint.alive.load(Ordering::SeqCst)
    }

    fn origin(&self) -> CallerIdentity {
        CallerIdentity {
            pid: self.endpoint.pid,
            endpoint: self.endpoint.name.clone(),
        }
    }

    fn link_to_death(&self, recipient: DeathRecipient) -> Result<DeathLink> {
        let mut links = self.endpoint.links();
        // Checked under the table lock so a concurrent kill cannot drop the link.
        if !self.is_alive() {
            return Err(BridgeError::transport(format!(
                "cannot link to death of handle #{}: endpoint {} is dead",
                self.id, self.endpoint.name
            )));
        }

        let link = DeathLink(self.endpoint.next_link.fetch_add(1, Ordering::Relaxed));
        links.insert(
            link,
            LinkedRecipient {
                handle: self.id,
                recipient,
            },
        );
        debug!("Linked {:?} to handle #{}", link, self.id);
        Ok(link)
    }

    fn unlink_to_death(&self, link: DeathLink) -> bool {
        self.endpoint.links().remove(&link).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_kill_fires_each_recipient_once() {
        let endpoint = Endpoint::new("test.kill");
        let handle = endpoint.new_handle();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let fired = fired.clone();
            handle
                .link_to_death(Box::new(move |_| {
                    fired.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }
        assert_eq!(endpoint.linked_count(), 3);

        endpoint.kill();
        endpoint.kill();

        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert_eq!(endpoint.linked_count(), 0);
        assert!(!handle.is_alive());
    }

    #[test]
    fn test_unlink_prevents_firing() {
        let endpoint = Endpoint::new("test.unlink");
        let handle = endpoint.new_handle();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let link = handle
            .link_to_death(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert!(handle.unlink_to_death(link));
        assert!(!handle.unlink_to_death(link));

        endpoint.kill();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_link_on_dead_endpoint_fails() {
        let endpoint = Endpoint::new("test.dead");
        let handle = endpoint.new_handle();
        endpoint.kill();

        let result = handle.link_to_death(Box::new(|_| {}));
        assert!(result.is_err());
    }

    #[test]
    fn test_recipient_receives_handle_id() {
        let endpoint = Endpoint::new("test.id");
        let handle = endpoint.new_handle();
        let seen = Arc::new(AtomicU64::new(0));

        let sink = seen.clone();
        handle
            .link_to_death(Box::new(move |id| {
                sink.store(id, Ordering::SeqCst);
            }))
            .unwrap();

        endpoint.kill();
        assert_eq!(seen.load(Ordering::SeqCst), handle.id());
    }

    #[test]
    fn test_handles_carry_origin() {
        let endpoint = Endpoint::new("test.origin");
        let handle = endpoint.new_handle();
        assert_eq!(handle.origin(), endpoint.identity());
        assert_eq!(handle.origin().endpoint, "test.origin");
    }

    #[test]
    fn test_anonymous_names_are_unique() {
        let a = Endpoint::anonymous();
        let b = Endpoint::anonymous();
        assert_ne!(a.name(), b.name());
        assert!(a.name().starts_with(BridgeConfig::DEFAULT_ENDPOINT_PREFIX));
    }
}
