//! Transport handle boundary.
//!
//! The bridge runs on top of any platform primitive that can name a remote
//! endpoint, report whether it is still alive, and notify once when it dies.
//! That primitive is modelled by [`TransportHandle`]; [`Binder`] is the cheap
//! clonable reference the rest of the crate passes around.
//!
//! # Architecture
//!
//! - **TransportHandle**: the platform-supplied handle contract
//! - **DeathWatch**: attach-once / detach-once death notification helper
//! - **Endpoint**: in-process reference implementation (a simulated process)

mod death;
mod endpoint;

pub use death::DeathWatch;
pub use endpoint::Endpoint;

use crate::error::Result;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Raw identity of a transport handle.
pub type HandleId = u64;

/// Callback fired when the endpoint behind a handle terminates.
pub type DeathRecipient = Box<dyn FnOnce(HandleId) + Send>;

/// Token returned by [`TransportHandle::link_to_death`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeathLink(pub u64);

/// Process and endpoint the handle was minted in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity {
    pub pid: u32,
    pub endpoint: String,
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.endpoint, self.pid)
    }
}

/// Opaque, liveness-observable handle to an endpoint.
pub trait TransportHandle: Send + Sync {
    /// Raw identity of this handle, stable for its whole lifetime.
    fn id(&self) -> HandleId;

    /// Whether the endpoint behind this handle is still running.
    fn is_alive(&self) -> bool;

    /// Identity of the process that owns the handle.
    fn origin(&self) -> CallerIdentity;

    /// Register a recipient fired exactly once when the endpoint dies.
    ///
    /// Fails with a transport error if the endpoint is already dead.
    fn link_to_death(&self, recipient: DeathRecipient) -> Result<DeathLink>;

    /// Remove a recipient. Returns `false` if it was not linked anymore.
    fn unlink_to_death(&self, link: DeathLink) -> bool;
}

/// Shared reference to a transport handle.
///
/// Equality and hashing use the handle identity, never the pointer.
#[derive(Clone)]
pub struct Binder(Arc<dyn TransportHandle>);

impl Binder {
    pub fn new(handle: Arc<dyn TransportHandle>) -> Self {
        Self(handle)
    }

    pub fn id(&self) -> HandleId {
        self.0.id()
    }

    pub fn is_alive(&self) -> bool {
        self.0.is_alive()
    }

    pub fn origin(&self) -> CallerIdentity {
        self.0.origin()
    }

    pub fn link_to_death(&self, recipient: DeathRecipient) -> Result<DeathLink> {
        self.0.link_to_death(recipient)
    }

    pub fn unlink_to_death(&self, link: DeathLink) -> bool {
        self.0.unlink_to_death(link)
    }

    /// Fail with a transport error unless the endpoint is alive.
    pub fn ensure_alive(&self, what: &str) -> Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(crate::error::BridgeError::transport(format!(
                "{} handle #{} is dead",
                what,
                self.id()
            )))
        }
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("id", &self.id())
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl PartialEq for Binder {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Binder {}

impl Hash for Binder {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}
