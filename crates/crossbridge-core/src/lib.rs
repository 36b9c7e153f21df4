//! Crossbridge - cross-process call bridge.
//!
//! Each process owns a [`ProcessBridge`]: a registry of named binder services,
//! message-style invokers and typed interfaces, plus the machinery to call the
//! same things in other processes. Lookups resolve locally first and otherwise
//! follow forwarding records that other processes registered here. Remote
//! handles are cached until their endpoint dies.
//!
//! # Example
//!
//! ```rust,ignore
//! use crossbridge::{ProcessBridge, StaticLocator, InvokerRegistration};
//!
//! let locator = Arc::new(StaticLocator::new());
//! let server = ProcessBridge::builder("proc.server").locator(locator.clone()).build()?;
//! let client = ProcessBridge::builder("proc.client").locator(locator.clone()).build()?;
//! locator.publish(server.name(), server.bridge())?;
//!
//! server.register_local_invoker("echo", InvokerRegistration::instance(echo))?;
//! let reply = client.invoke("proc.server", "echo", "ping", Bundle::new(), None)?;
//! ```

pub mod cache;
pub mod call;
pub mod codec;
pub mod config;
pub mod error;
pub mod interface;
pub mod locator;
pub mod registry;
pub mod transport;
pub mod value;

mod api;

// Re-export commonly used types
pub use cache::{CacheStats, HandleBound, HandleCache, TokenCache};
pub use call::{Call, CallRef, CallStub, Callback, CallbackWrapper};
pub use codec::{
    Codec, CodecChain, Decoder, Encoder, JsonCodec, Marker, Markers, TypeFlags, TypeKey,
    TypeRegistry,
};
pub use config::{BridgeConfig, CachePolicy};
pub use error::{BridgeError, ErrorKind, Result};
pub use interface::{
    Args, CallEnvelope, InterfaceEngine, InterfaceProxy, InterfaceType, Method, Param, Remote,
    RemoteInterface,
};
pub use locator::{Locator, StaticLocator};
pub use registry::{
    Bridge, BridgeRef, BridgeRegistry, Category, InterfaceRegistration, Invoker,
    InvokerRegistration, RecordInfo, ServiceRegistration,
};
pub use transport::{Binder, CallerIdentity, DeathWatch, Endpoint, TransportHandle};
pub use value::{Bundle, FromValue, LocalObject, Value, ValueKind};

// Re-export builder from api module
pub use api::{ProcessBridgeBuilder, QuietBridge};

use std::sync::Arc;
use tracing::debug;

/// Per-process entry point.
///
/// Owns the process endpoint, the interface engine (codecs, type registry,
/// stub and proxy caches), the process's own [`BridgeRegistry`] and the
/// client-side cache of bridges resolved from other processes.
pub struct ProcessBridge {
    name: String,
    endpoint: Endpoint,
    engine: Arc<InterfaceEngine>,
    registry: Arc<BridgeRegistry>,
    locator: Arc<dyn Locator>,
    /// Resolved bridges keyed by authority
    bridges: HandleCache<String, BridgeRef>,
}

impl ProcessBridge {
    /// Create a builder for a bridge published as `name`.
    pub fn builder(name: impl Into<String>) -> ProcessBridgeBuilder {
        ProcessBridgeBuilder::new(name)
    }

    /// Create a bridge with default options and an empty locator.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::builder(name).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn engine(&self) -> &Arc<InterfaceEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<BridgeRegistry> {
        &self.registry
    }

    /// This process's registry as a handle other processes can hold.
    pub fn bridge(&self) -> BridgeRef {
        self.registry.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.endpoint.is_alive()
    }

    /// Terminate this process's endpoint. Every handle it minted dies.
    pub fn shutdown(&self) {
        self.endpoint.kill();
    }

    /// No-throw view of this bridge.
    pub fn quiet(&self) -> QuietBridge<'_> {
        QuietBridge::new(self)
    }

    /// Resolve `authority` to a live bridge.
    ///
    /// This process's own name resolves to its registry without consulting
    /// the locator.
    fn resolve(&self, authority: &str) -> Result<BridgeRef> {
        if authority.is_empty() {
            return Err(BridgeError::invalid_argument("authority", "must not be empty"));
        }
        if authority == self.name {
            return Ok(self.bridge());
        }

        self.bridges
            .get(&authority.to_string(), || {
                debug!("Locating authority '{}'", authority);
                self.locator.locate(authority)
            })?
            .ok_or_else(|| BridgeError::not_found("authority", authority))
    }

    fn is_own(&self, bridge: &BridgeRef) -> bool {
        bridge.as_binder() == self.registry.as_binder()
    }

    /// Send a sub-registry holding one item to `authority`.
    ///
    /// `populate` fills the sub-registry, or this process's registry when the
    /// authority is this process.
    fn forward_registration<F>(
        &self,
        authority: &str,
        name: &str,
        category: Category,
        populate: F,
    ) -> Result<bool>
    where
        F: FnOnce(&BridgeRegistry) -> Result<()>,
    {
        let target = self.resolve(authority)?;
        if self.is_own(&target) {
            populate(&self.registry)?;
            return Ok(true);
        }

        let sub = BridgeRegistry::new(format!("{}/{}", self.name, name), self.engine.clone());
        populate(&sub)?;
        let registered = target.register(name, Some(sub as BridgeRef), category)?;
        debug!(
            "Forwarded {} '{}' from '{}' to '{}'",
            category, name, self.name, authority
        );
        Ok(registered)
    }

    /// Remove the forwarding record for `(category, name)` at `authority`.
    fn forward_removal(&self, authority: &str, name: &str, category: Category) -> Result<bool> {
        let target = self.resolve(authority)?;
        if self.is_own(&target) {
            match category {
                Category::Binder => self.registry.register_local_service(name, None)?,
                Category::Invoker => self.registry.register_local_invoker(name, None)?,
                Category::Interface => self.registry.register_local_interface(name, None)?,
            }
            return Ok(true);
        }
        target.register(name, None, category)
    }
}

impl std::fmt::Debug for ProcessBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessBridge")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
