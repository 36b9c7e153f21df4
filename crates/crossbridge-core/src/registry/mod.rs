//! Per-process bridge registry.
//!
//! A [`BridgeRegistry`] holds this process's local registrations in three
//! independent namespaces (binder services, invokers, interfaces) and, for each
//! namespace, forwarding records pointing at bridges other processes have
//! registered. Every lookup resolves in the same order:
//!
//! 1. live cached instance
//! 2. local registration (constructed on first use, then cached)
//! 3. forwarded remote bridge, called recursively
//! 4. `NotFound`
//!
//! Forwarding records carry a death watch; when the remote endpoint dies the
//! record is dropped and the next lookup must re-resolve from scratch.

mod bridge_registry;
mod record;
mod registration;
mod slots;

pub use bridge_registry::BridgeRegistry;
pub use record::RecordInfo;
pub use registration::{
    InterfaceRegistration, Invoker, InvokerFactory, InvokerRegistration, InvokerType,
    ServiceFactory, ServiceRegistration,
};

use crate::cache::HandleBound;
use crate::call::{Call, CallRef};
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::transport::Binder;
use crate::value::Bundle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Namespace a forwarding record is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Binder,
    Invoker,
    Interface,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Binder, Category::Invoker, Category::Interface];

    /// Numeric tag used on the wire.
    pub fn tag(&self) -> i64 {
        match self {
            Category::Binder => BridgeConfig::CATEGORY_BINDER,
            Category::Invoker => BridgeConfig::CATEGORY_INVOKER,
            Category::Interface => BridgeConfig::CATEGORY_INTERFACE,
        }
    }

    pub fn from_tag(tag: i64) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.tag() == tag)
    }

    /// Name used in `NotFound` errors and logs.
    pub fn namespace(&self) -> &'static str {
        match self {
            Category::Binder => "service",
            Category::Invoker => "invoker",
            Category::Interface => "interface",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

/// The operations a registry exposes to other processes.
pub trait Bridge: Send + Sync {
    /// Resolve a binder service.
    fn fetch_service(&self, name: &str) -> Result<CallRef>;

    /// Dispatch `method` to the invoker registered as `name`.
    fn invoke(
        &self,
        name: &str,
        method: &str,
        params: Bundle,
        callback: Option<CallRef>,
    ) -> Result<Bundle>;

    /// Resolve an interface stub.
    fn fetch_interface(&self, name: &str) -> Result<CallRef>;

    /// Replace or remove the forwarding record for `(category, name)`.
    fn register(&self, name: &str, bridge: Option<BridgeRef>, category: Category) -> Result<bool>;

    /// Transport handle of this bridge.
    fn as_binder(&self) -> Binder;
}

/// Shared bridge handle.
pub type BridgeRef = Arc<dyn Bridge>;

impl HandleBound for BridgeRef {
    fn handle(&self) -> Binder {
        self.as_binder()
    }
}

impl HandleBound for CallRef {
    fn handle(&self) -> Binder {
        Call::as_binder(self.as_ref())
    }
}
