//! Binder service registration and lookup.

use crate::call::CallRef;
use crate::error::Result;
use crate::registry::{Category, ServiceRegistration};
use crate::ProcessBridge;
use tracing::debug;

impl ProcessBridge {
    /// Register a binder service in this process.
    pub fn register_local_service(
        &self,
        name: &str,
        registration: ServiceRegistration,
    ) -> Result<()> {
        self.registry.register_local_service(name, Some(registration))
    }

    /// Remove a local binder service and any forwarding record shadowing it.
    pub fn unregister_local_service(&self, name: &str) -> Result<()> {
        self.registry.register_local_service(name, None)
    }

    /// Make a service of this process resolvable through `authority`.
    pub fn register_service(
        &self,
        authority: &str,
        name: &str,
        registration: ServiceRegistration,
    ) -> Result<bool> {
        self.forward_registration(authority, name, Category::Binder, |registry| {
            registry.register_local_service(name, Some(registration))
        })
    }

    pub fn unregister_service(&self, authority: &str, name: &str) -> Result<bool> {
        self.forward_removal(authority, name, Category::Binder)
    }

    /// Fetch the service `name` from `authority`.
    ///
    /// Only the bridge is cached here. The service itself is looked up on the
    /// owning registry each time, which memoizes factory results on its side,
    /// so an unregister or replacement there is seen by the next fetch.
    pub fn fetch_service(&self, authority: &str, name: &str) -> Result<CallRef> {
        let call = self.resolve(authority)?.fetch_service(name)?;
        debug!(
            "Fetched service '{}' from '{}' as handle #{}",
            name,
            authority,
            call.as_binder().id()
        );
        Ok(call)
    }
}
