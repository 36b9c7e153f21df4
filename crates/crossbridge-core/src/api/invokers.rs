//! Invoker registration and dispatch.

use std::sync::Arc;

use crate::call::Callback;
use crate::error::Result;
use crate::registry::{Category, InvokerRegistration};
use crate::value::Bundle;
use crate::ProcessBridge;

impl ProcessBridge {
    /// Register an invoker in this process.
    pub fn register_local_invoker(
        &self,
        name: &str,
        registration: InvokerRegistration,
    ) -> Result<()> {
        self.registry.register_local_invoker(name, Some(registration))
    }

    pub fn unregister_local_invoker(&self, name: &str) -> Result<()> {
        self.registry.register_local_invoker(name, None)
    }

    /// Make an invoker of this process reachable through `authority`.
    pub fn register_invoker(
        &self,
        authority: &str,
        name: &str,
        registration: InvokerRegistration,
    ) -> Result<bool> {
        self.forward_registration(authority, name, Category::Invoker, |registry| {
            registry.register_local_invoker(name, Some(registration))
        })
    }

    pub fn unregister_invoker(&self, authority: &str, name: &str) -> Result<bool> {
        self.forward_removal(authority, name, Category::Invoker)
    }

    /// Call `method` on the invoker `name` at `authority`.
    ///
    /// `callback` is wrapped into a call handle the invoker can use to reach
    /// back into this process; its replies pass through unchanged.
    pub fn invoke(
        &self,
        authority: &str,
        name: &str,
        method: &str,
        params: Bundle,
        callback: Option<Arc<dyn Callback>>,
    ) -> Result<Bundle> {
        let target = self.resolve(authority)?;
        let callback = callback
            .map(|cb| self.engine.callbacks().to_call(&cb))
            .transpose()?;
        target.invoke(name, method, params, callback)
    }
}
