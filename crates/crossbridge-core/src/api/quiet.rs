//! No-throw convenience wrappers.
//!
//! Every failure is logged at warn level and reported as `None` or `false`.

use std::sync::Arc;
use tracing::warn;

use crate::call::{CallRef, Callback};
use crate::error::Result;
use crate::interface::RemoteInterface;
use crate::registry::{InvokerRegistration, ServiceRegistration};
use crate::value::Bundle;
use crate::ProcessBridge;

/// Borrowed view of a [`ProcessBridge`] whose operations never fail.
#[derive(Clone, Copy)]
pub struct QuietBridge<'a> {
    bridge: &'a ProcessBridge,
}

fn quiet<T>(op: &str, target: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} '{}' failed: {}", op, target, e.chain());
            None
        }
    }
}

impl<'a> QuietBridge<'a> {
    pub(crate) fn new(bridge: &'a ProcessBridge) -> Self {
        Self { bridge }
    }

    pub fn fetch_service(&self, authority: &str, name: &str) -> Option<CallRef> {
        quiet("fetch_service", name, self.bridge.fetch_service(authority, name))
    }

    pub fn invoke(
        &self,
        authority: &str,
        name: &str,
        method: &str,
        params: Bundle,
        callback: Option<Arc<dyn Callback>>,
    ) -> Option<Bundle> {
        quiet(
            "invoke",
            name,
            self.bridge.invoke(authority, name, method, params, callback),
        )
    }

    pub fn fetch_interface<I>(&self, authority: &str, name: &str) -> Option<Arc<I>>
    where
        I: RemoteInterface + ?Sized,
    {
        quiet(
            "fetch_interface",
            name,
            self.bridge.fetch_interface::<I>(authority, name),
        )
    }

    pub fn register_service(
        &self,
        authority: &str,
        name: &str,
        registration: ServiceRegistration,
    ) -> bool {
        quiet(
            "register_service",
            name,
            self.bridge.register_service(authority, name, registration),
        )
        .unwrap_or(false)
    }

    pub fn unregister_service(&self, authority: &str, name: &str) -> bool {
        quiet(
            "unregister_service",
            name,
            self.bridge.unregister_service(authority, name),
        )
        .unwrap_or(false)
    }

    pub fn register_invoker(
        &self,
        authority: &str,
        name: &str,
        registration: InvokerRegistration,
    ) -> bool {
        quiet(
            "register_invoker",
            name,
            self.bridge.register_invoker(authority, name, registration),
        )
        .unwrap_or(false)
    }

    pub fn unregister_invoker(&self, authority: &str, name: &str) -> bool {
        quiet(
            "unregister_invoker",
            name,
            self.bridge.unregister_invoker(authority, name),
        )
        .unwrap_or(false)
    }

    pub fn register_interface<I>(&self, authority: &str, name: &str, object: Arc<I>) -> bool
    where
        I: RemoteInterface + ?Sized,
    {
        quiet(
            "register_interface",
            name,
            self.bridge.register_interface(authority, name, object),
        )
        .unwrap_or(false)
    }

    pub fn unregister_interface(&self, authority: &str, name: &str) -> bool {
        quiet(
            "unregister_interface",
            name,
            self.bridge.unregister_interface(authority, name),
        )
        .unwrap_or(false)
    }
}
