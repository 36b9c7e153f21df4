//! Interface registration and proxy lookup.

use std::sync::Arc;

use crate::error::Result;
use crate::interface::{InterfaceType, RemoteInterface};
use crate::registry::{Category, InterfaceRegistration};
use crate::ProcessBridge;

impl ProcessBridge {
    /// Register `I` as a remote-capable interface.
    ///
    /// Interfaces are also registered on first use; calling this at startup
    /// makes them known to codecs before any value of that type is seen.
    pub fn register_interface_type<I>(&self) -> Arc<InterfaceType>
    where
        I: RemoteInterface + ?Sized,
    {
        self.engine.types().register_interface::<I>()
    }

    /// Serve `object` as interface `I` under `name` in this process.
    pub fn register_local_interface<I>(&self, name: &str, object: Arc<I>) -> Result<()>
    where
        I: RemoteInterface + ?Sized,
    {
        let registration = InterfaceRegistration::new(self.engine.types(), object);
        self.registry.register_local_interface(name, Some(registration))
    }

    pub fn unregister_local_interface(&self, name: &str) -> Result<()> {
        self.registry.register_local_interface(name, None)
    }

    /// Serve `object` as interface `I` through `authority`.
    pub fn register_interface<I>(&self, authority: &str, name: &str, object: Arc<I>) -> Result<bool>
    where
        I: RemoteInterface + ?Sized,
    {
        let registration = InterfaceRegistration::new(self.engine.types(), object);
        self.forward_registration(authority, name, Category::Interface, |registry| {
            registry.register_local_interface(name, Some(registration))
        })
    }

    pub fn unregister_interface(&self, authority: &str, name: &str) -> Result<bool> {
        self.forward_removal(authority, name, Category::Interface)
    }

    /// Proxy for the interface `name` served by `authority`.
    ///
    /// The same handle always yields the same proxy while the handle lives.
    pub fn fetch_interface<I>(&self, authority: &str, name: &str) -> Result<Arc<I>>
    where
        I: RemoteInterface + ?Sized,
    {
        let call = self.resolve(authority)?.fetch_interface(name)?;
        self.engine.build_named_proxy::<I>(call, Some(name))
    }
}
