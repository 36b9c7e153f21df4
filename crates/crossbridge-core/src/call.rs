//! Call handles and callbacks.
//!
//! A [`Call`] is the one operation every transport-facing object exposes:
//! take a [`Bundle`], return a [`Bundle`]. Services, wrapped callbacks and
//! interface stubs are all calls.

use crate::cache::TokenCache;
use crate::error::Result;
use crate::transport::{Binder, Endpoint, HandleId};
use crate::value::Bundle;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A transactable call handle.
pub trait Call: Send + Sync {
    /// Run the call. Fails with a transport error when the owning endpoint is
    /// dead.
    fn on_call(&self, params: Bundle) -> Result<Bundle>;

    /// The transport handle identifying this call.
    fn as_binder(&self) -> Binder;
}

impl fmt::Debug for dyn Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("handle", &self.as_binder().id())
            .finish()
    }
}

/// Shared call handle.
pub type CallRef = Arc<dyn Call>;

type Handler = Box<dyn Fn(Bundle) -> Result<Bundle> + Send + Sync>;

/// A [`Call`] served by a closure on a handle minted from an endpoint.
pub struct CallStub {
    label: String,
    binder: Binder,
    handler: Handler,
}

impl CallStub {
    pub fn new<F>(endpoint: &Endpoint, label: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Bundle) -> Result<Bundle> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            binder: endpoint.new_handle(),
            handler: Box::new(handler),
        }
    }

    pub fn into_ref(self) -> CallRef {
        Arc::new(self)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Call for CallStub {
    fn on_call(&self, params: Bundle) -> Result<Bundle> {
        self.binder.ensure_alive(&self.label)?;
        (self.handler)(params)
    }

    fn as_binder(&self) -> Binder {
        self.binder.clone()
    }
}

impl fmt::Debug for CallStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallStub")
            .field("label", &self.label)
            .field("handle", &self.binder.id())
            .finish()
    }
}

/// User-facing callback passed along with an invocation.
pub trait Callback: Send + Sync {
    fn on_call(&self, params: Bundle) -> Result<Bundle>;
}

impl<F> Callback for F
where
    F: Fn(Bundle) -> Result<Bundle> + Send + Sync,
{
    fn on_call(&self, params: Bundle) -> Result<Bundle> {
        self(params)
    }
}

/// Callback backed by a received call handle.
struct RemoteCallback {
    call: CallRef,
}

impl Callback for RemoteCallback {
    fn on_call(&self, params: Bundle) -> Result<Bundle> {
        self.call.on_call(params)
    }
}

/// Converts callbacks to call handles and back, reusing wrappers by identity.
pub struct CallbackWrapper {
    endpoint: Endpoint,
    stubs: TokenCache<usize, dyn Call>,
    proxies: TokenCache<HandleId, dyn Callback>,
}

impl CallbackWrapper {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            stubs: TokenCache::new("callback-stubs"),
            proxies: TokenCache::new("callback-proxies"),
        }
    }

    /// Wrap a local callback so the far side can call it.
    pub fn to_call(&self, callback: &Arc<dyn Callback>) -> Result<CallRef> {
        let key = Arc::as_ptr(callback) as *const () as usize;
        self.stubs.get_or_load(&key, || {
            let target = callback.clone();
            let stub = CallStub::new(&self.endpoint, "callback", move |params| {
                target.on_call(params)
            });
            debug!("Wrapped callback as call handle #{}", stub.as_binder().id());
            Ok(stub.into_ref())
        })
    }

    /// Turn a received call handle back into a callback.
    pub fn to_callback(&self, call: &CallRef) -> Result<Arc<dyn Callback>> {
        let key = call.as_binder().id();
        self.proxies.get_or_load(&key, || {
            let proxy: Arc<dyn Callback> = Arc::new(RemoteCallback { call: call.clone() });
            Ok(proxy)
        })
    }
}
