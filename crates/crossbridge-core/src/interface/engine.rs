//! Stub and proxy construction with identity caching.

use super::{stub, InterfaceProxy, InterfaceType, RemoteInterface};
use crate::cache::{CacheStats, HandleBound, HandleCache, TokenCache};
use crate::call::{Call, CallRef, CallbackWrapper};
use crate::codec::{CodecChain, RemoteInterfaceCodec, TypeKey, TypeRegistry};
use crate::config::{BridgeConfig, CachePolicy};
use crate::error::{BridgeError, Result};
use crate::transport::{Binder, Endpoint, HandleId};
use crate::value::{LocalObject, ValueKind};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
struct CachedProxy {
    object: LocalObject,
    handle: Binder,
}

impl HandleBound for CachedProxy {
    fn handle(&self) -> Binder {
        self.handle.clone()
    }
}

/// Builds stubs from local objects and proxies from call handles.
///
/// Stubs are reused per (interface, object identity) for as long as somebody
/// holds them. Proxies are reused per (interface, handle identity) until the
/// handle dies.
pub struct InterfaceEngine {
    endpoint: Endpoint,
    types: Arc<TypeRegistry>,
    codecs: Arc<CodecChain>,
    stubs: TokenCache<(TypeKey, usize), dyn Call>,
    proxies: HandleCache<(TypeKey, HandleId), CachedProxy>,
    callbacks: CallbackWrapper,
}

impl InterfaceEngine {
    /// Create an engine whose stubs live on `endpoint`.
    ///
    /// The codec chain starts with the remote interface codec.
    pub fn new(endpoint: Endpoint) -> Arc<Self> {
        Arc::new_cyclic(|engine| {
            let types = Arc::new(TypeRegistry::new());
            let codecs = Arc::new(CodecChain::new(types.clone()));
            codecs.append_codec(
                TypeKey::ANY,
                ValueKind::Call,
                RemoteInterfaceCodec::new(engine.clone()),
            );

            Self {
                callbacks: CallbackWrapper::new(endpoint.clone()),
                endpoint,
                types,
                codecs,
                stubs: TokenCache::new("interface-stubs"),
                proxies: HandleCache::new(BridgeConfig::PROXY_CACHE_NAME, CachePolicy::Cached),
            }
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn codecs(&self) -> &Arc<CodecChain> {
        &self.codecs
    }

    pub fn callbacks(&self) -> &CallbackWrapper {
        &self.callbacks
    }

    /// Stub serving `object` as interface `I`.
    pub fn build_stub<I>(&self, object: Arc<I>) -> Result<CallRef>
    where
        I: RemoteInterface + ?Sized,
    {
        let itype = self.types.ensure_interface::<I>();
        self.stub_for(&LocalObject::shared(object), &itype)
    }

    /// Stub serving an already type-erased object.
    pub fn stub_for(&self, object: &LocalObject, itype: &Arc<InterfaceType>) -> Result<CallRef> {
        let key = (itype.key(), object.addr());
        self.stubs.get_or_load(&key, || {
            let call = stub::build_stub(
                &self.endpoint,
                self.codecs.clone(),
                itype.clone(),
                object.clone(),
            );
            debug!(
                "Built {} stub #{} for {:?}",
                itype.name(),
                call.as_binder().id(),
                object
            );
            Ok(call)
        })
    }

    /// Proxy implementing `I` over `call`.
    pub fn build_proxy<I>(&self, call: CallRef) -> Result<Arc<I>>
    where
        I: RemoteInterface + ?Sized,
    {
        self.build_named_proxy::<I>(call, None)
    }

    /// Proxy implementing `I` over `call`, remembering the name it was fetched under.
    pub fn build_named_proxy<I>(&self, call: CallRef, service: Option<&str>) -> Result<Arc<I>>
    where
        I: RemoteInterface + ?Sized,
    {
        let itype = self.types.ensure_interface::<I>();
        let object = self.proxy_for(&itype, call, service)?;
        object.shared_ref::<I>().ok_or_else(|| {
            BridgeError::codec(format!("cached proxy is not a {}", I::NAME))
        })
    }

    /// Type-erased proxy over `call`.
    pub fn proxy_for(
        &self,
        itype: &Arc<InterfaceType>,
        call: CallRef,
        service: Option<&str>,
    ) -> Result<LocalObject> {
        let handle = call.as_binder();
        let key = (itype.key(), handle.id());
        let cached = self.proxies.get(&key, || {
            let proxy = InterfaceProxy::new(
                call.clone(),
                itype.clone(),
                self.codecs.clone(),
                service.map(str::to_string),
            );
            debug!("Built {} proxy over handle #{}", itype.name(), handle.id());
            Ok(Some(CachedProxy {
                object: itype.wrap_proxy(proxy),
                handle: handle.clone(),
            }))
        })?;

        cached
            .map(|c| c.object)
            .ok_or_else(|| BridgeError::codec(format!("no proxy built for {}", itype.name())))
    }

    pub fn proxy_stats(&self) -> CacheStats {
        self.proxies.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::interface::testing::{Calc, LocalCalc};
    use crate::interface::Remote;

    fn engine(name: &str) -> (Endpoint, Arc<InterfaceEngine>) {
        let endpoint = Endpoint::new(name);
        let engine = InterfaceEngine::new(endpoint.clone());
        (endpoint, engine)
    }

    #[test]
    fn test_remote_codec_registered_first() {
        let (_ep, engine) = engine("a");
        assert_eq!(engine.codecs().encoder_count(), 1);
        assert_eq!(engine.codecs().decoder_count(), 1);
    }

    #[test]
    fn test_stub_reused_per_object() {
        let (_ep, engine) = engine("a");
        let calc: Arc<dyn Calc> = Arc::new(LocalCalc::default());

        let first = engine.build_stub(calc.clone()).unwrap();
        let second = engine.build_stub(calc).unwrap();
        assert_eq!(first.as_binder(), second.as_binder());

        let other: Arc<dyn Calc> = Arc::new(LocalCalc::default());
        let third = engine.build_stub(other).unwrap();
        assert_ne!(first.as_binder(), third.as_binder());
    }

    #[test]
    fn test_proxy_reused_per_handle() {
        let (_server_ep, server) = engine("server");
        let (_client_ep, client) = engine("client");
        let stub = server.build_stub::<dyn Calc>(Arc::new(LocalCalc::default())).unwrap();

        let first = client.build_proxy::<dyn Calc>(stub.clone()).unwrap();
        let second = client.build_proxy::<dyn Calc>(stub).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.add(2, 3).unwrap(), 5);

        let stats = client.proxy_stats();
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_proxy_evicted_when_handle_dies() {
        let (server_ep, server) = engine("server");
        let (_client_ep, client) = engine("client");
        let stub = server.build_stub::<dyn Calc>(Arc::new(LocalCalc::default())).unwrap();
        let proxy = client.build_proxy::<dyn Calc>(stub).unwrap();
        assert_eq!(client.proxy_stats().entries, 1);

        server_ep.kill();
        assert_eq!(client.proxy_stats().entries, 0);
        assert!(proxy.remote_handle().is_some_and(|h| !h.is_alive()));

        let err = proxy.add(1, 1).unwrap_err();
        assert_eq!(err.root_kind(), ErrorKind::Transport);
    }
}
