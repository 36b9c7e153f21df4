//! Builder for configuring ProcessBridge initialization.

use std::sync::Arc;
use tracing::info;

use crate::cache::HandleCache;
use crate::codec::{Codec, CodecChain, TypeKey, TypeRegistry};
use crate::config::{BridgeConfig, CachePolicy};
use crate::error::{BridgeError, Result};
use crate::interface::{InterfaceEngine, RemoteInterface};
use crate::locator::{Locator, StaticLocator};
use crate::registry::BridgeRegistry;
use crate::transport::Endpoint;
use crate::value::ValueKind;
use crate::ProcessBridge;

type CodecSetup = Box<dyn FnOnce(&CodecChain) + Send>;
type TypeSetup = Box<dyn FnOnce(&TypeRegistry) + Send>;

/// Builder for configuring ProcessBridge initialization.
///
/// # Example
///
/// ```rust,ignore
/// use crossbridge::ProcessBridge;
///
/// let bridge = ProcessBridge::builder("proc.server")
///     .locator(locator.clone())
///     .interface::<dyn Calc>()
///     .codec(Point::key(), ValueKind::Str, JsonCodec::<Point>::new())
///     .build()?;
/// ```
pub struct ProcessBridgeBuilder {
    name: String,
    endpoint: Option<Endpoint>,
    locator: Option<Arc<dyn Locator>>,
    cache_policy: CachePolicy,
    types: Vec<TypeSetup>,
    codecs: Vec<CodecSetup>,
}

impl ProcessBridgeBuilder {
    /// Create a new builder for a bridge published as `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            locator: None,
            cache_policy: CachePolicy::default(),
            types: Vec::new(),
            codecs: Vec::new(),
        }
    }

    /// Use an existing endpoint instead of creating one named after the bridge.
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Locator used to resolve other processes' authorities.
    ///
    /// Default: an empty [`StaticLocator`] (only this process resolves)
    pub fn locator(mut self, locator: Arc<dyn Locator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Whether remote bridges are cached between calls.
    ///
    /// Default: [`CachePolicy::Cached`]
    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Register interface `I` as remote-capable at startup.
    pub fn interface<I>(mut self) -> Self
    where
        I: RemoteInterface + ?Sized,
    {
        self.types.push(Box::new(|types: &TypeRegistry| {
            types.register_interface::<I>();
        }));
        self
    }

    /// Append a codec after the built-in remote interface codec.
    ///
    /// Codecs are consulted in the order they are added here.
    pub fn codec<C>(mut self, source: TypeKey, cross: ValueKind, codec: C) -> Self
    where
        C: Codec + 'static,
    {
        self.codecs.push(Box::new(move |chain: &CodecChain| {
            chain.append_codec(source, cross, codec);
        }));
        self
    }

    /// Build the bridge.
    pub fn build(self) -> Result<ProcessBridge> {
        if self.name.is_empty() {
            return Err(BridgeError::invalid_argument("name", "must not be empty"));
        }

        let endpoint = self.endpoint.unwrap_or_else(|| Endpoint::new(self.name.clone()));
        let engine = InterfaceEngine::new(endpoint.clone());
        for setup in self.types {
            setup(engine.types());
        }
        for setup in self.codecs {
            setup(engine.codecs());
        }

        let registry = BridgeRegistry::new(self.name.clone(), engine.clone());
        let locator = self
            .locator
            .unwrap_or_else(|| Arc::new(StaticLocator::new()));

        info!(
            "Created process bridge '{}' on endpoint {} ({} encoders, cache {:?})",
            self.name,
            endpoint.identity(),
            engine.codecs().encoder_count(),
            self.cache_policy
        );

        Ok(ProcessBridge {
            name: self.name,
            endpoint,
            engine,
            registry,
            locator,
            bridges: HandleCache::new(BridgeConfig::BRIDGE_CACHE_NAME, self.cache_policy),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::error::ErrorKind;

    #[test]
    fn test_build_defaults() {
        let bridge = ProcessBridgeBuilder::new("proc.a").build().unwrap();
        assert_eq!(bridge.name(), "proc.a");
        assert_eq!(bridge.endpoint().name(), "proc.a");
        assert!(bridge.is_alive());
        // Only the built-in remote interface codec.
        assert_eq!(bridge.engine().codecs().encoder_count(), 1);
    }

    #[test]
    fn test_build_rejects_empty_name() {
        let err = ProcessBridgeBuilder::new("").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_codecs_follow_builtin() {
        let bridge = ProcessBridgeBuilder::new("proc.a")
            .codec(JsonCodec::<Vec<String>>::key(), ValueKind::Str, JsonCodec::<Vec<String>>::new())
            .build()
            .unwrap();
        assert_eq!(bridge.engine().codecs().encoder_count(), 2);
        assert_eq!(bridge.engine().codecs().decoder_count(), 2);
    }

    #[test]
    fn test_explicit_endpoint() {
        let endpoint = Endpoint::new("shared");
        let bridge = ProcessBridgeBuilder::new("proc.a")
            .endpoint(endpoint.clone())
            .build()
            .unwrap();
        endpoint.kill();
        assert!(!bridge.is_alive());
    }
}
