//! Centralized configuration for the call bridge.
//!
//! Constants for envelope keys, cache bounds and registration tags, plus the
//! client-side caching policy selected through the builder.

/// Bridge-wide constants.
pub struct BridgeConfig;

impl BridgeConfig {
    /// Maximum number of live entries kept by an identity cache.
    pub const TOKEN_CACHE_MAX_SIZE: usize = 1024;

    /// Bundle key carrying a call envelope.
    pub const CALL_INFO_KEY: &'static str = "callInfo";

    pub const ENVELOPE_INTERFACE_NAME_KEY: &'static str = "interfaceName";
    pub const ENVELOPE_INTERFACE_TYPE_KEY: &'static str = "interfaceType";
    pub const ENVELOPE_METHOD_KEY: &'static str = "methodName";
    pub const ENVELOPE_ARGS_KEY: &'static str = "args";

    /// Wire tags of the forwarding namespaces.
    pub const CATEGORY_BINDER: i64 = 1;
    pub const CATEGORY_INVOKER: i64 = 2;
    pub const CATEGORY_INTERFACE: i64 = 3;

    /// Prefix used when a builder is not given an explicit endpoint name.
    pub const DEFAULT_ENDPOINT_PREFIX: &'static str = "crossbridge.process";

    /// Name of the client-side cache holding resolved bridges.
    pub const BRIDGE_CACHE_NAME: &'static str = "bridges";
    /// Name of the registry cache holding constructed local services.
    pub const LOCAL_SERVICE_CACHE_NAME: &'static str = "local-services";
    /// Name of the registry cache holding constructed local invokers.
    pub const LOCAL_INVOKER_CACHE_NAME: &'static str = "local-invokers";
    /// Name of the cache holding interface proxies.
    pub const PROXY_CACHE_NAME: &'static str = "interface-proxies";
}

/// Whether resolved remote handles are kept between lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Keep resolved handles until their endpoint dies.
    #[default]
    Cached,
    /// Resolve on every call and never store anything.
    NoCache,
}

impl CachePolicy {
    pub fn is_cached(&self) -> bool {
        matches!(self, CachePolicy::Cached)
    }
}
