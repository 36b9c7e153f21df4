//! The registry implementation.

use super::record::{BridgeRecord, RecordInfo};
use super::registration::{InterfaceRegistration, Invoker, InvokerRegistration, ServiceRegistration};
use super::slots::ConstructionSlots;
use super::{Bridge, BridgeRef, Category};
use crate::cache::CacheStats;
use crate::call::CallRef;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::interface::InterfaceEngine;
use crate::transport::{Binder, DeathWatch};
use crate::value::Bundle;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

type RecordMap = Mutex<HashMap<String, BridgeRecord>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BridgeError::invalid_argument("name", "must not be empty"));
    }
    Ok(())
}

/// Local registrations plus forwarding records, served as a [`Bridge`].
pub struct BridgeRegistry {
    name: String,
    binder: Binder,
    engine: Arc<InterfaceEngine>,

    services: Mutex<HashMap<String, ServiceRegistration>>,
    service_cache: ConstructionSlots<CallRef>,
    invokers: Mutex<HashMap<String, InvokerRegistration>>,
    invoker_cache: ConstructionSlots<Arc<dyn Invoker>>,
    interfaces: Mutex<HashMap<String, InterfaceRegistration>>,

    remote_services: RecordMap,
    remote_invokers: RecordMap,
    remote_interfaces: RecordMap,
    next_record: AtomicU64,

    this: Weak<BridgeRegistry>,
}

impl BridgeRegistry {
    /// Create a registry whose handle lives on the engine's endpoint.
    pub fn new(name: impl Into<String>, engine: Arc<InterfaceEngine>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|this| {
            let binder = engine.endpoint().new_handle();
            debug!("Created bridge registry '{}' as handle #{}", name, binder.id());
            Self {
                name,
                binder,
                engine,
                services: Mutex::new(HashMap::new()),
                service_cache: ConstructionSlots::new(BridgeConfig::LOCAL_SERVICE_CACHE_NAME),
                invokers: Mutex::new(HashMap::new()),
                invoker_cache: ConstructionSlots::new(BridgeConfig::LOCAL_INVOKER_CACHE_NAME),
                interfaces: Mutex::new(HashMap::new()),
                remote_services: Mutex::new(HashMap::new()),
                remote_invokers: Mutex::new(HashMap::new()),
                remote_interfaces: Mutex::new(HashMap::new()),
                next_record: AtomicU64::new(1),
                this: this.clone(),
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &Arc<InterfaceEngine> {
        &self.engine
    }

    pub fn is_alive(&self) -> bool {
        self.binder.is_alive()
    }

    /// This registry as a shareable bridge handle.
    pub fn as_bridge(&self) -> Option<BridgeRef> {
        self.this.upgrade().map(|this| this as BridgeRef)
    }

    fn ensure_alive(&self) -> Result<()> {
        self.binder.ensure_alive(&format!("bridge '{}'", self.name))
    }

    fn records(&self, category: Category) -> &RecordMap {
        match category {
            Category::Binder => &self.remote_services,
            Category::Invoker => &self.remote_invokers,
            Category::Interface => &self.remote_interfaces,
        }
    }

    // ========================================
    // Local registration
    // ========================================

    /// Register (or with `None`, remove) a local binder service.
    ///
    /// Removal also drops any forwarding record under the same name.
    pub fn register_local_service(
        &self,
        name: &str,
        registration: Option<ServiceRegistration>,
    ) -> Result<()> {
        validate_name(name)?;
        match registration {
            Some(registration) => {
                debug!("Registered local service '{}' as {:?}", name, registration);
                lock(&self.services).insert(name.to_string(), registration);
            }
            None => {
                lock(&self.services).remove(name);
                self.drop_record(Category::Binder, name);
                debug!("Removed local service '{}'", name);
            }
        }
        self.service_cache.remove(name);
        Ok(())
    }

    /// Register (or with `None`, remove) a local invoker.
    pub fn register_local_invoker(
        &self,
        name: &str,
        registration: Option<InvokerRegistration>,
    ) -> Result<()> {
        validate_name(name)?;
        match registration {
            Some(registration) => {
                debug!("Registered local invoker '{}' as {:?}", name, registration);
                lock(&self.invokers).insert(name.to_string(), registration);
            }
            None => {
                lock(&self.invokers).remove(name);
                self.drop_record(Category::Invoker, name);
                debug!("Removed local invoker '{}'", name);
            }
        }
        self.invoker_cache.remove(name);
        Ok(())
    }

    /// Register (or with `None`, remove) a local interface object.
    pub fn register_local_interface(
        &self,
        name: &str,
        registration: Option<InterfaceRegistration>,
    ) -> Result<()> {
        validate_name(name)?;
        match registration {
            Some(registration) => {
                debug!("Registered local interface '{}' as {:?}", name, registration);
                lock(&self.interfaces).insert(name.to_string(), registration);
            }
            None => {
                lock(&self.interfaces).remove(name);
                self.drop_record(Category::Interface, name);
                debug!("Removed local interface '{}'", name);
            }
        }
        Ok(())
    }

    fn drop_record(&self, category: Category, name: &str) {
        if let Some(record) = lock(self.records(category)).remove(name) {
            record.detach();
            debug!("Dropped forwarding {} record '{}'", category, name);
        }
    }

    // ========================================
    // Resolution
    // ========================================

    fn local_service(&self, name: &str) -> Result<Option<CallRef>> {
        let registration = lock(&self.services).get(name).cloned();
        registration.map(|r| r.resolve()).transpose()
    }

    fn local_invoker(&self, name: &str) -> Result<Option<Arc<dyn Invoker>>> {
        self.invoker_cache.get_or_build(name, |_| true, || {
            let registration = lock(&self.invokers).get(name).cloned();
            let Some(registration) = registration else {
                return Ok(None);
            };
            let invoker = registration.resolve()?;
            debug!("Constructed invoker '{}' from {:?}", name, registration);
            Ok(Some(invoker))
        })
    }

    fn local_interface(&self, name: &str) -> Option<InterfaceRegistration> {
        lock(&self.interfaces).get(name).cloned()
    }

    /// Live forwarding target for `(category, name)`. Dead records are purged.
    fn remote_bridge(&self, category: Category, name: &str) -> Option<BridgeRef> {
        let mut records = lock(self.records(category));
        let alive = records.get(name)?.is_alive();
        if alive {
            return records.get(name).map(|r| r.bridge.clone());
        }
        if let Some(dead) = records.remove(name) {
            dead.detach();
            debug!("Purged dead forwarding {} record '{}'", category, name);
        }
        None
    }

    // Constructed local services are checked for liveness on every lookup,
    // so only the forwarding record needs dropping here.
    fn on_bridge_died(&self, category: Category, name: &str, record_id: u64) {
        let mut records = lock(self.records(category));
        if records.get(name).is_some_and(|r| r.id == record_id) {
            records.remove(name);
            info!(
                "Forwarding {} '{}' on bridge '{}' died; record removed",
                category, name, self.name
            );
        }
    }

    // ========================================
    // Introspection
    // ========================================

    /// Snapshot of every forwarding record, sorted by category then name.
    pub fn forwarding_records(&self) -> Vec<RecordInfo> {
        let mut out: Vec<RecordInfo> = Category::ALL
            .iter()
            .flat_map(|c| {
                lock(self.records(*c))
                    .values()
                    .map(BridgeRecord::info)
                    .collect::<Vec<_>>()
            })
            .collect();
        out.sort_by(|a, b| (a.category.tag(), &a.name).cmp(&(b.category.tag(), &b.name)));
        out
    }

    pub fn has_forwarding(&self, category: Category, name: &str) -> bool {
        lock(self.records(category)).contains_key(name)
    }

    pub fn service_cache_stats(&self) -> CacheStats {
        self.service_cache.stats()
    }
}

impl Bridge for BridgeRegistry {
    fn fetch_service(&self, name: &str) -> Result<CallRef> {
        self.ensure_alive()?;
        validate_name(name)?;

        let cached = self.service_cache.get_or_build(
            name,
            |call| call.as_binder().is_alive(),
            || self.local_service(name),
        )?;
        if let Some(call) = cached {
            return Ok(call);
        }

        if let Some(bridge) = self.remote_bridge(Category::Binder, name) {
            debug!("Forwarding service lookup '{}' to bridge #{}", name, bridge.as_binder().id());
            return bridge.fetch_service(name);
        }

        Err(BridgeError::not_found("service", name))
    }

    fn invoke(
        &self,
        name: &str,
        method: &str,
        params: Bundle,
        callback: Option<CallRef>,
    ) -> Result<Bundle> {
        self.ensure_alive()?;
        validate_name(name)?;

        if let Some(invoker) = self.local_invoker(name)? {
            let callback = callback
                .map(|call| self.engine.callbacks().to_callback(&call))
                .transpose()?;
            debug!("Invoking '{}'.{} locally", name, method);
            return invoker
                .on_invoke(method, params, callback)
                .map_err(|e| BridgeError::invocation(format!("{}.{}", name, method), e));
        }

        if let Some(bridge) = self.remote_bridge(Category::Invoker, name) {
            debug!(
                "Forwarding invoke '{}'.{} to bridge #{}",
                name,
                method,
                bridge.as_binder().id()
            );
            return bridge.invoke(name, method, params, callback);
        }

        Err(BridgeError::not_found("invoker", name))
    }

    fn fetch_interface(&self, name: &str) -> Result<CallRef> {
        self.ensure_alive()?;
        validate_name(name)?;

        if let Some(registration) = self.local_interface(name) {
            return self
                .engine
                .stub_for(registration.object(), registration.interface_type());
        }

        if let Some(bridge) = self.remote_bridge(Category::Interface, name) {
            debug!("Forwarding interface lookup '{}' to bridge #{}", name, bridge.as_binder().id());
            return bridge.fetch_interface(name);
        }

        Err(BridgeError::not_found("interface", name))
    }

    fn register(&self, name: &str, bridge: Option<BridgeRef>, category: Category) -> Result<bool> {
        self.ensure_alive()?;
        validate_name(name)?;

        let mut records = lock(self.records(category));

        let Some(bridge) = bridge else {
            if let Some(old) = records.remove(name) {
                old.detach();
                debug!("Unregistered forwarding {} '{}' from bridge '{}'", category, name, self.name);
            }
            return Ok(true);
        };

        let handle = bridge.as_binder();
        if handle == self.binder {
            return Err(BridgeError::invalid_argument(
                "bridge",
                "a registry cannot forward to itself",
            ));
        }
        if !handle.is_alive() {
            return Err(BridgeError::invalid_argument(
                "bridge",
                format!("handle #{} is dead", handle.id()),
            ));
        }

        if let Some(old) = records.remove(name) {
            old.detach();
            debug!("Replacing forwarding {} '{}' (record {})", category, name, old.id);
        }

        let id = self.next_record.fetch_add(1, Ordering::Relaxed);
        let this = self.this.clone();
        let owned_name = name.to_string();
        let watch = DeathWatch::attach(&handle, move |_| {
            if let Some(registry) = this.upgrade() {
                registry.on_bridge_died(category, &owned_name, id);
            }
        })
        .map_err(|e| {
            warn!("Could not watch bridge #{} for '{}': {}", handle.id(), name, e);
            BridgeError::invalid_argument("bridge", e.to_string())
        })?;

        let record = BridgeRecord::new(id, name, category, bridge, watch);
        info!(
            "Registered forwarding {} '{}' on bridge '{}' for {}",
            category, name, self.name, record.caller
        );
        records.insert(name.to_string(), record);
        Ok(true)
    }

    fn as_binder(&self) -> Binder {
        self.binder.clone()
    }
}

impl fmt::Debug for BridgeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeRegistry")
            .field("name", &self.name)
            .field("handle", &self.binder.id())
            .finish()
    }
}

impl Drop for BridgeRegistry {
    fn drop(&mut self) {
        for category in Category::ALL {
            let records = std::mem::take(&mut *lock(self.records(category)));
            for record in records.values() {
                record.detach();
            }
        }
    }
}
