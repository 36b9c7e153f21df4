//! Type-erased interface descriptor.

use super::{Args, InterfaceProxy, Param, RemoteInterface};
use crate::codec::TypeKey;
use crate::error::{BridgeError, Result};
use crate::value::{LocalObject, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

type ErasedDispatch = Box<dyn Fn(&LocalObject, Args) -> Result<Value> + Send + Sync>;
type MethodTable = HashMap<&'static str, Arc<MethodEntry>>;

/// A method resolved from an interface's dispatch table.
pub struct MethodEntry {
    pub name: &'static str,
    pub params: Vec<Param>,
    pub returns: Param,
    dispatch: ErasedDispatch,
}

impl MethodEntry {
    /// Call the method on a registered object.
    pub fn dispatch(&self, object: &LocalObject, args: Args) -> Result<Value> {
        (self.dispatch)(object, args)
    }
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .field("params", &self.params.len())
            .field("returns", &self.returns.ty)
            .finish()
    }
}

/// Descriptor of one interface: name, type key and lazily built method table.
pub struct InterfaceType {
    name: &'static str,
    key: TypeKey,
    table: OnceLock<MethodTable>,
    build: fn() -> MethodTable,
    wrap: fn(InterfaceProxy) -> LocalObject,
}

impl InterfaceType {
    pub fn of<I>() -> Self
    where
        I: RemoteInterface + ?Sized,
    {
        Self {
            name: I::NAME,
            key: TypeKey::of::<I>(),
            table: OnceLock::new(),
            build: build_table::<I>,
            wrap: wrap_proxy::<I>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Resolve a method by name, building the table on first use.
    pub fn method(&self, name: &str) -> Option<Arc<MethodEntry>> {
        self.table.get_or_init(self.build).get(name).cloned()
    }

    pub fn method_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.table.get_or_init(self.build).keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Whether the method table has been built.
    pub fn is_built(&self) -> bool {
        self.table.get().is_some()
    }

    pub(crate) fn wrap_proxy(&self, proxy: InterfaceProxy) -> LocalObject {
        (self.wrap)(proxy)
    }
}

impl fmt::Debug for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceType")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("built", &self.is_built())
            .finish()
    }
}

fn build_table<I>() -> MethodTable
where
    I: RemoteInterface + ?Sized,
{
    let mut table = MethodTable::new();
    for method in I::methods() {
        let invoke = method.invoke;
        let dispatch: ErasedDispatch = Box::new(move |object: &LocalObject, args: Args| {
            let target = object.shared_ref::<I>().ok_or_else(|| {
                BridgeError::codec(format!(
                    "{} does not implement {}",
                    object.type_name(),
                    I::NAME
                ))
            })?;
            invoke(&*target, args)
        });

        let entry = Arc::new(MethodEntry {
            name: method.name,
            params: method.params,
            returns: method.returns,
            dispatch,
        });
        if table.insert(method.name, entry).is_some() {
            warn!("{} declares {} more than once; last one wins", I::NAME, method.name);
        }
    }
    debug!("Built method table for {} ({} methods)", I::NAME, table.len());
    table
}

fn wrap_proxy<I>(proxy: InterfaceProxy) -> LocalObject
where
    I: RemoteInterface + ?Sized,
{
    LocalObject::shared(I::proxy(proxy))
}
