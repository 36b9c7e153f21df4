//! Static type identities and the type registry.
//!
//! Capability flags and parameter markers are registered explicitly at startup
//! and looked up by [`TypeKey`].

use crate::interface::{InterfaceType, RemoteInterface};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Identity of a static type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey(&'static str);

impl TypeKey {
    /// Assignable from every type.
    pub const ANY: TypeKey = TypeKey("*");
    /// Declared return type of methods that produce no value.
    pub const UNIT: TypeKey = TypeKey("()");

    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey(std::any::type_name::<T>())
    }

    /// Key for a type known only by name.
    pub const fn named(name: &'static str) -> Self {
        TypeKey(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }

    pub fn is_any(&self) -> bool {
        *self == TypeKey::ANY
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A parameter or return annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Marker(&'static str);

impl Marker {
    /// Pass this value as a remote interface.
    pub const REMOTE: Marker = Marker("remote");

    pub const fn new(name: &'static str) -> Self {
        Marker(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

/// Annotations attached to one parameter or return value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markers(Vec<Marker>);

impl Markers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, marker: Marker) -> Self {
        if !self.0.contains(&marker) {
            self.0.push(marker);
        }
        self
    }

    pub fn contains(&self, marker: Marker) -> bool {
        self.0.contains(&marker)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.0.iter()
    }
}

impl From<Marker> for Markers {
    fn from(marker: Marker) -> Self {
        Markers(vec![marker])
    }
}

/// Capability flags for a registered type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeFlags {
    /// Values of this type cross the boundary as call handles.
    pub remote_interface: bool,
}

impl TypeFlags {
    pub const REMOTE_INTERFACE: TypeFlags = TypeFlags {
        remote_interface: true,
    };
}

#[derive(Default)]
struct TypeEntry {
    flags: TypeFlags,
    supertypes: Vec<TypeKey>,
    interface: Option<Arc<InterfaceType>>,
}

/// Registry of known types, their flags, supertypes and interface descriptors.
#[derive(Default)]
pub struct TypeRegistry {
    entries: RwLock<HashMap<TypeKey, TypeEntry>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeKey, TypeEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeKey, TypeEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the flags of a type, registering it if needed.
    pub fn register_type(&self, key: TypeKey, flags: TypeFlags) {
        self.write().entry(key).or_default().flags = flags;
    }

    /// Register interface `I` as a remote interface.
    ///
    /// Registering the same interface twice returns the existing descriptor.
    pub fn register_interface<I>(&self) -> Arc<InterfaceType>
    where
        I: RemoteInterface + ?Sized,
    {
        self.register_interface_with::<I>(TypeFlags::REMOTE_INTERFACE)
    }

    /// Register interface `I` with explicit flags.
    ///
    /// Without the remote flag the interface is only passed as a call handle
    /// where a parameter carries [`Marker::REMOTE`].
    pub fn register_interface_with<I>(&self, flags: TypeFlags) -> Arc<InterfaceType>
    where
        I: RemoteInterface + ?Sized,
    {
        let key = TypeKey::of::<I>();
        let mut entries = self.write();
        let entry = entries.entry(key).or_default();
        entry.flags = flags;
        match &entry.interface {
            Some(existing) => existing.clone(),
            None => {
                let descriptor = Arc::new(InterfaceType::of::<I>());
                entry.interface = Some(descriptor.clone());
                debug!("Registered interface type {} ({})", I::NAME, key);
                descriptor
            }
        }
    }

    /// Descriptor for `I`, registering it as a remote interface on first use.
    ///
    /// Flags of an already registered interface are left alone.
    pub fn ensure_interface<I>(&self) -> Arc<InterfaceType>
    where
        I: RemoteInterface + ?Sized,
    {
        match self.interface(TypeKey::of::<I>()) {
            Some(existing) => existing,
            None => self.register_interface::<I>(),
        }
    }

    /// Declare that values of `sub` are assignable to `sup`.
    pub fn declare_supertype(&self, sub: TypeKey, sup: TypeKey) {
        let mut entries = self.write();
        let entry = entries.entry(sub).or_default();
        if !entry.supertypes.contains(&sup) {
            entry.supertypes.push(sup);
        }
    }

    pub fn flags(&self, key: TypeKey) -> TypeFlags {
        self.read().get(&key).map(|e| e.flags).unwrap_or_default()
    }

    pub fn interface(&self, key: TypeKey) -> Option<Arc<InterfaceType>> {
        self.read().get(&key).and_then(|e| e.interface.clone())
    }

    /// Whether a value of static type `source` may be used where `target` is
    /// expected.
    pub fn is_assignable(&self, target: TypeKey, source: TypeKey) -> bool {
        if target.is_any() || target == source {
            return true;
        }

        let entries = self.read();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([source]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(entry) = entries.get(&current) {
                for sup in &entry.supertypes {
                    if *sup == target {
                        return true;
                    }
                    queue.push_back(*sup);
                }
            }
        }
        false
    }

    /// Whether a value of type `key` with `markers` crosses as a call handle.
    pub fn is_remote_interface(&self, key: TypeKey, markers: &Markers) -> bool {
        let entries = self.read();
        match entries.get(&key) {
            Some(entry) if entry.interface.is_some() => {
                entry.flags.remote_interface || markers.contains(Marker::REMOTE)
            }
            _ => false,
        }
    }
}
