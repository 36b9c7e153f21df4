//! Typed interfaces over call handles.
//!
//! An interface is a trait that extends [`Remote`]. Implementing
//! [`RemoteInterface`] on its trait object type (`dyn Calc`) supplies the
//! dispatch table used by both sides:
//!
//! - the stub side decodes arguments, calls the method on the registered
//!   object and encodes the result
//! - the proxy side encodes arguments, sends a [`CallEnvelope`] through the
//!   call handle and decodes the single returned value
//!
//! # Example
//!
//! ```rust,ignore
//! pub trait Calc: Remote {
//!     fn add(&self, a: i64, b: i64) -> Result<i64>;
//! }
//!
//! impl RemoteInterface for dyn Calc {
//!     const NAME: &'static str = "demo.Calc";
//!
//!     fn methods() -> Vec<Method<Self>> {
//!         vec![Method::new(
//!             "add",
//!             vec![Param::of::<i64>(), Param::of::<i64>()],
//!             Param::of::<i64>(),
//!             |calc, args| Ok(calc.add(args.get(0)?, args.get(1)?)?.into()),
//!         )]
//!     }
//!
//!     fn proxy(proxy: InterfaceProxy) -> Arc<Self> {
//!         Arc::new(CalcProxy(proxy))
//!     }
//! }
//! ```

mod descriptor;
mod engine;
mod envelope;
mod proxy;
mod stub;

#[cfg(test)]
pub(crate) mod testing;

pub use descriptor::{InterfaceType, MethodEntry};
pub use engine::InterfaceEngine;
pub use envelope::CallEnvelope;
pub use proxy::InterfaceProxy;

use crate::codec::{Marker, Markers, TypeKey};
use crate::error::{BridgeError, Result};
use crate::transport::Binder;
use crate::value::{FromValue, Value};
use std::any::Any;
use std::sync::Arc;

/// Base trait of every remote-capable interface.
pub trait Remote: Send + Sync {
    /// Underlying transport handle.
    ///
    /// `None` for local implementations, the call handle's binder for proxies.
    fn remote_handle(&self) -> Option<Binder> {
        None
    }
}

/// Dispatch table and proxy constructor for an interface.
pub trait RemoteInterface: Remote + 'static {
    /// Interface name carried in call envelopes.
    const NAME: &'static str;

    /// Declared methods.
    fn methods() -> Vec<Method<Self>>;

    /// Wrap an untyped proxy into the typed interface.
    fn proxy(proxy: InterfaceProxy) -> Arc<Self>;
}

/// Static type and annotations of a parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub ty: TypeKey,
    pub markers: Markers,
}

impl Param {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::key(TypeKey::of::<T>())
    }

    pub fn key(ty: TypeKey) -> Self {
        Self {
            ty,
            markers: Markers::none(),
        }
    }

    /// Return type of methods that produce nothing.
    pub fn unit() -> Self {
        Self::key(TypeKey::UNIT)
    }

    pub fn marked(mut self, marker: Marker) -> Self {
        self.markers = self.markers.with(marker);
        self
    }

    pub fn is_unit(&self) -> bool {
        self.ty == TypeKey::UNIT
    }
}

/// Dispatch function of one method.
pub type Dispatch<I> = fn(&I, Args) -> Result<Value>;

/// One entry of an interface's dispatch table.
pub struct Method<I: ?Sized> {
    pub name: &'static str,
    pub params: Vec<Param>,
    pub returns: Param,
    pub invoke: Dispatch<I>,
}

impl<I: ?Sized> Method<I> {
    pub fn new(name: &'static str, params: Vec<Param>, returns: Param, invoke: Dispatch<I>) -> Self {
        Self {
            name,
            params,
            returns,
            invoke,
        }
    }
}

/// Decoded argument list handed to a dispatch function.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `index`; missing trailing arguments read as null.
    pub fn value(&self, index: usize) -> Value {
        self.values.get(index).cloned().unwrap_or(Value::Null)
    }

    /// Typed argument at `index`.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        T::from_value(self.value(index)).map_err(|e| {
            BridgeError::invalid_argument(format!("arg{}", index), e.to_string())
        })
    }

    /// Interface argument at `index`, `None` when null.
    pub fn interface<I>(&self, index: usize) -> Result<Option<Arc<I>>>
    where
        I: RemoteInterface + ?Sized,
    {
        match self.value(index) {
            Value::Null => Ok(None),
            Value::Object(object) => object.shared_ref::<I>().map(Some).ok_or_else(|| {
                BridgeError::invalid_argument(
                    format!("arg{}", index),
                    format!("{} does not implement {}", object.type_name(), I::NAME),
                )
            }),
            other => Err(BridgeError::invalid_argument(
                format!("arg{}", index),
                format!("expected {}, got {:?}", I::NAME, other.kind()),
            )),
        }
    }

    /// Local object argument at `index`.
    pub fn object<T: Any + Clone>(&self, index: usize) -> Result<T> {
        self.values
            .get(index)
            .and_then(Value::as_object)
            .and_then(|o| o.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| {
                BridgeError::invalid_argument(
                    format!("arg{}", index),
                    format!("expected {}", std::any::type_name::<T>()),
                )
            })
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}
