//! Proxy side of an interface.

use super::{CallEnvelope, InterfaceType, RemoteInterface};
use crate::call::CallRef;
use crate::codec::CodecChain;
use crate::error::{BridgeError, Result};
use crate::transport::Binder;
use crate::value::{FromValue, Value};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

/// Untyped marshalling core wrapped by every typed proxy.
///
/// Equality, hashing and `Debug` go to the underlying handle and are never
/// marshalled.
#[derive(Clone)]
pub struct InterfaceProxy {
    call: CallRef,
    itype: Arc<InterfaceType>,
    codecs: Arc<CodecChain>,
    service: Option<String>,
}

fn invocation_failure(label: &str, err: BridgeError) -> BridgeError {
    match err {
        BridgeError::RemoteInvocation { .. } => err,
        other => BridgeError::invocation(label, other),
    }
}

impl InterfaceProxy {
    pub(crate) fn new(
        call: CallRef,
        itype: Arc<InterfaceType>,
        codecs: Arc<CodecChain>,
        service: Option<String>,
    ) -> Self {
        Self {
            call,
            itype,
            codecs,
            service,
        }
    }

    /// Call `method` on the far side.
    ///
    /// Arguments are encoded with the declared parameter types; the reply's
    /// single value is decoded with the declared return type. A reply with an
    /// empty result slot yields `Value::Null`. Every failure, transport ones
    /// included, surfaces as a remote invocation error.
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        let label = format!("{}.{}", self.itype.name(), method);

        let entry = self.itype.method(method).ok_or_else(|| {
            BridgeError::invocation(&label, BridgeError::not_found("method", method))
        })?;
        if args.len() != entry.params.len() {
            let mismatch = BridgeError::invalid_argument(
                "args",
                format!(
                    "{} expects {} argument(s), got {}",
                    label,
                    entry.params.len(),
                    args.len()
                ),
            );
            return Err(invocation_failure(&label, mismatch));
        }

        let encoded = args
            .into_iter()
            .zip(&entry.params)
            .map(|(value, param)| self.codecs.encode(value, param.ty, &param.markers))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| invocation_failure(&label, e))?;

        let envelope = CallEnvelope::call(self.service.clone(), self.itype.name(), method, encoded);
        debug!("Proxy call {} via handle #{}", label, self.call.as_binder().id());

        let reply = self
            .call
            .on_call(envelope.into_bundle())
            .map_err(|e| invocation_failure(&label, e))?;
        let result = CallEnvelope::from_bundle(&reply)
            .map_err(|e| invocation_failure(&label, e))?
            .into_result();

        match result {
            Some(value) => self
                .codecs
                .decode(value, entry.returns.ty, &entry.returns.markers)
                .map_err(|e| invocation_failure(&label, e)),
            None => Ok(Value::Null),
        }
    }

    /// Call `method` and convert the result.
    pub fn call<T: FromValue>(&self, method: &str, args: Vec<Value>) -> Result<T> {
        self.invoke(method, args)?.into_typed()
    }

    /// Call a method returning an interface.
    pub fn call_interface<I>(&self, method: &str, args: Vec<Value>) -> Result<Option<Arc<I>>>
    where
        I: RemoteInterface + ?Sized,
    {
        match self.invoke(method, args)? {
            Value::Null => Ok(None),
            Value::Object(object) => object.shared_ref::<I>().map(Some).ok_or_else(|| {
                BridgeError::codec(format!("{} returned {}", method, object.type_name()))
            }),
            other => Err(BridgeError::codec(format!(
                "{} returned {:?} where {} was declared",
                method,
                other.kind(),
                I::NAME
            ))),
        }
    }

    /// Call a method returning a decoded local object.
    pub fn call_object<T: Any + Clone>(&self, method: &str, args: Vec<Value>) -> Result<T> {
        let value = self.invoke(method, args)?;
        value
            .as_object()
            .and_then(|o| o.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| {
                BridgeError::codec(format!(
                    "{} returned {:?}, expected {}",
                    method,
                    value.kind(),
                    std::any::type_name::<T>()
                ))
            })
    }

    /// The raw transport handle behind this proxy.
    pub fn as_binder(&self) -> Binder {
        self.call.as_binder()
    }

    pub fn call_handle(&self) -> &CallRef {
        &self.call
    }

    pub fn interface_type(&self) -> &Arc<InterfaceType> {
        &self.itype
    }

    /// Name the interface was fetched under, if it was fetched by name.
    pub fn service_name(&self) -> Option<&str> {
        self.service.as_deref()
    }
}

impl fmt::Debug for InterfaceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Proxy(#{})", self.itype.name(), self.as_binder().id())
    }
}

impl PartialEq for InterfaceProxy {
    fn eq(&self, other: &Self) -> bool {
        self.as_binder() == other.as_binder()
    }
}

impl Eq for InterfaceProxy {}

impl Hash for InterfaceProxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_binder().hash(state);
    }
}
