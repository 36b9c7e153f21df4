//! Local registration kinds.

use crate::call::{CallRef, Callback};
use crate::codec::TypeRegistry;
use crate::error::Result;
use crate::interface::{InterfaceType, RemoteInterface};
use crate::value::{Bundle, LocalObject};
use std::fmt;
use std::sync::Arc;

/// Message-style handler registered under a name.
pub trait Invoker: Send + Sync {
    fn on_invoke(
        &self,
        method: &str,
        params: Bundle,
        callback: Option<Arc<dyn Callback>>,
    ) -> Result<Bundle>;
}

impl<F> Invoker for F
where
    F: Fn(&str, Bundle, Option<Arc<dyn Callback>>) -> Result<Bundle> + Send + Sync,
{
    fn on_invoke(
        &self,
        method: &str,
        params: Bundle,
        callback: Option<Arc<dyn Callback>>,
    ) -> Result<Bundle> {
        self(method, params, callback)
    }
}

/// Constructor for an invoker type with a default value.
#[derive(Clone, Copy)]
pub struct InvokerType {
    name: &'static str,
    construct: fn() -> Arc<dyn Invoker>,
}

fn construct_default<T: Invoker + Default + 'static>() -> Arc<dyn Invoker> {
    Arc::new(T::default())
}

impl InvokerType {
    pub fn of<T: Invoker + Default + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            construct: construct_default::<T>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn instantiate(&self) -> Arc<dyn Invoker> {
        (self.construct)()
    }
}

impl fmt::Debug for InvokerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvokerType({})", self.name)
    }
}

pub type InvokerFactory = Arc<dyn Fn() -> Result<Arc<dyn Invoker>> + Send + Sync>;

/// How a local invoker is obtained. Resolved once, then cached.
#[derive(Clone)]
pub enum InvokerRegistration {
    Instance(Arc<dyn Invoker>),
    Factory(InvokerFactory),
    Type(InvokerType),
}

impl InvokerRegistration {
    pub fn instance(invoker: impl Invoker + 'static) -> Self {
        InvokerRegistration::Instance(Arc::new(invoker))
    }

    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Invoker>> + Send + Sync + 'static,
    {
        InvokerRegistration::Factory(Arc::new(factory))
    }

    pub fn of_type<T: Invoker + Default + 'static>() -> Self {
        InvokerRegistration::Type(InvokerType::of::<T>())
    }

    pub(crate) fn resolve(&self) -> Result<Arc<dyn Invoker>> {
        match self {
            InvokerRegistration::Instance(invoker) => Ok(invoker.clone()),
            InvokerRegistration::Factory(factory) => factory(),
            InvokerRegistration::Type(ty) => Ok(ty.instantiate()),
        }
    }
}

impl fmt::Debug for InvokerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokerRegistration::Instance(_) => f.write_str("Instance"),
            InvokerRegistration::Factory(_) => f.write_str("Factory"),
            InvokerRegistration::Type(ty) => ty.fmt(f),
        }
    }
}

pub type ServiceFactory = Arc<dyn Fn() -> Result<CallRef> + Send + Sync>;

/// How a local binder service is obtained. Resolved once, then cached until
/// its handle dies.
#[derive(Clone)]
pub enum ServiceRegistration {
    Instance(CallRef),
    Factory(ServiceFactory),
}

impl ServiceRegistration {
    pub fn instance(call: CallRef) -> Self {
        ServiceRegistration::Instance(call)
    }

    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn() -> Result<CallRef> + Send + Sync + 'static,
    {
        ServiceRegistration::Factory(Arc::new(factory))
    }

    pub(crate) fn resolve(&self) -> Result<CallRef> {
        match self {
            ServiceRegistration::Instance(call) => Ok(call.clone()),
            ServiceRegistration::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceRegistration::Instance(call) => write!(f, "Instance(#{})", call.as_binder().id()),
            ServiceRegistration::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// An object paired with the interface it is served as.
#[derive(Clone)]
pub struct InterfaceRegistration {
    object: LocalObject,
    itype: Arc<InterfaceType>,
}

impl InterfaceRegistration {
    pub fn new<I>(types: &TypeRegistry, object: Arc<I>) -> Self
    where
        I: RemoteInterface + ?Sized,
    {
        Self {
            object: LocalObject::shared(object),
            itype: types.ensure_interface::<I>(),
        }
    }

    pub fn from_parts(object: LocalObject, itype: Arc<InterfaceType>) -> Self {
        Self { object, itype }
    }

    pub fn object(&self) -> &LocalObject {
        &self.object
    }

    pub fn interface_type(&self) -> &Arc<InterfaceType> {
        &self.itype
    }
}

impl fmt::Debug for InterfaceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceRegistration")
            .field("interface", &self.itype.name())
            .field("object", &self.object)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Upper;

    impl Invoker for Upper {
        fn on_invoke(
            &self,
            _method: &str,
            params: Bundle,
            _callback: Option<Arc<dyn Callback>>,
        ) -> Result<Bundle> {
            let text = params.get_str("text").unwrap_or_default().to_uppercase();
            Ok(Bundle::new().with("text", text))
        }
    }

    #[test]
    fn test_type_registration_builds_fresh_instances() {
        let registration = InvokerRegistration::of_type::<Upper>();
        let a = registration.resolve().unwrap();
        let b = registration.resolve().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        let reply = a.on_invoke("up", Bundle::new().with("text", "hi"), None).unwrap();
        assert_eq!(reply.get_str("text"), Some("HI"));
    }

    #[test]
    fn test_instance_registration_shares_instance() {
        let registration = InvokerRegistration::instance(Upper);
        let a = registration.resolve().unwrap();
        let b = registration.resolve().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_closure_invoker() {
        let registration = InvokerRegistration::instance(
            |method: &str, params: Bundle, _cb: Option<Arc<dyn Callback>>| -> Result<Bundle> {
                Ok(params.with("method", method))
            },
        );
        let reply = registration
            .resolve()
            .unwrap()
            .on_invoke("ping", Bundle::new(), None)
            .unwrap();
        assert_eq!(reply.get_str("method"), Some("ping"));
        assert_eq!(format!("{:?}", registration), "Instance");
    }
}
