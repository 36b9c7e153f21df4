//! Cross-boundary value model.
//!
//! [`Value`] is everything a call can carry: plain data, raw transport handles,
//! call handles, and process-local objects that a codec must turn into one of
//! the others before they leave the process. [`Bundle`] is the string-keyed
//! parameter container every call carries.

use crate::call::CallRef;
use crate::error::{BridgeError, Result};
use crate::transport::Binder;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Runtime kind of a [`Value`], used to match decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Bundle,
    Binder,
    Call,
    Object,
}

/// A value that can cross the call boundary.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Bundle(Bundle),
    /// Raw transport handle.
    Binder(Binder),
    /// Transactable call handle.
    Call(CallRef),
    /// Process-local object not yet encoded.
    Object(LocalObject),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::List(_) => ValueKind::List,
            Value::Bundle(_) => ValueKind::Bundle,
            Value::Binder(_) => ValueKind::Binder,
            Value::Call(_) => ValueKind::Call,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Wrap an arbitrary local value.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(LocalObject::new(value))
    }

    /// Wrap a shared object, typically an interface implementation.
    pub fn shared<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Value::Object(LocalObject::shared(value))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bundle(&self) -> Option<&Bundle> {
        match self {
            Value::Bundle(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&LocalObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Convert into a typed value.
    pub fn into_typed<T: FromValue>(self) -> Result<T> {
        T::from_value(self)
    }

    /// Convert plain JSON data into a value.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Bundle(Bundle::from_json_map(map)),
        }
    }

    /// Convert into plain JSON data.
    ///
    /// Handles and local objects have no JSON form and are rejected.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| BridgeError::invalid_argument("value", "non-finite float"))?,
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(bytes) => serde_json::Value::Array(
                bytes.iter().map(|b| serde_json::Value::from(*b)).collect(),
            ),
            Value::List(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Result<Vec<_>>>()?,
            ),
            Value::Bundle(bundle) => bundle.to_json()?,
            other => {
                return Err(BridgeError::invalid_argument(
                    "value",
                    format!("{:?} values have no JSON form", other.kind()),
                ))
            }
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Bundle(a), Value::Bundle(b)) => a == b,
            (Value::Binder(a), Value::Binder(b)) => a == b,
            (Value::Call(a), Value::Call(b)) => a.as_binder() == b.as_binder(),
            (Value::Object(a), Value::Object(b)) => a.same_object(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "Bytes({})", b.len()),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Bundle(b) => b.fmt(f),
            Value::Binder(b) => write!(f, "Binder(#{})", b.id()),
            Value::Call(c) => write!(f, "Call(#{})", c.as_binder().id()),
            Value::Object(o) => o.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<Bundle> for Value {
    fn from(v: Bundle) -> Self {
        Value::Bundle(v)
    }
}

impl From<Binder> for Value {
    fn from(v: Binder) -> Self {
        Value::Binder(v)
    }
}

impl From<CallRef> for Value {
    fn from(v: CallRef) -> Self {
        Value::Call(v)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A process-local object carried as a [`Value`].
///
/// Identity is the address of the wrapped object, so two wrappers around
/// clones of the same `Arc` compare equal.
#[derive(Clone)]
pub struct LocalObject {
    inner: Arc<dyn Any + Send + Sync>,
    addr: usize,
    type_name: &'static str,
}

impl LocalObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let inner: Arc<T> = Arc::new(value);
        let addr = Arc::as_ptr(&inner) as *const () as usize;
        Self {
            inner,
            addr,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Wrap a shared object, keeping the identity of the pointee.
    pub fn shared<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let addr = Arc::as_ptr(&value) as *const () as usize;
        Self {
            inner: Arc::new(value),
            addr,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Recover a shared object wrapped with [`LocalObject::shared`].
    pub fn shared_ref<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<Arc<T>>().cloned()
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn same_object(&self, other: &LocalObject) -> bool {
        self.addr == other.addr
    }
}

impl fmt::Debug for LocalObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({} @ {:#x})", self.type_name, self.addr)
    }
}

/// Ordered string-keyed parameter container.
#[derive(Clone, Default, PartialEq)]
pub struct Bundle {
    entries: BTreeMap<String, Value>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(key, value);
        self
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_bundle(&self, key: &str) -> Option<&Bundle> {
        self.get(key).and_then(Value::as_bundle)
    }

    pub fn get_call(&self, key: &str) -> Option<CallRef> {
        match self.get(key) {
            Some(Value::Call(call)) => Some(call.clone()),
            _ => None,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Build a bundle from a JSON object.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Object(map) => Ok(Self::from_json_map(map)),
            other => Err(BridgeError::invalid_argument(
                "bundle",
                format!("expected a JSON object, got {}", other),
            )),
        }
    }

    fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(k, v)| (k, Value::from_json(v)))
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.entries {
            map.insert(key.clone(), value.to_json()?);
        }
        Ok(serde_json::Value::Object(map))
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl FromIterator<(String, Value)> for Bundle {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Conversion out of a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(expected: &str, value: &Value) -> BridgeError {
    BridgeError::invalid_argument(
        "value",
        format!("expected {}, got {:?}", expected, value.kind()),
    )
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for () {
    fn from_value(_: Value) -> Result<Self> {
        Ok(())
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide)
            .map_err(|_| BridgeError::invalid_argument("value", format!("{} overflows i32", wide)))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

impl FromValue for Vec<Value> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => Ok(items),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl FromValue for Bundle {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bundle(b) => Ok(b),
            other => Err(mismatch("bundle", &other)),
        }
    }
}

impl FromValue for Binder {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Binder(b) => Ok(b),
            Value::Call(call) => Ok(call.as_binder()),
            other => Err(mismatch("binder", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bundle_json_conversion() {
        let bundle = Bundle::from_json(json!({"k": "v", "n": 3, "nested": {"ok": true}})).unwrap();
        assert_eq!(bundle.get_str("k"), Some("v"));
        assert_eq!(bundle.get_i64("n"), Some(3));
        assert_eq!(bundle.get_bundle("nested").and_then(|b| b.get_bool("ok")), Some(true));

        let back = bundle.to_json().unwrap();
        assert_eq!(back, json!({"k": "v", "n": 3, "nested": {"ok": true}}));
    }

    #[test]
    fn test_bundle_from_non_object_fails() {
        assert!(Bundle::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn test_handles_have_no_json_form() {
        let endpoint = crate::transport::Endpoint::new("value.json");
        let bundle = Bundle::new().with("h", endpoint.new_handle());
        assert!(bundle.to_json().is_err());
    }

    #[test]
    fn test_object_identity() {
        let shared: Arc<String> = Arc::new("obj".to_string());
        let a = LocalObject::shared(shared.clone());
        let b = LocalObject::shared(shared.clone());
        let c = LocalObject::shared(Arc::new("obj".to_string()));

        assert!(a.same_object(&b));
        assert!(!a.same_object(&c));
        assert_eq!(a.shared_ref::<String>().as_deref(), Some(&"obj".to_string()));
        assert_eq!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_typed_conversion() {
        assert_eq!(Value::from(5).into_typed::<i64>().unwrap(), 5);
        assert_eq!(Value::Null.into_typed::<Option<i64>>().unwrap(), None);
        assert!(Value::from("x").into_typed::<i64>().is_err());
        assert!(Value::from(i64::MAX).into_typed::<i32>().is_err());
    }

    #[test]
    fn test_value_kinds() {
        assert_eq!(Value::from(1.5).kind(), ValueKind::Float);
        assert_eq!(Value::from(Bundle::new()).kind(), ValueKind::Bundle);
        assert_eq!(Value::object(7u8).kind(), ValueKind::Object);
    }
}
