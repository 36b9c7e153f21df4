//! JSON codec for plain data types.

use super::{Decoder, Encoder, Marker, Markers, TypeKey};
use crate::error::{BridgeError, Result};
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Carries local objects of type `T` across the boundary as JSON strings.
///
/// Without a gate marker every `T` declared parameter is converted; with one,
/// only parameters carrying that marker are.
pub struct JsonCodec<T> {
    gate: Option<Marker>,
    _type: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            gate: None,
            _type: PhantomData,
        }
    }

    pub fn gated(marker: Marker) -> Self {
        Self {
            gate: Some(marker),
            _type: PhantomData,
        }
    }

    /// Type key values of `T` are declared with.
    pub fn key() -> TypeKey {
        TypeKey::of::<T>()
    }

    fn accepts(&self, ty: TypeKey, markers: &Markers) -> bool {
        ty == Self::key() && self.gate.map_or(true, |m| markers.contains(m))
    }
}

impl<T> Default for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Encoder for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn handle_encode(&self, value: &Value, ty: TypeKey, markers: &Markers) -> bool {
        self.accepts(ty, markers)
            && value
                .as_object()
                .is_some_and(|obj| obj.downcast_ref::<T>().is_some())
    }

    fn encode(&self, value: Value, ty: TypeKey) -> Result<Value> {
        let object = value
            .as_object()
            .and_then(|obj| obj.downcast_ref::<T>())
            .ok_or_else(|| BridgeError::codec(format!("value is not a {}", ty)))?;
        Ok(Value::Str(serde_json::to_string(object)?))
    }
}

impl<T> Decoder for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn handle_decode(&self, _value: &Value, ty: TypeKey, markers: &Markers) -> bool {
        self.accepts(ty, markers)
    }

    fn decode(&self, value: Value, ty: TypeKey) -> Result<Value> {
        let text = value
            .as_str()
            .ok_or_else(|| BridgeError::codec(format!("{} expects a JSON string", ty)))?;
        let decoded: T = serde_json::from_str(text)?;
        Ok(Value::object(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecChain, TypeRegistry};
    use crate::value::ValueKind;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_encodes_as_json_string() {
        let chain = CodecChain::new(Arc::new(TypeRegistry::new()));
        chain.append_codec(JsonCodec::<Point>::key(), ValueKind::Str, JsonCodec::<Point>::new());

        let ty = JsonCodec::<Point>::key();
        let encoded = chain
            .encode(Value::object(Point { x: 1, y: 2 }), ty, &Markers::none())
            .unwrap();
        assert_eq!(encoded, Value::from(r#"{"x":1,"y":2}"#));

        let decoded = chain.decode(encoded, ty, &Markers::none()).unwrap();
        let point = decoded.as_object().and_then(|o| o.downcast_ref::<Point>()).cloned();
        assert_eq!(point, Some(Point { x: 1, y: 2 }));
    }

    #[test]
    fn test_gate_requires_marker() {
        let json = Marker::new("json");
        let codec = JsonCodec::<Point>::gated(json);
        let value = Value::object(Point { x: 0, y: 0 });
        let ty = JsonCodec::<Point>::key();

        assert!(!codec.handle_encode(&value, ty, &Markers::none()));
        assert!(codec.handle_encode(&value, ty, &json.into()));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let codec = JsonCodec::<Point>::new();
        let result = codec.decode(Value::from("{"), JsonCodec::<Point>::key());
        assert!(result.is_err());
    }
}
