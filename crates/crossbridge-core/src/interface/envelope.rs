//! Call envelope carried through interface call handles.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::value::{Bundle, Value};

/// Method name plus ordered arguments.
///
/// Replies reuse the same shape with the return value as the only argument,
/// or no argument at all for methods that return nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct CallEnvelope {
    pub interface_name: Option<String>,
    pub interface_type: Option<String>,
    pub method: String,
    pub args: Vec<Value>,
}

impl CallEnvelope {
    pub fn call(
        interface_name: Option<String>,
        interface_type: &str,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            interface_name,
            interface_type: Some(interface_type.to_string()),
            method: method.into(),
            args,
        }
    }

    /// Build the reply to this call.
    pub fn reply(&self, result: Option<Value>) -> Self {
        Self {
            interface_name: self.interface_name.clone(),
            interface_type: self.interface_type.clone(),
            method: self.method.clone(),
            args: result.into_iter().collect(),
        }
    }

    /// The single returned value, if any.
    pub fn into_result(self) -> Option<Value> {
        let mut args = self.args;
        if args.len() == 1 {
            args.pop()
        } else {
            None
        }
    }

    pub fn into_bundle(self) -> Bundle {
        let mut info = Bundle::new()
            .with(BridgeConfig::ENVELOPE_METHOD_KEY, self.method)
            .with(BridgeConfig::ENVELOPE_ARGS_KEY, self.args);
        if let Some(name) = self.interface_name {
            info.put(BridgeConfig::ENVELOPE_INTERFACE_NAME_KEY, name);
        }
        if let Some(ty) = self.interface_type {
            info.put(BridgeConfig::ENVELOPE_INTERFACE_TYPE_KEY, ty);
        }
        Bundle::new().with(BridgeConfig::CALL_INFO_KEY, info)
    }

    pub fn from_bundle(bundle: &Bundle) -> Result<Self> {
        let info = bundle.get_bundle(BridgeConfig::CALL_INFO_KEY).ok_or_else(|| {
            BridgeError::invalid_argument(BridgeConfig::CALL_INFO_KEY, "missing call envelope")
        })?;

        let method = info
            .get_str(BridgeConfig::ENVELOPE_METHOD_KEY)
            .ok_or_else(|| {
                BridgeError::invalid_argument(BridgeConfig::ENVELOPE_METHOD_KEY, "missing method name")
            })?
            .to_string();

        let args = match info.get(BridgeConfig::ENVELOPE_ARGS_KEY) {
            Some(Value::List(items)) => items.clone(),
            None | Some(Value::Null) => Vec::new(),
            Some(other) => {
                return Err(BridgeError::invalid_argument(
                    BridgeConfig::ENVELOPE_ARGS_KEY,
                    format!("expected a list, got {:?}", other.kind()),
                ))
            }
        };

        Ok(Self {
            interface_name: info
                .get_str(BridgeConfig::ENVELOPE_INTERFACE_NAME_KEY)
                .map(str::to_string),
            interface_type: info
                .get_str(BridgeConfig::ENVELOPE_INTERFACE_TYPE_KEY)
                .map(str::to_string),
            method,
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_through_bundle() {
        let call = CallEnvelope::call(
            Some("calc".to_string()),
            "demo.Calc",
            "add",
            vec![Value::from(2), Value::from(3)],
        );
        let bundle = call.clone().into_bundle();
        assert!(bundle.contains_key(BridgeConfig::CALL_INFO_KEY));

        let parsed = CallEnvelope::from_bundle(&bundle).unwrap();
        assert_eq!(parsed, call);
    }

    #[test]
    fn test_reply_carries_single_result() {
        let call = CallEnvelope::call(None, "demo.Calc", "add", vec![Value::from(2)]);
        let reply = call.reply(Some(Value::from(5)));
        assert_eq!(reply.method, "add");
        assert_eq!(reply.into_result(), Some(Value::from(5)));

        let empty = call.reply(None);
        assert!(empty.args.is_empty());
        assert_eq!(empty.into_result(), None);
    }

    #[test]
    fn test_missing_envelope_is_invalid() {
        let err = CallEnvelope::from_bundle(&Bundle::new()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);

        let no_method = Bundle::new().with(BridgeConfig::CALL_INFO_KEY, Bundle::new());
        assert!(CallEnvelope::from_bundle(&no_method).is_err());
    }
}
