//! Built-in codec passing interfaces as call handles.

use super::{Decoder, Encoder, Markers, TypeKey};
use crate::error::{BridgeError, Result};
use crate::interface::InterfaceEngine;
use crate::value::Value;
use std::sync::{Arc, Weak};

/// Encodes interface objects as stubs and decodes call handles as proxies.
///
/// Applies to types registered as remote interfaces, or to registered
/// interfaces whose parameter carries [`super::Marker::REMOTE`].
pub struct RemoteInterfaceCodec {
    engine: Weak<InterfaceEngine>,
}

impl RemoteInterfaceCodec {
    pub(crate) fn new(engine: Weak<InterfaceEngine>) -> Self {
        Self { engine }
    }

    fn engine(&self) -> Result<Arc<InterfaceEngine>> {
        self.engine
            .upgrade()
            .ok_or_else(|| BridgeError::codec("interface engine has shut down"))
    }

    fn applies(&self, ty: TypeKey, markers: &Markers) -> bool {
        self.engine
            .upgrade()
            .is_some_and(|engine| engine.types().is_remote_interface(ty, markers))
    }
}

impl Encoder for RemoteInterfaceCodec {
    fn handle_encode(&self, value: &Value, ty: TypeKey, markers: &Markers) -> bool {
        matches!(value, Value::Object(_)) && self.applies(ty, markers)
    }

    fn encode(&self, value: Value, ty: TypeKey) -> Result<Value> {
        let engine = self.engine()?;
        let itype = engine
            .types()
            .interface(ty)
            .ok_or_else(|| BridgeError::codec(format!("{} is not a registered interface", ty)))?;
        let Value::Object(object) = value else {
            return Err(BridgeError::codec(format!("{} value is not a local object", ty)));
        };
        Ok(Value::Call(engine.stub_for(&object, &itype)?))
    }
}

impl Decoder for RemoteInterfaceCodec {
    fn handle_decode(&self, _value: &Value, ty: TypeKey, markers: &Markers) -> bool {
        self.applies(ty, markers)
    }

    fn decode(&self, value: Value, ty: TypeKey) -> Result<Value> {
        let engine = self.engine()?;
        let itype = engine
            .types()
            .interface(ty)
            .ok_or_else(|| BridgeError::codec(format!("{} is not a registered interface", ty)))?;
        let Value::Call(call) = value else {
            return Err(BridgeError::codec(format!("{} value is not a call handle", ty)));
        };
        Ok(Value::Object(engine.proxy_for(&itype, call, None)?))
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::{Markers, TypeKey};
    use crate::interface::testing::{Board, Calc, Listener, LocalBoard, LocalCalc, Recorder};
    use crate::interface::InterfaceEngine;
    use crate::transport::Endpoint;
    use crate::value::{Value, ValueKind};
    use std::sync::{Arc, PoisonError};

    fn engine(name: &str) -> Arc<InterfaceEngine> {
        let engine = InterfaceEngine::new(Endpoint::new(name));
        engine.types().register_interface::<dyn Calc>();
        engine.types().register_interface::<dyn Listener>();
        engine.types().register_interface::<dyn Board>();
        engine
    }

    #[test]
    fn test_unregistered_interface_passes_through() {
        let engine = InterfaceEngine::new(Endpoint::new("a"));
        let calc: Arc<dyn Calc> = Arc::new(LocalCalc::default());
        let encoded = engine
            .codecs()
            .encode(Value::shared(calc), TypeKey::of::<dyn Calc>(), &Markers::none())
            .unwrap();
        assert_eq!(encoded.kind(), ValueKind::Object);
    }

    #[test]
    fn test_registered_interface_becomes_call() {
        let engine = engine("a");
        let calc: Arc<dyn Calc> = Arc::new(LocalCalc::default());
        let encoded = engine
            .codecs()
            .encode(Value::shared(calc), TypeKey::of::<dyn Calc>(), &Markers::none())
            .unwrap();
        assert_eq!(encoded.kind(), ValueKind::Call);

        let decoded = engine
            .codecs()
            .decode(encoded, TypeKey::of::<dyn Calc>(), &Markers::none())
            .unwrap();
        let proxy = decoded.as_object().and_then(|o| o.shared_ref::<dyn Calc>()).unwrap();
        assert_eq!(proxy.add(20, 22).unwrap(), 42);
    }

    #[test]
    fn test_interfaces_as_arguments_and_returns() {
        let server = engine("server");
        let client = engine("client");

        let board: Arc<dyn Board> = Arc::new(LocalBoard {
            calc: Arc::new(LocalCalc::default()),
        });
        let stub = server.build_stub(board).unwrap();
        let remote_board = client.build_proxy::<dyn Board>(stub).unwrap();

        let recorder = Arc::new(Recorder::default());
        remote_board.post(recorder.clone(), "hi".to_string()).unwrap();
        let notes = recorder.notes.lock().unwrap_or_else(PoisonError::into_inner).clone();
        assert_eq!(notes, vec!["posted: hi".to_string()]);

        let first = remote_board.calc().unwrap().unwrap();
        let second = remote_board.calc().unwrap().unwrap();
        assert_eq!(first.add(2, 3).unwrap(), 5);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
