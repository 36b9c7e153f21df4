//! Stub side of an interface: envelope in, method call, envelope out.

use super::{Args, CallEnvelope, InterfaceType, MethodEntry};
use crate::call::{CallRef, CallStub};
use crate::codec::CodecChain;
use crate::error::{BridgeError, Result};
use crate::transport::Endpoint;
use crate::value::{Bundle, LocalObject};
use std::sync::Arc;
use tracing::debug;

/// Build a call handle serving `object` through `itype`'s dispatch table.
pub(crate) fn build_stub(
    endpoint: &Endpoint,
    codecs: Arc<CodecChain>,
    itype: Arc<InterfaceType>,
    object: LocalObject,
) -> CallRef {
    let label = format!("interface {}", itype.name());
    CallStub::new(endpoint, label, move |params| {
        dispatch(&codecs, &itype, &object, params)
    })
    .into_ref()
}

fn dispatch(
    codecs: &CodecChain,
    itype: &InterfaceType,
    object: &LocalObject,
    params: Bundle,
) -> Result<Bundle> {
    let envelope = CallEnvelope::from_bundle(&params)?;
    let label = format!("{}.{}", itype.name(), envelope.method);

    let Some(method) = itype.method(&envelope.method) else {
        return Err(BridgeError::invocation(
            label,
            BridgeError::not_found("method", envelope.method.as_str()),
        ));
    };

    debug!("Stub dispatch {} with {} arg(s)", label, envelope.args.len());
    let reply = run(codecs, &method, object, &envelope)
        .map_err(|e| BridgeError::invocation(label, e))?;
    Ok(reply.into_bundle())
}

fn run(
    codecs: &CodecChain,
    method: &MethodEntry,
    object: &LocalObject,
    envelope: &CallEnvelope,
) -> Result<CallEnvelope> {
    if envelope.args.len() != method.params.len() {
        return Err(BridgeError::invalid_argument(
            "args",
            format!(
                "expected {} argument(s), got {}",
                method.params.len(),
                envelope.args.len()
            ),
        ));
    }

    let mut decoded = Vec::with_capacity(method.params.len());
    for (value, param) in envelope.args.iter().zip(&method.params) {
        decoded.push(codecs.decode(value.clone(), param.ty, &param.markers)?);
    }

    let result = method.dispatch(object, Args::new(decoded))?;

    if method.returns.is_unit() {
        return Ok(envelope.reply(None));
    }
    let encoded = codecs.encode(result, method.returns.ty, &method.returns.markers)?;
    Ok(envelope.reply(Some(encoded)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TypeRegistry;
    use crate::error::ErrorKind;
    use crate::interface::testing::{Calc, LocalCalc};
    use crate::value::Value;
    use std::sync::atomic::Ordering;

    fn calc_stub(calc: Arc<dyn Calc>) -> (Endpoint, CallRef) {
        let endpoint = Endpoint::new("server");
        let types = Arc::new(TypeRegistry::new());
        let itype = types.register_interface::<dyn Calc>();
        let codecs = Arc::new(CodecChain::new(types));
        let stub = build_stub(&endpoint, codecs, itype, LocalObject::shared(calc));
        (endpoint, stub)
    }

    fn send(stub: &CallRef, method: &str, args: Vec<Value>) -> Result<CallEnvelope> {
        let envelope = CallEnvelope::call(None, "test.Calc", method, args);
        let reply = stub.on_call(envelope.into_bundle())?;
        CallEnvelope::from_bundle(&reply)
    }

    #[test]
    fn test_dispatch_returns_single_value() {
        let (_ep, stub) = calc_stub(Arc::new(LocalCalc::default()));
        let reply = send(&stub, "add", vec![Value::from(2i64), Value::from(3i64)]).unwrap();
        assert_eq!(reply.method, "add");
        assert_eq!(reply.into_result(), Some(Value::Int(5)));
    }

    #[test]
    fn test_unit_return_has_empty_result_slot() {
        let calc = Arc::new(LocalCalc::default());
        let (_ep, stub) = calc_stub(calc.clone());
        let reply = send(&stub, "reset", vec![]).unwrap();
        assert!(reply.args.is_empty());
        assert_eq!(calc.resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_method_is_invocation_failure() {
        let (_ep, stub) = calc_stub(Arc::new(LocalCalc::default()));
        let err = send(&stub, "mul", vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteInvocation);
        assert_eq!(err.root_kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_argument_count_must_match() {
        let (_ep, stub) = calc_stub(Arc::new(LocalCalc::default()));
        let err = send(&stub, "add", vec![Value::from(1i64)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteInvocation);
        assert_eq!(err.root_kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_method_error_carries_cause_chain() {
        let (_ep, stub) = calc_stub(Arc::new(LocalCalc::default()));
        let err = send(&stub, "div", vec![Value::from(1i64), Value::from(0i64)]).unwrap_err();
        assert_eq!(
            err.chain(),
            "Remote invocation failed: test.Calc.div: Invalid argument b: zero"
        );
    }

    #[test]
    fn test_dead_stub_fails_with_transport() {
        let (endpoint, stub) = calc_stub(Arc::new(LocalCalc::default()));
        endpoint.kill();
        let err = send(&stub, "add", vec![Value::from(1i64), Value::from(1i64)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
