//! Interfaces shared by the unit tests of this module tree.

use super::{InterfaceProxy, Method, Param, Remote, RemoteInterface};
use crate::error::{BridgeError, Result};
use crate::transport::Binder;
use crate::value::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

pub trait Calc: Remote {
    fn add(&self, a: i64, b: i64) -> Result<i64>;
    fn div(&self, a: i64, b: i64) -> Result<i64>;
    fn reset(&self) -> Result<()>;
}

impl RemoteInterface for dyn Calc {
    const NAME: &'static str = "test.Calc";

    fn methods() -> Vec<Method<Self>> {
        vec![
            Method::new(
                "add",
                vec![Param::of::<i64>(), Param::of::<i64>()],
                Param::of::<i64>(),
                |calc, args| Ok(calc.add(args.get(0)?, args.get(1)?)?.into()),
            ),
            Method::new(
                "div",
                vec![Param::of::<i64>(), Param::of::<i64>()],
                Param::of::<i64>(),
                |calc, args| Ok(calc.div(args.get(0)?, args.get(1)?)?.into()),
            ),
            Method::new("reset", vec![], Param::unit(), |calc, _| {
                calc.reset()?;
                Ok(Value::Null)
            }),
        ]
    }

    fn proxy(proxy: InterfaceProxy) -> Arc<Self> {
        Arc::new(CalcProxy(proxy))
    }
}

pub struct CalcProxy(pub InterfaceProxy);

impl Remote for CalcProxy {
    fn remote_handle(&self) -> Option<Binder> {
        Some(self.0.as_binder())
    }
}

impl Calc for CalcProxy {
    fn add(&self, a: i64, b: i64) -> Result<i64> {
        self.0.call("add", vec![a.into(), b.into()])
    }

    fn div(&self, a: i64, b: i64) -> Result<i64> {
        self.0.call("div", vec![a.into(), b.into()])
    }

    fn reset(&self) -> Result<()> {
        self.0.call("reset", vec![])
    }
}

#[derive(Default)]
pub struct LocalCalc {
    pub resets: AtomicI64,
}

impl Remote for LocalCalc {}

impl Calc for LocalCalc {
    fn add(&self, a: i64, b: i64) -> Result<i64> {
        Ok(a + b)
    }

    fn div(&self, a: i64, b: i64) -> Result<i64> {
        if b == 0 {
            return Err(BridgeError::invalid_argument("b", "zero"));
        }
        Ok(a / b)
    }

    fn reset(&self) -> Result<()> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Receives notes; passed as an argument to [`Board`].
pub trait Listener: Remote {
    fn note(&self, text: String) -> Result<()>;
}

impl RemoteInterface for dyn Listener {
    const NAME: &'static str = "test.Listener";

    fn methods() -> Vec<Method<Self>> {
        vec![Method::new(
            "note",
            vec![Param::of::<String>()],
            Param::unit(),
            |listener, args| {
                listener.note(args.get(0)?)?;
                Ok(Value::Null)
            },
        )]
    }

    fn proxy(proxy: InterfaceProxy) -> Arc<Self> {
        Arc::new(ListenerProxy(proxy))
    }
}

pub struct ListenerProxy(pub InterfaceProxy);

impl Remote for ListenerProxy {
    fn remote_handle(&self) -> Option<Binder> {
        Some(self.0.as_binder())
    }
}

impl Listener for ListenerProxy {
    fn note(&self, text: String) -> Result<()> {
        self.0.call("note", vec![text.into()])
    }
}

#[derive(Default)]
pub struct Recorder {
    pub notes: Mutex<Vec<String>>,
}

impl Remote for Recorder {}

impl Listener for Recorder {
    fn note(&self, text: String) -> Result<()> {
        self.notes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(text);
        Ok(())
    }
}

/// Takes a listener argument and hands back a calculator.
pub trait Board: Remote {
    fn post(&self, listener: Arc<dyn Listener>, text: String) -> Result<()>;
    fn calc(&self) -> Result<Option<Arc<dyn Calc>>>;
}

impl RemoteInterface for dyn Board {
    const NAME: &'static str = "test.Board";

    fn methods() -> Vec<Method<Self>> {
        vec![
            Method::new(
                "post",
                vec![Param::of::<dyn Listener>(), Param::of::<String>()],
                Param::unit(),
                |board, args| {
                    let listener = args.interface::<dyn Listener>(0)?.ok_or_else(|| {
                        BridgeError::invalid_argument("listener", "must not be null")
                    })?;
                    board.post(listener, args.get(1)?)?;
                    Ok(Value::Null)
                },
            ),
            Method::new("calc", vec![], Param::of::<dyn Calc>(), |board, _| {
                Ok(board.calc()?.map(Value::shared).unwrap_or(Value::Null))
            }),
        ]
    }

    fn proxy(proxy: InterfaceProxy) -> Arc<Self> {
        Arc::new(BoardProxy(proxy))
    }
}

pub struct BoardProxy(pub InterfaceProxy);

impl Remote for BoardProxy {
    fn remote_handle(&self) -> Option<Binder> {
        Some(self.0.as_binder())
    }
}

impl Board for BoardProxy {
    fn post(&self, listener: Arc<dyn Listener>, text: String) -> Result<()> {
        self.0.call("post", vec![Value::shared(listener), text.into()])
    }

    fn calc(&self) -> Result<Option<Arc<dyn Calc>>> {
        self.0.call_interface::<dyn Calc>("calc", vec![])
    }
}

pub struct LocalBoard {
    pub calc: Arc<dyn Calc>,
}

impl Remote for LocalBoard {}

impl Board for LocalBoard {
    fn post(&self, listener: Arc<dyn Listener>, text: String) -> Result<()> {
        listener.note(format!("posted: {}", text))
    }

    fn calc(&self) -> Result<Option<Arc<dyn Calc>>> {
        Ok(Some(self.calc.clone()))
    }
}
