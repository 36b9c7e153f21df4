//! Interfaces the demo processes expose to each other.

use crossbridge::{
    Binder, BridgeError, InterfaceProxy, Method, Param, Remote, RemoteInterface, Result, Value,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub trait Calc: Remote {
    fn add(&self, a: i64, b: i64) -> Result<i64>;
    fn div(&self, a: i64, b: i64) -> Result<i64>;
}

impl RemoteInterface for dyn Calc {
    const NAME: &'static str = "demo.Calc";

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
        ]
    }

    fn proxy(proxy: InterfaceProxy) -> Arc<Self> {
        Arc::new(CalcProxy(proxy))
    }
}

struct CalcProxy(InterfaceProxy);

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
}

/// Integer calculator served by the server process.
pub struct Calculator;

impl Remote for Calculator {}

impl Calc for Calculator {
    fn add(&self, a: i64, b: i64) -> Result<i64> {
        Ok(a + b)
    }

    fn div(&self, a: i64, b: i64) -> Result<i64> {
        if b == 0 {
            return Err(BridgeError::invalid_argument("b", "division by zero"));
        }
        Ok(a / b)
    }
}

/// Plain data carried either as a local object or, with a codec, as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

pub trait Plotter: Remote {
    /// Manhattan distance from the origin.
    fn norm(&self, point: Point) -> Result<i64>;
}

impl RemoteInterface for dyn Plotter {
    const NAME: &'static str = "demo.Plotter";

    fn methods() -> Vec<Method<Self>> {
        vec![Method::new(
            "norm",
            vec![Param::of::<Point>()],
            Param::of::<i64>(),
            |plotter, args| Ok(plotter.norm(args.object::<Point>(0)?)?.into()),
        )]
    }

    fn proxy(proxy: InterfaceProxy) -> Arc<Self> {
        Arc::new(PlotterProxy(proxy))
    }
}

struct PlotterProxy(InterfaceProxy);

impl Remote for PlotterProxy {
    fn remote_handle(&self) -> Option<Binder> {
        Some(self.0.as_binder())
    }
}

impl Plotter for PlotterProxy {
    fn norm(&self, point: Point) -> Result<i64> {
        self.0.call("norm", vec![Value::object(point)])
    }
}

pub struct Grid;

impl Remote for Grid {}

impl Plotter for Grid {
    fn norm(&self, point: Point) -> Result<i64> {
        Ok(point.x.abs() + point.y.abs())
    }
}
