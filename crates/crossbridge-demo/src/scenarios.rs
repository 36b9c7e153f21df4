//! Bridge scenarios run between a server and a client process.
//!
//! Each scenario starts from a fresh [`Demo`] and returns the observations it
//! made, one line each.

use crate::calc::{Calc, Calculator, Grid, Plotter, Point};
use anyhow::{bail, Result};
use crossbridge::{
    Bundle, CallEnvelope, CallStub, Callback, Category, InvokerRegistration, JsonCodec, Markers,
    ProcessBridge, RemoteInterface, ServiceRegistration, StaticLocator, Value,
};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

pub const SERVER: &str = "demo.server";
pub const CLIENT: &str = "demo.client";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    /// Message invoker with a callback into the caller
    Echo,
    /// Typed interface call and its wire envelope
    Calc,
    /// Codec registration changing the wire form of a plain type
    Codec,
    /// Service forwarded through another process's registry
    Forward,
    /// Forwarding record dropped when the registrant dies
    Death,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Echo,
        Scenario::Calc,
        Scenario::Codec,
        Scenario::Forward,
        Scenario::Death,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Echo => "echo",
            Scenario::Calc => "calc",
            Scenario::Codec => "codec",
            Scenario::Forward => "forward",
            Scenario::Death => "death",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two simulated processes sharing one locator.
pub struct Demo {
    pub locator: Arc<StaticLocator>,
    pub server: ProcessBridge,
    pub client: ProcessBridge,
}

impl Demo {
    pub fn new() -> Result<Self> {
        let locator = Arc::new(StaticLocator::new());
        let server = spawn(&locator, SERVER)?;
        let client = spawn(&locator, CLIENT)?;
        Ok(Self {
            locator,
            server,
            client,
        })
    }

    pub fn run(&self, scenario: Scenario) -> Result<Vec<String>> {
        match scenario {
            Scenario::Echo => self.echo(),
            Scenario::Calc => self.calc(),
            Scenario::Codec => self.codec(),
            Scenario::Forward => self.forward(),
            Scenario::Death => self.death(),
        }
    }

    fn echo(&self) -> Result<Vec<String>> {
        self.server.register_local_invoker(
            "echo",
            InvokerRegistration::instance(
                |method: &str,
                 params: Bundle,
                 callback: Option<Arc<dyn Callback>>|
                 -> crossbridge::Result<Bundle> {
                    debug!("echo invoked with method '{}'", method);
                    if let Some(callback) = callback {
                        callback.on_call(Bundle::new().with("ack", true))?;
                    }
                    Ok(params)
                },
            ),
        )?;

        let acks = Arc::new(AtomicUsize::new(0));
        let seen = acks.clone();
        let callback: Arc<dyn Callback> =
            Arc::new(move |params: Bundle| -> crossbridge::Result<Bundle> {
                if params.get_bool("ack") == Some(true) {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Bundle::new())
            });

        let reply = self.client.invoke(
            SERVER,
            "echo",
            "ping",
            Bundle::new().with("k", "v"),
            Some(callback),
        )?;

        Ok(vec![
            format!("reply k={}", reply.get_str("k").unwrap_or("<missing>")),
            format!("callback acks={}", acks.load(Ordering::SeqCst)),
        ])
    }

    fn calc(&self) -> Result<Vec<String>> {
        self.server
            .register_local_interface::<dyn Calc>("calc", Arc::new(Calculator))?;

        let calc = self.client.fetch_interface::<dyn Calc>(SERVER, "calc")?;
        let sum = calc.add(2, 3)?;
        let again = self.client.fetch_interface::<dyn Calc>(SERVER, "calc")?;

        // The same call written by hand against the stub.
        let stub = self.server.bridge().fetch_interface("calc")?;
        let envelope = CallEnvelope::call(
            Some("calc".to_string()),
            <dyn Calc as RemoteInterface>::NAME,
            "add",
            vec![Value::Int(2), Value::Int(3)],
        );
        let reply = stub.on_call(envelope.into_bundle())?;
        let raw = CallEnvelope::from_bundle(&reply)?
            .into_result()
            .and_then(|value| value.as_i64());

        let failure = match calc.div(1, 0) {
            Ok(value) => bail!("division by zero returned {}", value),
            Err(e) => e.chain(),
        };

        Ok(vec![
            format!("add(2, 3) = {}", sum),
            format!("envelope add [2, 3] -> {:?}", raw),
            format!("proxy reused: {}", Arc::ptr_eq(&calc, &again)),
            format!("div(1, 0) failed: {}", failure),
        ])
    }

    fn codec(&self) -> Result<Vec<String>> {
        self.server
            .register_local_interface::<dyn Plotter>("plotter", Arc::new(Grid))?;
        let plotter = self.client.fetch_interface::<dyn Plotter>(SERVER, "plotter")?;
        let point = Point { x: 3, y: -4 };

        let before = self.wire_form(&point)?;
        let norm_before = plotter.norm(point.clone())?;

        for process in [&self.server, &self.client] {
            process.append_json_codec::<Point>(None);
        }

        let after = self.wire_form(&point)?;
        let norm_after = plotter.norm(point)?;
        let current = self.client.fetch_interface::<dyn Plotter>(SERVER, "plotter")?;

        Ok(vec![
            format!("without codec: {} -> norm {}", before, norm_before),
            format!("with codec: {} -> norm {}", after, norm_after),
            format!("proxy unchanged: {}", Arc::ptr_eq(&plotter, &current)),
        ])
    }

    fn wire_form(&self, point: &Point) -> Result<String> {
        let encoded = self.client.engine().codecs().encode(
            Value::object(point.clone()),
            JsonCodec::<Point>::key(),
            &Markers::none(),
        )?;
        Ok(match encoded.as_str() {
            Some(text) => format!("Str({})", text),
            None => format!("{:?}", encoded.kind()),
        })
    }

    fn forward(&self) -> Result<Vec<String>> {
        let endpoint = self.client.endpoint().clone();
        self.client.register_service(
            SERVER,
            "clock",
            ServiceRegistration::factory(move || {
                let stub = CallStub::new(&endpoint, "clock", |params: Bundle| {
                    Ok(params.with("tick", 1i64))
                });
                Ok(stub.into_ref())
            }),
        )?;

        let observer = spawn(&self.locator, "demo.observer")?;
        let clock = observer.fetch_service(SERVER, "clock")?;
        let tick = clock.on_call(Bundle::new())?.get_i64("tick");

        let records = self.server.registry().forwarding_records();
        let origin = records
            .iter()
            .find(|record| record.name == "clock")
            .map(|record| record.caller_endpoint.clone())
            .unwrap_or_default();

        self.client.unregister_service(SERVER, "clock")?;
        let after = match self.server.fetch_service(SERVER, "clock") {
            Ok(_) => "still resolvable".to_string(),
            Err(e) => e.to_string(),
        };

        Ok(vec![
            format!("tick = {:?}", tick),
            format!("served by {}", origin),
            format!("after unregister: {}", after),
        ])
    }

    fn death(&self) -> Result<Vec<String>> {
        self.client
            .register_interface::<dyn Calc>(SERVER, "calc", Arc::new(Calculator))?;

        let calc = self.server.fetch_interface::<dyn Calc>(SERVER, "calc")?;
        let sum = calc.add(20, 22)?;
        let before = self.server.registry().has_forwarding(Category::Interface, "calc");

        self.client.shutdown();

        let after = self.server.registry().has_forwarding(Category::Interface, "calc");
        let lookup = match self.server.fetch_interface::<dyn Calc>(SERVER, "calc") {
            Ok(_) => "still resolvable".to_string(),
            Err(e) => e.to_string(),
        };

        Ok(vec![
            format!("add(20, 22) = {}", sum),
            format!("forwarding before shutdown: {}", before),
            format!("forwarding after shutdown: {}", after),
            format!("lookup after shutdown: {}", lookup),
        ])
    }
}

fn spawn(locator: &Arc<StaticLocator>, name: &str) -> Result<ProcessBridge> {
    let process = ProcessBridge::builder(name)
        .locator(locator.clone())
        .interface::<dyn Calc>()
        .interface::<dyn Plotter>()
        .build()?;
    locator.publish(name, process.bridge())?;
    Ok(process)
}
