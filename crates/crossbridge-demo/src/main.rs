//! Crossbridge demo - two simulated processes calling each other.
//!
//! Wires a server and a client process together through a shared locator on
//! one host and runs the bridge scenarios with logging enabled.

mod calc;
mod scenarios;

use anyhow::Result;
use clap::Parser;
use scenarios::{Demo, Scenario};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "crossbridge-demo")]
#[command(about = "Run cross-process bridge scenarios between two simulated processes")]
struct Args {
    /// Scenario to run (runs all when omitted)
    #[arg(short, long, value_enum)]
    scenario: Option<Scenario>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print the server's forwarding records as JSON after each scenario
    #[arg(long)]
    records: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let selected = match args.scenario {
        Some(scenario) => vec![scenario],
        None => Scenario::ALL.to_vec(),
    };

    for scenario in selected {
        info!("Running scenario '{}'", scenario);
        let demo = Demo::new()?;
        for line in demo.run(scenario)? {
            println!("[{}] {}", scenario, line);
        }

        if args.records {
            let records = demo.server.registry().forwarding_records();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}
