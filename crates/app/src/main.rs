mod cli;
mod label;
mod scenario;
mod simulate;

use clap::Parser;
use vision::{TelemetryOptions, telemetry};

use crate::cli::{Cli, Command, SimulationConfig};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Simulate(args) => simulate::run(SimulationConfig::try_from(args)?),
        Command::RenderLabel(args) => {
            let _telemetry_guard = telemetry::enter_runtime(&TelemetryOptions::default());
            label::run(args)
        }
    }
}
