//! Command-line surface of `scene-labeler`.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use vision::TelemetryOptions;

use crate::scenario::{Scenario, frame_interval};

#[derive(Debug, Parser)]
#[command(
    name = "scene-labeler",
    version,
    about = "Anchor classifier labels in a simulated scene and place objects on them"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a labelling session against a scripted scene.
    Simulate(SimulateArgs),
    /// Write the billboard texture for a label to a PNG file.
    RenderLabel(RenderLabelArgs),
}

/// CLI arguments accepted by the `simulate` subcommand.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// JSON scenario file; the built-in demo scene is used otherwise.
    #[arg(long = "scenario", value_name = "PATH")]
    pub scenario: Option<PathBuf>,
    /// Render ticks to run (overrides the scenario).
    #[arg(long = "ticks", value_name = "N")]
    pub ticks: Option<u64>,
    /// Render tick rate (overrides the scenario).
    #[arg(long = "fps", value_name = "FPS")]
    pub fps: Option<f32>,
    /// Emit Chrome trace JSON for post-mortem analysis.
    #[arg(long = "chrome-trace", value_name = "PATH")]
    pub chrome_trace: Option<PathBuf>,
    /// Log as JSON lines.
    #[arg(long = "json-logs", action = clap::ArgAction::SetTrue)]
    pub json_logs: bool,
    /// Print Prometheus metrics after the run.
    #[arg(long = "metrics", action = clap::ArgAction::SetTrue)]
    pub metrics: bool,
    /// Also write the final session snapshot to this file.
    #[arg(long = "snapshot", value_name = "PATH")]
    pub snapshot: Option<PathBuf>,
    /// TorchScript classifier replacing the scripted one.
    #[cfg(feature = "with-tch")]
    #[arg(long = "model", value_name = "PATH", requires = "labels")]
    pub model: Option<PathBuf>,
    /// Newline-separated label file for `--model`.
    #[cfg(feature = "with-tch")]
    #[arg(long = "labels", value_name = "PATH", requires = "model")]
    pub labels: Option<PathBuf>,
    /// Run the TorchScript classifier on the CPU even when CUDA is available.
    #[cfg(feature = "with-tch")]
    #[arg(long = "cpu", action = clap::ArgAction::SetTrue)]
    pub use_cpu: bool,
}

#[derive(Debug, Args)]
pub struct RenderLabelArgs {
    #[arg(value_name = "TEXT")]
    pub text: String,
    #[arg(value_name = "OUT_PNG")]
    pub output: PathBuf,
}

#[cfg(feature = "with-tch")]
#[derive(Clone, Debug)]
pub struct TorchModel {
    pub model: PathBuf,
    pub labels: PathBuf,
    pub use_cpu: bool,
}

#[derive(Clone, Debug)]
/// Fully resolved configuration of a `simulate` run.
pub struct SimulationConfig {
    pub scenario: Scenario,
    pub telemetry: TelemetryOptions,
    pub print_metrics: bool,
    pub snapshot_path: Option<PathBuf>,
    #[cfg(feature = "with-tch")]
    pub torch: Option<TorchModel>,
}

impl TryFrom<SimulateArgs> for SimulationConfig {
    type Error = anyhow::Error;

    fn try_from(args: SimulateArgs) -> Result<Self> {
        let mut scenario = match args.scenario.as_deref() {
            Some(path) => Scenario::load(path)?,
            None => Scenario::default(),
        };
        if let Some(ticks) = args.ticks {
            if ticks == 0 {
                bail!("--ticks must be a positive integer");
            }
            scenario.ticks = ticks;
        }
        if let Some(fps) = args.fps {
            if frame_interval(fps).is_none() {
                bail!("--fps must be a positive rate, got {fps}");
            }
            scenario.fps = fps;
        }

        #[cfg(feature = "with-tch")]
        let torch = match (args.model, args.labels) {
            (Some(model), Some(labels)) => Some(TorchModel {
                model,
                labels,
                use_cpu: args.use_cpu,
            }),
            (None, None) => None,
            _ => bail!("--model and --labels must be given together"),
        };

        Ok(Self {
            scenario,
            telemetry: TelemetryOptions {
                chrome_trace_path: args.chrome_trace,
                json_logs: args.json_logs,
            },
            print_metrics: args.metrics,
            snapshot_path: args.snapshot,
            #[cfg(feature = "with-tch")]
            torch,
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("scene-labeler").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    fn simulate_config(args: &[&str]) -> Result<SimulationConfig> {
        let mut full = vec!["simulate"];
        full.extend_from_slice(args);
        match parse(&full).command {
            Command::Simulate(args) => SimulationConfig::try_from(args),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_apply_on_top_of_the_default_scenario() {
        let config = simulate_config(&["--ticks", "12", "--fps", "30", "--json-logs", "--metrics"])
            .expect("config");
        assert_eq!(config.scenario.ticks, 12);
        assert_eq!(config.scenario.fps, 30.0);
        assert!(config.telemetry.json_logs);
        assert!(config.print_metrics);
        assert!(config.snapshot_path.is_none());
    }

    #[test]
    fn non_positive_rates_are_rejected() {
        assert!(simulate_config(&["--ticks", "0"]).is_err());
        assert!(simulate_config(&["--fps", "0"]).is_err());
        assert!(simulate_config(&["--fps", "1e-39"]).is_err());
        assert!(simulate_config(&["--fps", "NaN"]).is_err());
    }

    #[test]
    fn render_label_takes_text_and_output() {
        let Command::RenderLabel(args) = parse(&["render-label", "cup", "cup.png"]).command else {
            panic!("expected render-label");
        };
        assert_eq!(args.text, "cup");
        assert_eq!(args.output, PathBuf::from("cup.png"));
    }
}
