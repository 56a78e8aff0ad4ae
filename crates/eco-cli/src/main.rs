//! Headless runner for the ecosystem simulation.

mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eco_core::SimulationConfig;
use eco_world::{Simulation, WorldExport};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "eco-cli")]
#[command(about = "Ecosphere simulation CLI")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a batch of ticks and print a summary
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        ticks: Option<u64>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        delta: Option<f32>,
        /// Continue from a previous export instead of spawning founders
        #[arg(long)]
        restore: Option<PathBuf>,
        /// Write the final world here
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Print the default configuration as JSON
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_telemetry(cli.json_logs)?;

    match cli.command {
        Commands::Run {
            config,
            ticks,
            seed,
            delta,
            restore,
            export,
        } => {
            let mut sim_config = load_config(config.as_deref())?;
            apply_overrides(&mut sim_config, ticks, seed, delta);

            let mut sim = match restore {
                Some(path) => {
                    let text = fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    Simulation::restore(sim_config, WorldExport::from_json(&text)?)?
                }
                None => Simulation::new(sim_config)?,
            };

            let summary = sim.run()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if let Some(path) = export {
                fs::write(&path, sim.export().to_json()?)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!("World exported to {}", path.display());
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&SimulationConfig::default())?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    match path {
        Some(path) => {
            let text =
                fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            Ok(SimulationConfig::from_json(&text)?)
        }
        None => Ok(SimulationConfig::default()),
    }
}

fn apply_overrides(
    config: &mut SimulationConfig,
    ticks: Option<u64>,
    seed: Option<u64>,
    delta: Option<f32>,
) {
    if let Some(ticks) = ticks {
        config.num_ticks = ticks;
    }
    if let Some(seed) = seed {
        config.seed = seed;
    }
    if let Some(delta) = delta {
        config.tick_delta = delta;
    }
}
