mod simulation;

use std::path::PathBuf;

use anyhow::{bail, Context};
use blackjack_lab_drivers::parse_config_from_file;
use clap::Parser;
use log::info;

const DEFAULT_CONFIG_PATH: &str = "~/.blackjack_lab.yml";

#[derive(Debug, Parser)]
#[command(author, about, long_about = None)]
struct CommandLineArgs {
    /// The path of the config file
    #[arg(short, long, default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    config: String,

    /// Overrides the number of rounds in the config file
    #[arg(short, long)]
    rounds: Option<u64>,

    /// Overrides the random seed in the config file
    #[arg(short, long)]
    seed: Option<u64>,
}

fn config_file_path(config: &str) -> anyhow::Result<PathBuf> {
    let path = match config.strip_prefix("~/") {
        Some(relative) => home::home_dir()
            .context("cannot find home directory")?
            .join(relative),
        None => PathBuf::from(config),
    };
    if !path.exists() {
        bail!("config file {} does not exist", path.display());
    }
    if path.is_dir() {
        bail!("{} should be a file rather than a directory", path.display());
    }
    Ok(path)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = CommandLineArgs::parse();

    let path = config_file_path(&args.config)?;
    let config = parse_config_from_file(&path)?;
    info!("loaded config from {}", path.display());

    let mut simulation_config = config.simulation_config()?;
    if let Some(rounds) = args.rounds {
        simulation_config.rounds = rounds;
    }
    if let Some(seed) = args.seed {
        simulation_config.seed = seed;
    }

    let result = simulation::simulate(simulation_config.clone())?;
    simulation::print_report(&simulation_config, &result);
    Ok(())
}
