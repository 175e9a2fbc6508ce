use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use swim_magnifier::{train_magnifier, tune_trade_off, MagnifierConfig};

#[derive(Parser, Debug)]
#[command(name = "swim-magnifier", about = "Train the swimmer-head zoom model")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train one zoom model with the configured trade-off.
    Train {
        /// JSON run configuration; built-in defaults when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Train one model per trade-off value and save the comparison table.
    TuneTradeOff {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<MagnifierConfig> {
    match path {
        Some(path) => MagnifierConfig::load_json(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(MagnifierConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("swim_magnifier=info")),
        )
        .init();

    match Cli::parse().command {
        Command::Train { config } => {
            let config = load_config(config)?;
            let result = train_magnifier(&config).context("training failed")?;
            info!(
                train_accuracy = result.train_accuracy,
                train_mae = result.train_mae,
                valid_accuracy = result.valid_accuracy,
                valid_mae = result.valid_mae,
                "run finished"
            );
        }
        Command::TuneTradeOff { config } => {
            let config = load_config(config)?;
            let table = tune_trade_off(&config).context("trade-off sweep failed")?;
            info!(path = %table.display(), "sweep finished");
        }
    }
    Ok(())
}
