//! Checkers CLI - Command-line interface
//!
//! Commands:
//! - selfplay: Play MCTS against itself or a random mover
//! - harness: Play one game over a stdin/stdout line protocol

mod harness;
mod selfplay;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use checkers_core::BoardConfig;
use checkers_mcts::MctsConfig;

#[derive(Parser)]
#[command(name = "checkers")]
#[command(about = "Monte Carlo tree search checkers player")]
struct Cli {
    /// Random seed for reproducibility
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a series of games and report the score
    Selfplay(selfplay::SelfplayArgs),
    /// Play one game against moves read from stdin
    Harness(harness::HarnessArgs),
}

/// Board and engine options shared by every command
#[derive(Args, Clone, Debug)]
pub struct EngineArgs {
    /// Board width
    #[arg(long, default_value = "8")]
    pub cols: u8,

    /// Board height
    #[arg(long, default_value = "8")]
    pub rows: u8,

    /// Rows filled by each side at the start
    #[arg(long, default_value = "3")]
    pub piece_rows: u8,

    /// MCTS configuration JSON file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Iteration cap per move
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Search time cap per move
    #[arg(long)]
    pub move_time_ms: Option<u64>,
}

impl EngineArgs {
    pub fn board_config(&self) -> Result<BoardConfig> {
        BoardConfig::new(self.cols, self.rows, self.piece_rows).context("Invalid board dimensions")
    }

    /// Config file (or defaults) with command-line overrides applied
    pub fn mcts_config(&self, seed: Option<u64>) -> Result<MctsConfig> {
        let mut config = match &self.config {
            Some(path) => MctsConfig::load(path)
                .with_context(|| format!("Failed to load MCTS config: {}", path.display()))?,
            None => MctsConfig::default(),
        };
        if let Some(iterations) = self.iterations {
            config.iterations = Some(iterations);
        }
        if let Some(ms) = self.move_time_ms {
            config.move_time_ms = ms;
        }
        if seed.is_some() {
            config.seed = seed;
        }
        config.validate().context("Invalid MCTS config")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries results and protocol replies
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Selfplay(args) => selfplay::run(args, cli.seed),
        Commands::Harness(args) => harness::run(args, cli.seed),
    }
}
