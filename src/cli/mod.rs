//! CLI module for graphtx.
//!
//! Subcommands:
//! - `simulate`: Drain a JSON-lines file through the batch executor into the in-memory store
//! - `config`: Print the resolved configuration

mod config;
mod simulate;

use clap::{Parser, Subcommand};

pub use simulate::SimulateCommand;

/// graphtx - batched transactions over graph stores
#[derive(Parser)]
#[command(name = "graphtx")]
#[command(about = "Batched transactional execution on top of graph database clients")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a JSON-lines input through the batch executor against the in-memory store
    Simulate(SimulateCommand),

    /// Print the resolved configuration
    Config,
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> color_eyre::Result<()> {
        match self.command {
            Command::Simulate(ref cmd) => cmd.run().await,
            Command::Config => self.run_config(),
        }
    }
}
