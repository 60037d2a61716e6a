pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agentsmsctl")]
#[command(about = "Operational CLI for the agentsms service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run pending database migrations
    Migrate,
    /// Start the orchestrator, event processor, task processor and dispatcher
    /// pollers alongside the operational HTTP surface
    Serve,
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Migrate => commands::migrate::handle_migrate_command(),
        Commands::Serve => commands::serve::handle_serve_command().await,
    }
}
