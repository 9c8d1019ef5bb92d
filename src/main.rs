use anyhow::Result;
use clap::Parser;

mod bridge;
mod chat;
mod cli;
mod commands;
mod config;
mod delivery;
mod engine;
mod error;
mod exec;
mod models;
mod notify;
mod registry;
mod screen;
mod utils;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sessions => commands::sessions::execute().await,
        Commands::Open(args) => commands::open::execute(args).await,
        Commands::Capture(args) => commands::capture::execute(args).await,
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Send(args) => commands::send::execute(args).await,
        Commands::Interrupt(args) => commands::interrupt::execute(args).await,
        Commands::Rename(args) => commands::rename::execute(args).await,
        Commands::Kill(args) => commands::kill::execute(args).await,
    }
}
