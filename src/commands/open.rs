use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use std::path::PathBuf;

use crate::bridge::{validate_session_name, Multiplexer, TmuxBridge};

#[derive(ClapArgs)]
pub struct Args {
    /// Multiplexer session name
    pub session: String,

    /// Working directory for the new session (default: current directory)
    #[arg(long)]
    pub cwd: Option<PathBuf>,
}

pub async fn execute(args: Args) -> Result<()> {
    validate_session_name(&args.session)?;

    let bridge = TmuxBridge::new();
    if bridge.has_session(&args.session).await {
        println!("Session {} already exists.", args.session);
        return Ok(());
    }

    let cwd = match args.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };

    if !bridge.create_session(&args.session, Some(&cwd)).await {
        bail!("failed to create session {}", args.session);
    }

    match bridge.get_working_directory(&args.session).await {
        Some(dir) => println!("Created session {} in {}", args.session, dir.display()),
        None => println!("Created session {}", args.session),
    }

    Ok(())
}
