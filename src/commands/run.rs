use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use std::path::PathBuf;

use crate::config::Config;
use crate::exec::CommandExecutor;
use crate::models::Session;

#[derive(ClapArgs)]
pub struct Args {
    /// Command line to execute (joined with spaces)
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Session key used for abort bookkeeping
    #[arg(long, default_value = "cli")]
    pub session: String,

    /// Working directory (default: current directory)
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Timeout in milliseconds (overrides config)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub async fn execute(args: Args) -> Result<()> {
    let mut config = Config::load(args.config)?;
    if let Some(timeout_ms) = args.timeout_ms {
        config.exec.timeout_ms = timeout_ms;
    }

    let cwd = match args.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };

    let executor = CommandExecutor::new(config.exec.clone());
    let session = Session::new(args.session, 0, cwd);
    let command = args.command.join(" ");

    let Some(result) = executor.run(&session, &command).await else {
        bail!("command was superseded before it finished");
    };

    if !result.output.is_empty() {
        println!("{}", result.output.trim_end_matches('\n'));
    }
    if result.truncated {
        eprintln!("(output truncated)");
    }
    if let Some(dir) = result.new_working_directory {
        eprintln!("(working directory now {})", dir.display());
    }
    if result.exit_code != 0 {
        eprintln!("(exit code {} after {}ms)", result.exit_code, result.duration_ms);
    }

    Ok(())
}
