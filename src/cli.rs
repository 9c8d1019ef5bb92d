use clap::{Parser, Subcommand};

use crate::commands::{capture, interrupt, kill, open, rename, run, send};

#[derive(Parser)]
#[command(name = "muxbridge")]
#[command(about = "Bridge chat control channels to AI assistants running in tmux")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List multiplexer sessions visible to the bridge
    Sessions,

    /// Create a multiplexer session
    Open(open::Args),

    /// Capture a session's screen and classify assistant activity
    Capture(capture::Args),

    /// Run a one-shot shell command with timeout and output budgeting
    Run(run::Args),

    /// Send a prompt to an assistant session and live-watch until it settles
    Send(send::Args),

    /// Send Ctrl-C to a session
    Interrupt(interrupt::Args),

    /// Rename a multiplexer session
    Rename(rename::Args),

    /// Kill a multiplexer session
    Kill(kill::Args),
}
