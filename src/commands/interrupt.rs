use anyhow::Result;
use clap::Args as ClapArgs;

use crate::bridge::{validate_session_name, Multiplexer, TmuxBridge};
use crate::error::BridgeError;

#[derive(ClapArgs)]
pub struct Args {
    /// Multiplexer session name
    pub session: String,

    /// Also clear the session's scrollback after interrupting
    #[arg(long)]
    pub clear: bool,
}

pub async fn execute(args: Args) -> Result<()> {
    validate_session_name(&args.session)?;

    let bridge = TmuxBridge::new();
    if !bridge.send_interrupt(&args.session).await {
        return Err(BridgeError::Unavailable(args.session).into());
    }

    if args.clear {
        bridge.clear_scrollback(&args.session).await;
    }

    println!("Sent interrupt to {}", args.session);
    Ok(())
}
