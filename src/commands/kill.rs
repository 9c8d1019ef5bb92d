use anyhow::Result;
use clap::Args as ClapArgs;

use crate::bridge::{validate_session_name, Multiplexer, TmuxBridge};
use crate::error::BridgeError;

#[derive(ClapArgs)]
pub struct Args {
    /// Multiplexer session name
    pub session: String,
}

pub async fn execute(args: Args) -> Result<()> {
    validate_session_name(&args.session)?;

    let bridge = TmuxBridge::new();
    if !bridge.kill_session(&args.session).await {
        return Err(BridgeError::Unavailable(args.session).into());
    }

    println!("Killed session {}", args.session);
    Ok(())
}
