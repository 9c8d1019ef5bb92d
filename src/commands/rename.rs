use anyhow::Result;
use clap::Args as ClapArgs;

use crate::bridge::{validate_session_name, Multiplexer, TmuxBridge};
use crate::error::BridgeError;

#[derive(ClapArgs)]
pub struct Args {
    /// Current session name
    pub old: String,

    /// New session name
    pub new: String,
}

pub async fn execute(args: Args) -> Result<()> {
    validate_session_name(&args.old)?;
    validate_session_name(&args.new)?;

    let bridge = TmuxBridge::new();
    if !bridge.rename_session(&args.old, &args.new).await {
        return Err(BridgeError::Unavailable(args.old).into());
    }

    println!("Renamed {} to {}", args.old, args.new);
    Ok(())
}
