use anyhow::Result;
use clap::Args as ClapArgs;

use crate::bridge::{validate_session_name, Multiplexer, TmuxBridge, DEFAULT_CAPTURE_LINES};
use crate::error::BridgeError;
use crate::screen::parse_activity;

#[derive(ClapArgs)]
pub struct Args {
    /// Multiplexer session name
    pub session: String,

    /// Scrollback lines to include
    #[arg(long, default_value_t = DEFAULT_CAPTURE_LINES)]
    pub lines: usize,
}

pub async fn execute(args: Args) -> Result<()> {
    validate_session_name(&args.session)?;

    let bridge = TmuxBridge::new();
    if !bridge.has_session(&args.session).await {
        return Err(BridgeError::Unavailable(args.session).into());
    }

    let screen = bridge.capture_pane(&args.session, args.lines).await;
    let activity = parse_activity(&screen);

    println!("{}", screen);
    println!(
        "-- {} {} (thinking={} ready={} done={})",
        activity.status.symbol(),
        activity.status.description(),
        activity.thinking,
        activity.ready,
        activity.done
    );

    Ok(())
}
