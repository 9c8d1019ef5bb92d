use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::bridge::{validate_session_name, Multiplexer, TmuxBridge};
use crate::chat::{ConsoleMessenger, Messenger};
use crate::config::Config;
use crate::delivery::SafeDelivery;
use crate::engine::{RefreshEngine, RefreshRequest};
use crate::error::BridgeError;
use crate::registry::Registry;
use crate::utils::default_session_name;

#[derive(ClapArgs)]
pub struct Args {
    /// Prompt text for the assistant (joined with spaces)
    #[arg(required = true, trailing_var_arg = true)]
    pub prompt: Vec<String>,

    /// Target session (default: derived from the user id)
    #[arg(long)]
    pub session: Option<String>,

    /// User id to act as
    #[arg(long, default_value_t = 0)]
    pub user: i64,

    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub async fn execute(args: Args) -> Result<()> {
    let config = Config::load(args.config)?;
    let session = args
        .session
        .unwrap_or_else(|| default_session_name(&config.session_prefix, args.user));
    validate_session_name(&session)?;

    let mux: Arc<dyn Multiplexer> = Arc::new(TmuxBridge::new());
    if !mux.has_session(&session).await {
        return Err(BridgeError::Unavailable(session).into());
    }

    let registry = Arc::new(Registry::new());
    let _sweeper = registry.spawn_sweeper();
    registry.attach(args.user, &session);

    let messenger: Arc<dyn Messenger> = Arc::new(ConsoleMessenger::new());
    let delivery = Arc::new(SafeDelivery::new(messenger, config.delivery.clone()));
    let engine = RefreshEngine::new(
        Arc::clone(&mux),
        Arc::clone(&registry),
        delivery,
        &config,
    );

    let prompt = args.prompt.join(" ");
    // a bounded backlog keeps the echo of the prompt easy to locate
    mux.clear_scrollback(&session).await;
    if !mux.send_keys(&session, &prompt).await || !mux.send_enter(&session).await {
        bail!("failed to deliver keystrokes to {}", session);
    }

    let done = engine.start(RefreshRequest {
        user_id: args.user,
        chat_id: args.user,
        session: session.clone(),
        prompt,
    });
    let _ = done.await;

    registry.detach(args.user);
    Ok(())
}
