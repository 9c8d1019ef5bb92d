use anyhow::Result;

use crate::bridge::{Multiplexer, TmuxBridge};
use crate::utils::truncate_str;

pub async fn execute() -> Result<()> {
    let bridge = TmuxBridge::new();
    let sessions = bridge.list_sessions().await;

    if sessions.is_empty() {
        println!("No multiplexer sessions.");
        return Ok(());
    }

    println!(
        "{:<26} {:>8} {:<18} {}",
        "SESSION", "WINDOWS", "CREATED", "STATE"
    );
    println!("{}", "-".repeat(64));

    for session in sessions {
        println!(
            "{:<26} {:>8} {:<18} {}",
            truncate_str(&session.name, 26),
            session.window_count,
            session.created_at.format("%Y-%m-%d %H:%M"),
            if session.attached {
                "attached"
            } else {
                "detached"
            }
        );
    }

    Ok(())
}
