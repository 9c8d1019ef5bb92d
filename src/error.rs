use thiserror::Error;

/// Failures surfaced by the bridge layer. External-process failures never
/// appear here: those degrade to safe defaults at the call site. What remains
/// is input that was rejected before anything ran, and sessions the
/// multiplexer does not know about.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Session name or path failed validation; nothing was executed.
    #[error("rejected input: {0}")]
    InputRejected(String),

    /// The named multiplexer session does not exist (or tmux is unreachable).
    #[error("no such multiplexer session: {0}")]
    Unavailable(String),
}
