mod tmux;

pub use tmux::{validate_session_name, Multiplexer, TmuxBridge, DEFAULT_CAPTURE_LINES};
