use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for bridge users (remote chat account ids).
pub type UserId = i64;

/// Chat conversation identifier.
pub type ChatId = i64;

/// Message identifier within a chat.
pub type MessageRef = i64;

/// Durable record of an assistant session owned by a user. The multiplexer
/// session of the same name has an independent lifecycle and may disappear
/// at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub owner_id: UserId,
    pub working_directory: PathBuf,
    pub is_running: bool,
}

impl Session {
    pub fn new(name: impl Into<String>, owner_id: UserId, working_directory: PathBuf) -> Self {
        Self {
            name: name.into(),
            owner_id,
            working_directory,
            is_running: true,
        }
    }
}

/// Inferred assistant activity, derived from a pane capture. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityState {
    Thinking,
    Ready,
    Done,
    #[default]
    Unknown,
}

impl ActivityState {
    pub fn symbol(&self) -> &'static str {
        match self {
            ActivityState::Thinking => "◐",
            ActivityState::Ready => "○",
            ActivityState::Done => "●",
            ActivityState::Unknown => "?",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ActivityState::Thinking => "Assistant is working",
            ActivityState::Ready => "Waiting at prompt",
            ActivityState::Done => "Reply finished",
            ActivityState::Unknown => "Unknown state",
        }
    }
}

/// Outcome of a one-shot shell command, produced once per command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub output: String,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_working_directory: Option<PathBuf>,
}

/// A live multiplexer session as reported by the multiplexer CLI.
#[derive(Debug, Clone)]
pub struct MuxSession {
    pub name: String,
    pub window_count: u32,
    pub created_at: DateTime<Utc>,
    pub attached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_state_symbols_are_unique() {
        let states = [
            ActivityState::Thinking,
            ActivityState::Ready,
            ActivityState::Done,
            ActivityState::Unknown,
        ];

        let symbols: Vec<_> = states.iter().map(|s| s.symbol()).collect();
        let unique: std::collections::HashSet<_> = symbols.iter().collect();
        assert_eq!(symbols.len(), unique.len());
    }

    #[test]
    fn activity_state_default_is_unknown() {
        assert_eq!(ActivityState::default(), ActivityState::Unknown);
    }

    #[test]
    fn session_new_starts_running() {
        let session = Session::new("dev", 42, PathBuf::from("/tmp"));
        assert!(session.is_running, "Session::new: should start running");
        assert_eq!(session.owner_id, 42);
    }
}
