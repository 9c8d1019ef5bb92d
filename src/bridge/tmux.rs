use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::BridgeError;
use crate::models::MuxSession;

const SESSION_NAME_MAX_LEN: usize = 50;

/// Default scrollback window for pane captures.
pub const DEFAULT_CAPTURE_LINES: usize = 500;

/// Checks a multiplexer session name against the allowed charset
/// (`[A-Za-z0-9_-]`, at most 50 characters). Every bridge operation
/// validates before the name reaches the multiplexer CLI; this is the sole
/// injection defense at this layer.
pub fn validate_session_name(name: &str) -> Result<(), BridgeError> {
    let valid = !name.is_empty()
        && name.len() <= SESSION_NAME_MAX_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(BridgeError::InputRejected(format!(
            "session name {:?}",
            name
        )))
    }
}

/// Escapes keystroke text so the pane receives it literally. Backslash,
/// double quote, `$`, backtick, `!`, `%` and newline are neutralized, plus
/// `;`, which the multiplexer treats as a command separator.
fn escape_keystrokes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '`' => out.push_str("\\`"),
            '!' => out.push_str("\\!"),
            '%' => out.push_str("\\%"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Contract for the terminal multiplexer the bridge drives. Every operation
/// is an asynchronous suspension point (it shells out), and every failure is
/// converted to a safe default rather than propagated: an absent session
/// must never take down a caller's loop.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    async fn create_session(&self, name: &str, cwd: Option<&Path>) -> bool;
    async fn has_session(&self, name: &str) -> bool;
    async fn send_keys(&self, name: &str, text: &str) -> bool;
    async fn send_enter(&self, name: &str) -> bool;
    async fn send_interrupt(&self, name: &str) -> bool;
    async fn capture_pane(&self, name: &str, max_lines: usize) -> String;
    async fn clear_scrollback(&self, name: &str) -> bool;
    async fn get_working_directory(&self, name: &str) -> Option<PathBuf>;
    async fn list_sessions(&self) -> Vec<MuxSession>;
    async fn kill_session(&self, name: &str) -> bool;
    async fn rename_session(&self, old: &str, new: &str) -> bool;
}

/// The real tmux-backed bridge.
#[derive(Debug, Clone, Default)]
pub struct TmuxBridge;

impl TmuxBridge {
    pub fn new() -> Self {
        Self
    }

    async fn run_ok(args: &[&str]) -> bool {
        Command::new("tmux")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn run_output(args: &[&str]) -> Option<String> {
        let output = Command::new("tmux")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        Some(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl Multiplexer for TmuxBridge {
    async fn create_session(&self, name: &str, cwd: Option<&Path>) -> bool {
        if let Err(err) = validate_session_name(name) {
            tracing::warn!("create_session: {err}");
            return false;
        }

        let cwd_str;
        let mut args = vec!["new-session", "-d", "-s", name];
        if let Some(dir) = cwd {
            cwd_str = dir.display().to_string();
            args.push("-c");
            args.push(&cwd_str);
        }

        Self::run_ok(&args).await
    }

    async fn has_session(&self, name: &str) -> bool {
        if validate_session_name(name).is_err() {
            return false;
        }
        Self::run_ok(&["has-session", "-t", name]).await
    }

    async fn send_keys(&self, name: &str, text: &str) -> bool {
        if let Err(err) = validate_session_name(name) {
            tracing::warn!("send_keys: {err}");
            return false;
        }
        let escaped = escape_keystrokes(text);
        Self::run_ok(&["send-keys", "-t", name, "-l", "--", &escaped]).await
    }

    async fn send_enter(&self, name: &str) -> bool {
        if validate_session_name(name).is_err() {
            return false;
        }
        Self::run_ok(&["send-keys", "-t", name, "Enter"]).await
    }

    async fn send_interrupt(&self, name: &str) -> bool {
        if validate_session_name(name).is_err() {
            return false;
        }
        Self::run_ok(&["send-keys", "-t", name, "C-c"]).await
    }

    async fn capture_pane(&self, name: &str, max_lines: usize) -> String {
        if validate_session_name(name).is_err() {
            return String::new();
        }
        let from = format!("-{}", max_lines);
        Self::run_output(&["capture-pane", "-p", "-t", name, "-S", &from])
            .await
            .unwrap_or_default()
    }

    async fn clear_scrollback(&self, name: &str) -> bool {
        if validate_session_name(name).is_err() {
            return false;
        }
        Self::run_ok(&["clear-history", "-t", name]).await
    }

    async fn get_working_directory(&self, name: &str) -> Option<PathBuf> {
        validate_session_name(name).ok()?;
        let output =
            Self::run_output(&["display-message", "-p", "-t", name, "#{pane_current_path}"])
                .await?;

        let path = output.trim();
        if path.is_empty() {
            return None;
        }
        Some(PathBuf::from(path))
    }

    async fn list_sessions(&self) -> Vec<MuxSession> {
        let format = "#{session_name}|#{session_windows}|#{session_created}|#{session_attached}";
        let Some(output) = Self::run_output(&["list-sessions", "-F", format]).await else {
            return Vec::new();
        };

        output.lines().filter_map(parse_session_line).collect()
    }

    async fn kill_session(&self, name: &str) -> bool {
        if let Err(err) = validate_session_name(name) {
            tracing::warn!("kill_session: {err}");
            return false;
        }
        Self::run_ok(&["kill-session", "-t", name]).await
    }

    async fn rename_session(&self, old: &str, new: &str) -> bool {
        if validate_session_name(old).is_err() || validate_session_name(new).is_err() {
            tracing::warn!("rename_session: rejected {:?} -> {:?}", old, new);
            return false;
        }
        Self::run_ok(&["rename-session", "-t", old, new]).await
    }
}

fn parse_session_line(line: &str) -> Option<MuxSession> {
    let mut parts = line.split('|');
    let name = parts.next()?.to_string();
    let window_count = parts.next()?.parse().ok()?;
    let created_secs: i64 = parts.next()?.parse().ok()?;
    let attached = parts.next()? != "0";
    let created_at = Utc.timestamp_opt(created_secs, 0).single()?;

    Some(MuxSession {
        name,
        window_count,
        created_at,
        attached,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_allowed_charset() {
        for name in ["dev", "my-session_2", "A", "a".repeat(50).as_str()] {
            assert!(
                validate_session_name(name).is_ok(),
                "validate_session_name: {:?} should be accepted",
                name
            );
        }
    }

    #[test]
    fn validate_rejects_bad_names() {
        for name in [
            "",
            "a b",
            "a;b",
            "a$(x)",
            "naïve",
            "dots.are.out",
            "a/b",
            "a".repeat(51).as_str(),
        ] {
            assert!(
                validate_session_name(name).is_err(),
                "validate_session_name: {:?} should be rejected before any external call",
                name
            );
        }
    }

    #[test]
    fn escape_neutralizes_metacharacters() {
        assert_eq!(escape_keystrokes(r#"echo "$HOME""#), r#"echo \"\$HOME\""#);
        assert_eq!(escape_keystrokes("a`b"), "a\\`b");
        assert_eq!(escape_keystrokes("100%!"), "100\\%\\!");
        assert_eq!(escape_keystrokes("x;y"), "x\\;y");
        assert_eq!(escape_keystrokes("line1\nline2"), "line1\\nline2");
        assert_eq!(escape_keystrokes("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn escape_leaves_plain_text_alone() {
        let text = "build the project and run the tests";
        assert_eq!(escape_keystrokes(text), text);
    }

    #[test]
    fn parse_session_line_roundtrip() {
        let parsed = parse_session_line("dev|3|1700000000|1").expect("line should parse");
        assert_eq!(parsed.name, "dev");
        assert_eq!(parsed.window_count, 3);
        assert!(parsed.attached);
        assert_eq!(parsed.created_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parse_session_line_rejects_garbage() {
        assert!(parse_session_line("only-a-name").is_none());
        assert!(parse_session_line("name|x|1700000000|0").is_none());
    }

    #[tokio::test]
    async fn capture_pane_missing_session_returns_empty() {
        let bridge = TmuxBridge::new();
        let screen = bridge
            .capture_pane("muxbridge-test-does-not-exist", 100)
            .await;
        assert_eq!(
            screen, "",
            "capture_pane: absent session must yield empty text, never an error"
        );
    }

    #[tokio::test]
    async fn capture_pane_invalid_name_returns_empty() {
        let bridge = TmuxBridge::new();
        assert_eq!(bridge.capture_pane("bad name; rm -rf /", 100).await, "");
    }

    #[tokio::test]
    async fn has_session_false_for_missing() {
        let bridge = TmuxBridge::new();
        assert!(!bridge.has_session("muxbridge-test-does-not-exist").await);
    }

    #[tokio::test]
    async fn send_keys_invalid_name_is_rejected() {
        let bridge = TmuxBridge::new();
        assert!(
            !bridge.send_keys("$(boom)", "hello").await,
            "send_keys: invalid name must be rejected before any external call"
        );
    }

    #[tokio::test]
    async fn working_directory_of_missing_session_is_none() {
        let bridge = TmuxBridge::new();
        assert_eq!(
            bridge
                .get_working_directory("muxbridge-test-does-not-exist")
                .await,
            None
        );
    }
}
