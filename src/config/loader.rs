use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Pacing and stability thresholds for the live update engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poll_interval_ms: u64,
    pub edit_interval_ms: u64,
    pub hard_ceiling_ms: u64,
    /// A poll counts as stable when fewer than this many lines changed.
    pub stable_line_delta: usize,
    /// Consecutive stable polls while not-thinking that complete the loop.
    pub stable_polls_done: u32,
    /// Consecutive stable polls that force completion regardless of
    /// classification, guarding against classifier false negatives.
    pub stable_polls_forced: u32,
    pub notify_after_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            edit_interval_ms: 8_000,
            hard_ceiling_ms: 600_000,
            stable_line_delta: 2,
            stable_polls_done: 5,
            stable_polls_forced: 8,
            notify_after_ms: 10_000,
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn edit_interval(&self) -> Duration {
        Duration::from_millis(self.edit_interval_ms)
    }

    pub fn hard_ceiling(&self) -> Duration {
        Duration::from_millis(self.hard_ceiling_ms)
    }

    pub fn notify_after(&self) -> Duration {
        Duration::from_millis(self.notify_after_ms)
    }
}

/// One-shot shell command execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    pub shell: String,
    pub timeout_ms: u64,
    /// Final output budget in bytes; the tail is kept when exceeded.
    pub max_output_bytes: usize,
    /// Window between the graceful terminate signal and the forced kill.
    pub grace_ms: u64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
            timeout_ms: 120_000,
            max_output_bytes: 16 * 1024,
            grace_ms: 400,
        }
    }
}

/// Outbound message sizing for the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Hard per-message transport limit in characters.
    pub message_limit: usize,
    /// Preferred chunk size, kept under the limit to leave header room.
    pub chunk_len: usize,
    /// Above this many characters, output is uploaded as a file instead of
    /// being chunked into messages.
    pub file_threshold: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            message_limit: crate::chat::MESSAGE_CEILING,
            chunk_len: 3_900,
            file_threshold: 12_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session_prefix: String,
    /// Scrollback lines included in each pane capture.
    pub capture_lines: usize,
    pub engine: EngineConfig,
    pub exec: ExecConfig,
    pub delivery: DeliveryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_prefix: "mux".to_string(),
            capture_lines: 500,
            engine: EngineConfig::default(),
            exec: ExecConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = config_path.unwrap_or_else(Self::default_config_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let config: Config = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn default_config_path() -> PathBuf {
        if let Some(config_path) = std::env::var_os("MUXBRIDGE_CONFIG") {
            PathBuf::from(config_path)
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("muxbridge")
                .join("config.yaml")
        }
    }
}
