use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use regex::Regex;
use std::sync::OnceLock;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::ExecConfig;
use crate::models::{ExecutionResult, Session, UserId};

/// Exit code reported when a command is cut off by the timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

const TIMEOUT_TRAILER: &str = "\n[command timed out and was terminated]";

type RunKey = (UserId, String);

struct InFlight {
    abort: Arc<Notify>,
}

enum Ending {
    Exited(i32),
    TimedOut,
    Aborted,
}

/// Runs one-shot shell commands for users outside assistant mode. At most
/// one process is live per `(user, session)` key: starting a new command
/// aborts the previous one, graceful terminate first, forced kill after the
/// grace window. The aborted call's result is discarded (`None`).
pub struct CommandExecutor {
    config: ExecConfig,
    running: Mutex<HashMap<RunKey, InFlight>>,
}

fn lock(map: &Mutex<HashMap<RunKey, InFlight>>) -> MutexGuard<'_, HashMap<RunKey, InFlight>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn cd_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*cd\b").expect("valid cd regex"))
}

impl CommandExecutor {
    pub fn new(config: ExecConfig) -> Self {
        Self {
            config,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Executes `command` under the configured shell in the session's
    /// working directory. Returns `None` only when a newer command on the
    /// same `(owner, session)` key superseded this one; every other outcome,
    /// including spawn failure and timeout, is a well-formed
    /// [`ExecutionResult`].
    pub async fn run(&self, session: &Session, command: &str) -> Option<ExecutionResult> {
        let key: RunKey = (session.owner_id, session.name.clone());
        let cwd: &Path = &session.working_directory;
        let abort = Arc::new(Notify::new());
        {
            let mut running = lock(&self.running);
            if let Some(previous) = running.insert(
                key.clone(),
                InFlight {
                    abort: abort.clone(),
                },
            ) {
                // notify_one stores a permit, so the abort is not lost even if
                // the previous run has not reached its select yet
                previous.abort.notify_one();
            }
        }

        let started = Instant::now();
        let budget = self.config.max_output_bytes;
        let probe = wants_cwd_probe(command);
        let combined = if probe {
            format!("{} && pwd", command)
        } else {
            command.to_string()
        };

        let mut cmd = Command::new(&self.config.shell);
        cmd.arg("-c")
            .arg(&combined)
            .current_dir(cwd)
            .env_clear()
            .env("TERM", "dumb")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }
        if let Ok(home) = std::env::var("HOME") {
            cmd.env("HOME", home);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                self.clear_if_current(&key, &abort);
                return Some(ExecutionResult {
                    output: format!("failed to spawn shell: {}", err),
                    exit_code: 1,
                    duration_ms: elapsed_ms(started),
                    truncated: false,
                    new_working_directory: None,
                });
            }
        };

        let live_cap = budget.saturating_mul(2);
        let stdout_task = child
            .stdout
            .take()
            .map(|handle| tokio::spawn(read_capped(handle, live_cap)));
        let stderr_task = child
            .stderr
            .take()
            .map(|handle| tokio::spawn(read_capped(handle, live_cap)));

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let ending = tokio::select! {
            waited = tokio::time::timeout(timeout, child.wait()) => match waited {
                Ok(Ok(status)) => Ending::Exited(status.code().unwrap_or(1)),
                Ok(Err(err)) => {
                    tracing::warn!("waiting on child failed: {}", err);
                    Ending::Exited(1)
                }
                Err(_) => Ending::TimedOut,
            },
            _ = abort.notified() => Ending::Aborted,
        };

        match ending {
            Ending::Aborted => {
                self.terminate(&mut child).await;
                self.clear_if_current(&key, &abort);
                None
            }
            Ending::TimedOut => {
                self.terminate(&mut child).await;
                let (stdout_buf, _, stderr_buf, _) = collect(stdout_task, stderr_task).await;
                let mut output = merge_streams(
                    String::from_utf8_lossy(&stdout_buf).into_owned(),
                    &String::from_utf8_lossy(&stderr_buf),
                );
                output = tail_bytes(&output, budget);
                output.push_str(TIMEOUT_TRAILER);
                self.clear_if_current(&key, &abort);
                Some(ExecutionResult {
                    output,
                    exit_code: TIMEOUT_EXIT_CODE,
                    duration_ms: elapsed_ms(started),
                    truncated: true,
                    new_working_directory: None,
                })
            }
            Ending::Exited(code) => {
                let (stdout_buf, out_trunc, stderr_buf, err_trunc) =
                    collect(stdout_task, stderr_task).await;
                let mut stdout_text = String::from_utf8_lossy(&stdout_buf).into_owned();

                let mut new_working_directory = None;
                if probe && code == 0 {
                    let (head, last) = split_last_line(&stdout_text);
                    let candidate = PathBuf::from(last.trim());
                    if candidate.is_absolute() && candidate.is_dir() {
                        new_working_directory = Some(candidate);
                        stdout_text = head;
                    }
                }

                let mut output =
                    merge_streams(stdout_text, &String::from_utf8_lossy(&stderr_buf));
                let mut truncated = out_trunc || err_trunc;
                if output.len() > budget {
                    output = tail_bytes(&output, budget);
                    truncated = true;
                }

                self.clear_if_current(&key, &abort);
                Some(ExecutionResult {
                    output,
                    exit_code: code,
                    duration_ms: elapsed_ms(started),
                    truncated,
                    new_working_directory,
                })
            }
        }
    }

    /// Graceful terminate, then forced kill once the grace window elapses.
    async fn terminate(&self, child: &mut Child) {
        if let Some(pid) = child.id() {
            let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            let grace = Duration::from_millis(self.config.grace_ms);
            if tokio::time::timeout(grace, child.wait()).await.is_ok() {
                return;
            }
        }
        if let Err(err) = child.kill().await {
            tracing::warn!("forced kill failed: {}", err);
        }
    }

    /// Removes the in-flight entry only if it is still ours; a successor may
    /// already own the key.
    fn clear_if_current(&self, key: &RunKey, abort: &Arc<Notify>) {
        let mut running = lock(&self.running);
        if let Some(entry) = running.get(key) {
            if Arc::ptr_eq(&entry.abort, abort) {
                running.remove(key);
            }
        }
    }
}

/// Leading `cd <path>` forms get a working-directory probe appended so the
/// resulting absolute path is recoverable from output.
fn wants_cwd_probe(command: &str) -> bool {
    cd_re().is_match(command)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Reads a stream to EOF, keeping at most `cap` trailing bytes while live so
/// a chatty process cannot grow memory unboundedly.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> (Vec<u8>, bool) {
    let mut buf = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > cap {
                    let excess = buf.len() - cap;
                    buf.drain(..excess);
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }
    (buf, truncated)
}

async fn collect(
    stdout_task: Option<JoinHandle<(Vec<u8>, bool)>>,
    stderr_task: Option<JoinHandle<(Vec<u8>, bool)>>,
) -> (Vec<u8>, bool, Vec<u8>, bool) {
    let drain = |task: Option<JoinHandle<(Vec<u8>, bool)>>| async {
        match task {
            Some(task) => task.await.unwrap_or_default(),
            None => (Vec::new(), false),
        }
    };
    let ((stdout_buf, out_trunc), (stderr_buf, err_trunc)) =
        futures::future::join(drain(stdout_task), drain(stderr_task)).await;
    (stdout_buf, out_trunc, stderr_buf, err_trunc)
}

fn merge_streams(mut stdout_text: String, stderr_text: &str) -> String {
    let stderr_trimmed = stderr_text.trim_end();
    if !stderr_trimmed.is_empty() {
        if !stdout_text.is_empty() && !stdout_text.ends_with('\n') {
            stdout_text.push('\n');
        }
        stdout_text.push_str(stderr_trimmed);
    }
    stdout_text
}

/// Splits off the last non-empty line (the probe output).
fn split_last_line(text: &str) -> (String, &str) {
    let trimmed = text.trim_end_matches('\n');
    match trimmed.rfind('\n') {
        Some(idx) => (trimmed[..idx].to_string(), &trimmed[idx + 1..]),
        None => (String::new(), trimmed),
    }
}

/// Keeps the trailing `max_bytes` of a string on a char boundary. The most
/// recent output is the most relevant.
fn tail_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let start = text.len() - max_bytes;
    let start = text
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| i >= start)
        .unwrap_or(text.len());
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(timeout_ms: u64, max_output_bytes: usize) -> CommandExecutor {
        CommandExecutor::new(ExecConfig {
            shell: "sh".to_string(),
            timeout_ms,
            max_output_bytes,
            grace_ms: 200,
        })
    }

    fn session(owner: UserId, cwd: &str) -> Session {
        Session::new("dev", owner, PathBuf::from(cwd))
    }

    #[test]
    fn cwd_probe_detection() {
        assert!(wants_cwd_probe("cd /tmp"));
        assert!(wants_cwd_probe("  cd /tmp && make"));
        assert!(wants_cwd_probe("cd"));
        assert!(!wants_cwd_probe("cdparanoia --scan"));
        assert!(!wants_cwd_probe("echo cd /tmp"));
    }

    #[test]
    fn split_last_line_takes_probe() {
        let (head, last) = split_last_line("one\ntwo\n/tmp\n");
        assert_eq!(head, "one\ntwo");
        assert_eq!(last, "/tmp");

        let (head, last) = split_last_line("/tmp\n");
        assert_eq!(head, "");
        assert_eq!(last, "/tmp");
    }

    #[test]
    fn tail_bytes_keeps_the_tail() {
        assert_eq!(tail_bytes("abcdef", 3), "def");
        assert_eq!(tail_bytes("abc", 10), "abc");
    }

    #[tokio::test]
    async fn simple_command_succeeds() {
        let executor = executor(5_000, 16 * 1024);
        let result = executor
            .run(&session(1, "/tmp"), "echo hello")
            .await
            .expect("not superseded");

        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("hello"));
        assert!(!result.truncated);
        assert_eq!(result.new_working_directory, None);
    }

    #[tokio::test]
    async fn stderr_is_captured() {
        let executor = executor(5_000, 16 * 1024);
        let result = executor
            .run(&session(1, "/tmp"), "echo oops >&2")
            .await
            .expect("not superseded");

        assert_eq!(result.exit_code, 0);
        assert!(
            result.output.contains("oops"),
            "stderr should be merged into output, got {:?}",
            result.output
        );
    }

    #[tokio::test]
    async fn cd_reports_new_working_directory() {
        let executor = executor(5_000, 16 * 1024);
        let result = executor
            .run(&session(1, "/"), "cd /tmp && echo ok")
            .await
            .expect("not superseded");

        assert_eq!(result.exit_code, 0);
        assert_eq!(
            result.new_working_directory,
            Some(PathBuf::from("/tmp")),
            "cd probe: should report the verified directory"
        );
        assert_eq!(
            result.output.trim(),
            "ok",
            "cd probe: the probe line must be stripped from visible output"
        );
    }

    #[tokio::test]
    async fn cd_to_missing_path_reports_nothing() {
        let executor = executor(5_000, 16 * 1024);
        let result = executor
            .run(&session(1, "/"), "cd /definitely/not/a/real/path")
            .await
            .expect("not superseded");

        assert_ne!(result.exit_code, 0);
        assert_eq!(
            result.new_working_directory, None,
            "cd probe: a failed cd must not report a directory"
        );
    }

    #[tokio::test]
    async fn timeout_returns_124_quickly() {
        let executor = executor(500, 16 * 1024);
        let started = Instant::now();
        let result = executor
            .run(&session(1, "/tmp"), "sleep 999999")
            .await
            .expect("not superseded");

        assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
        assert!(result.truncated, "timeout results are marked truncated");
        assert!(
            result.output.contains("timed out"),
            "timeout results carry an explanatory trailer"
        );
        assert!(
            started.elapsed() < Duration::from_secs(3),
            "timeout should fire near the configured 500ms, took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn output_is_truncated_to_budget_keeping_tail() {
        let executor = executor(5_000, 64);
        let result = executor
            .run(&session(1, "/tmp"), "seq 1 500")
            .await
            .expect("not superseded");

        assert_eq!(result.exit_code, 0);
        assert!(result.truncated, "over-budget output must set truncated");
        assert!(result.output.len() <= 64);
        assert!(
            result.output.contains("500"),
            "truncation keeps the tail, got {:?}",
            result.output
        );
        assert!(!result.output.contains("\n1\n"));
    }

    #[tokio::test]
    async fn spawn_failure_is_a_result_not_an_error() {
        let executor = CommandExecutor::new(ExecConfig {
            shell: "/definitely/not/a/shell".to_string(),
            timeout_ms: 1_000,
            max_output_bytes: 1024,
            grace_ms: 100,
        });
        let result = executor
            .run(&session(1, "/tmp"), "echo hi")
            .await
            .expect("not superseded");

        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("failed to spawn"));
    }

    #[tokio::test]
    async fn second_command_aborts_the_first() {
        let executor = Arc::new(executor(10_000, 16 * 1024));

        let first = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                executor
                    .run(&session(1, "/tmp"), "sleep 999999")
                    .await
            })
        };
        // let the first command register and spawn
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        let second = executor
            .run(&session(1, "/tmp"), "echo second")
            .await
            .expect("the new command must not be discarded");
        assert_eq!(second.exit_code, 0);
        assert!(second.output.contains("second"));

        let first = first.await.expect("task join");
        assert!(
            first.is_none(),
            "supersede: the aborted command's result is discarded"
        );
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "supersede: the old process must die promptly"
        );
    }

    #[tokio::test]
    async fn different_keys_run_independently() {
        let executor = Arc::new(executor(10_000, 16 * 1024));

        let slow = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                executor.run(&session(1, "/tmp"), "sleep 1").await
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let other = executor
            .run(&session(2, "/tmp"), "echo other-user")
            .await
            .expect("different user must not abort anyone");
        assert_eq!(other.exit_code, 0);

        let slow = slow.await.expect("task join");
        assert!(
            slow.is_some(),
            "a command under a different key must not be aborted"
        );
    }
}
