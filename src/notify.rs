use std::process::Stdio;
use tokio::process::Command;

/// Fires a best-effort desktop notification without blocking the caller.
/// The notifier may be absent entirely; every failure is swallowed.
pub fn desktop(title: &str, body: &str) {
    let title = title.to_string();
    let body = body.to_string();
    tokio::spawn(async move {
        let result = Command::new("notify-send")
            .arg(&title)
            .arg(&body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(err) = result {
            tracing::debug!("notify-send unavailable: {}", err);
        }
    });
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn desktop_never_panics_without_a_notifier() {
        super::desktop("muxbridge", "test notification");
        // give the spawned task a moment to run its course
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
