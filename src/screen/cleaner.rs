use regex::Regex;
use std::sync::OnceLock;

use crate::utils::tail_chars;

/// Lowercase substrings marking assistant UI banners rather than reply
/// content.
const BANNER_MARKERS: &[&str] = &[
    "esc to interrupt",
    "ctrl+c to interrupt",
    "bypass permissions",
    "shift+tab to cycle",
    "auto-accept edits",
    "context left until auto-compact",
    "? for shortcuts",
];

/// Advisory fires at or below this remaining-context percentage.
const CONTEXT_WARN_THRESHOLD: u32 = 20;

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,3})\s*%").expect("valid percent regex"))
}

fn is_rule_line(trimmed: &str) -> bool {
    trimmed.chars().count() >= 4
        && trimmed
            .chars()
            .all(|c| matches!(c, '─' | '━' | '═' | '╌' | '-' | '_'))
}

fn is_chrome_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed == ">" || is_rule_line(trimmed) {
        return true;
    }
    let lower = trimmed.to_lowercase();
    BANNER_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Removes known assistant chrome (separator rules, bare prompt lines,
/// interrupt hints, permission/context banners) and collapses the blank
/// runs left behind.
pub fn strip_chrome(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines() {
        if is_chrome_line(line) {
            continue;
        }
        if line.trim().is_empty() && out.last().map_or(true, |prev| prev.trim().is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|line| line.trim().is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Content after the echoed user input, when the echo can be located in the
/// capture. Matching is on a prefix of the input since long prompts wrap.
fn content_after_echo<'a>(screen: &'a str, user_text: &str) -> Option<&'a str> {
    let needle: String = user_text.trim().chars().take(64).collect();
    if needle.chars().count() < 4 {
        // too short to locate reliably
        return None;
    }
    let idx = screen.rfind(&needle)?;
    match screen[idx..].find('\n') {
        Some(newline) => Some(&screen[idx + newline + 1..]),
        None => Some(""),
    }
}

/// The assistant's reply: everything after the located user-input echo, or
/// the whole capture when the echo is not found, chrome stripped either way.
pub fn extract_reply(screen: &str, user_text: &str) -> String {
    match content_after_echo(screen, user_text) {
        Some(after) => strip_chrome(after),
        None => strip_chrome(screen),
    }
}

/// A short tail of the in-progress reply, or `None` when the user echo
/// cannot be located (in which case callers fall back to a static tip).
pub fn reply_preview(screen: &str, user_text: &str, max_chars: usize) -> Option<String> {
    let after = content_after_echo(screen, user_text)?;
    let cleaned = strip_chrome(after);
    let flat = cleaned
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if flat.is_empty() {
        return None;
    }
    Some(tail_chars(&flat, max_chars))
}

/// Scans for a "context running low" percentage. Only lines that mention
/// context are considered so progress percentages in command output do not
/// trigger the advisory.
pub fn context_warning(screen: &str) -> Option<String> {
    for line in screen.lines().rev() {
        let lower = line.to_lowercase();
        if !lower.contains("context") {
            continue;
        }
        if let Some(caps) = percent_re().captures(&lower) {
            if let Ok(pct) = caps[1].parse::<u32>() {
                if pct <= CONTEXT_WARN_THRESHOLD {
                    return Some(format!("Context running low: {}% remaining", pct));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_chrome_drops_rules_prompts_and_banners() {
        let screen = "\
Here is the answer.
────────────────────
>
  esc to interrupt
More detail.
── Bypass Permissions on ──";
        let cleaned = strip_chrome(screen);
        assert_eq!(cleaned, "Here is the answer.\nMore detail.");
    }

    #[test]
    fn strip_chrome_collapses_blank_runs() {
        let screen = "a\n\n\n\nb\n\n";
        assert_eq!(strip_chrome(screen), "a\n\nb");
    }

    #[test]
    fn strip_chrome_keeps_prompt_lines_with_content() {
        let cleaned = strip_chrome("> not a bare prompt\nbody");
        assert!(
            cleaned.contains("> not a bare prompt"),
            "only bare `>` lines are chrome"
        );
    }

    #[test]
    fn extract_reply_takes_content_after_echo() {
        let screen = "\
chrome above
> build the project
Compiling…
Finished in 3s
>";
        let reply = extract_reply(screen, "build the project");
        assert_eq!(reply, "Compiling…\nFinished in 3s");
    }

    #[test]
    fn extract_reply_uses_last_echo_occurrence() {
        let screen = "build the project\nold reply\n> build the project\nnew reply";
        let reply = extract_reply(screen, "build the project");
        assert_eq!(reply, "new reply");
    }

    #[test]
    fn extract_reply_falls_back_to_whole_screen() {
        let screen = "some reply with no echo\n>";
        assert_eq!(
            extract_reply(screen, "a prompt that is not on screen"),
            "some reply with no echo"
        );
    }

    #[test]
    fn reply_preview_none_without_echo() {
        assert_eq!(reply_preview("free-form output", "missing prompt", 40), None);
    }

    #[test]
    fn reply_preview_is_tail_bounded() {
        let screen = format!("> summarize the log\n{}", "word ".repeat(100));
        let preview = reply_preview(&screen, "summarize the log", 20).unwrap();
        assert!(preview.chars().count() <= 20);
        assert!(preview.starts_with('…'), "preview should mark truncation");
    }

    #[test]
    fn context_warning_fires_below_threshold() {
        let screen = "reply text\nContext left until auto-compact: 8%";
        let warning = context_warning(screen).expect("should warn at 8%");
        assert!(warning.contains("8%"));
    }

    #[test]
    fn context_warning_quiet_when_plenty_left() {
        assert_eq!(context_warning("Context left: 80%"), None);
    }

    #[test]
    fn context_warning_ignores_unrelated_percentages() {
        assert_eq!(
            context_warning("download at 3%\nextracting 7%"),
            None,
            "percentages without a context mention must not trigger"
        );
    }
}
