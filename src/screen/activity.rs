use crate::models::ActivityState;

/// Trailing capture lines the classifier looks at; anything older is assumed
/// stale.
const TAIL_WINDOW: usize = 10;

/// Glyph and token sets the classifier matches against. Swappable (e.g. for
/// a different assistant CLI) without touching the precedence algorithm.
#[derive(Debug, Clone)]
pub struct ActivityProfile {
    pub spinners: Vec<char>,
    /// Substrings, lowercase, shown next to a running operation.
    pub interrupt_hints: Vec<&'static str>,
    pub thinking_token: &'static str,
    pub prompt_glyph: char,
    pub checkmarks: Vec<char>,
    pub done_word: &'static str,
}

impl Default for ActivityProfile {
    fn default() -> Self {
        Self {
            spinners: vec![
                '⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏', '◐', '◓', '◑', '◒', '✻',
                '✽', '✶', '✢',
            ],
            interrupt_hints: vec!["esc to interrupt", "ctrl+c to interrupt"],
            thinking_token: "thinking",
            prompt_glyph: '>',
            checkmarks: vec!['✓', '✔', '☑'],
            done_word: "done",
        }
    }
}

/// Classification of a single pane capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activity {
    pub thinking: bool,
    pub ready: bool,
    pub done: bool,
    pub status: ActivityState,
}

/// Classify a pane capture with the default profile.
pub fn parse_activity(screen: &str) -> Activity {
    parse_activity_with(&ActivityProfile::default(), screen)
}

/// Pure heuristic classification over the trailing window. Precedence is
/// fixed at thinking > ready > done > unknown: a spinner can coexist with a
/// stale echoed prompt line, so activity must win.
pub fn parse_activity_with(profile: &ActivityProfile, screen: &str) -> Activity {
    let lines: Vec<&str> = screen.lines().collect();
    let start = lines.len().saturating_sub(TAIL_WINDOW);
    let window = &lines[start..];
    let text = window.join("\n");
    let lower = text.to_lowercase();

    let thinking = text.chars().any(|c| profile.spinners.contains(&c))
        || profile.interrupt_hints.iter().any(|hint| lower.contains(hint))
        || lower.contains(profile.thinking_token);

    let ready = !thinking
        && window
            .iter()
            .any(|line| line.trim().starts_with(profile.prompt_glyph));

    let done = text.chars().any(|c| profile.checkmarks.contains(&c))
        || contains_done_word(&lower, profile.done_word);

    let status = if thinking {
        ActivityState::Thinking
    } else if ready {
        ActivityState::Ready
    } else if done {
        ActivityState::Done
    } else {
        ActivityState::Unknown
    };

    Activity {
        thinking,
        ready,
        done,
        status,
    }
}

/// "done" counts only when it is not the tail of "undo" ("undone" must not
/// read as completion).
fn contains_done_word(lower: &str, word: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = lower[from..].find(word) {
        let idx = from + pos;
        let after_un =
            idx >= 2 && lower.is_char_boundary(idx - 2) && &lower[idx - 2..idx] == "un";
        if !after_un {
            return true;
        }
        from = idx + word.len();
    }
    false
}
