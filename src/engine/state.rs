use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::screen::Activity;

/// Why a polling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// The screen settled. `forced` marks the stability-ceiling path that
    /// guards against classifier false negatives.
    Completed { forced: bool },
    /// The hard ceiling elapsed without the screen settling.
    TimedOut,
}

/// What the loop should do after folding in one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep polling; `edit_due` asks for a paced progress-message update.
    Continue { edit_due: bool },
    Finish(Ending),
}

/// Poll bookkeeping for one refresh instance. Kept separate from the tokio
/// loop and fed through [`RefreshState::observe`] so the whole state machine
/// is testable without timers.
#[derive(Debug)]
pub struct RefreshState {
    config: EngineConfig,
    started: Instant,
    last_screen: Vec<String>,
    /// Consecutive stable polls, regardless of classification.
    stable_count: u32,
    /// Consecutive stable polls during which the assistant was not thinking.
    calm_count: u32,
    last_edit: Option<Instant>,
    polls: u32,
}

impl RefreshState {
    pub fn new(config: &EngineConfig, now: Instant) -> Self {
        Self {
            config: config.clone(),
            started: now,
            last_screen: Vec::new(),
            stable_count: 0,
            calm_count: 0,
            last_edit: None,
            polls: 0,
        }
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Folds one capture into the state and decides what happens next.
    pub fn observe(&mut self, screen: &str, activity: &Activity, now: Instant) -> Verdict {
        self.polls += 1;
        let lines: Vec<String> = screen.lines().map(str::to_string).collect();

        // the first poll has nothing to diff against
        if self.polls > 1 {
            if line_delta(&self.last_screen, &lines) < self.config.stable_line_delta {
                self.stable_count += 1;
                if activity.thinking {
                    self.calm_count = 0;
                } else {
                    self.calm_count += 1;
                }
            } else {
                self.stable_count = 0;
                self.calm_count = 0;
            }
        }
        self.last_screen = lines;

        if self.elapsed(now) >= self.config.hard_ceiling() {
            return Verdict::Finish(Ending::TimedOut);
        }
        if self.stable_count >= self.config.stable_polls_forced {
            return Verdict::Finish(Ending::Completed { forced: true });
        }
        if self.calm_count >= self.config.stable_polls_done {
            return Verdict::Finish(Ending::Completed { forced: false });
        }

        let edit_due = activity.thinking && self.edit_is_due(now);
        if edit_due {
            self.last_edit = Some(now);
        }
        Verdict::Continue { edit_due }
    }

    fn edit_is_due(&self, now: Instant) -> bool {
        match self.last_edit {
            None => true,
            Some(previous) => {
                now.saturating_duration_since(previous) >= self.config.edit_interval()
            }
        }
    }
}

/// Number of differing lines between two captures: position-wise mismatches
/// plus the length difference.
fn line_delta(previous: &[String], next: &[String]) -> usize {
    let common = previous.len().min(next.len());
    let mut delta = previous.len().max(next.len()) - common;
    for i in 0..common {
        if previous[i] != next[i] {
            delta += 1;
        }
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::parse_activity;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn observe(state: &mut RefreshState, screen: &str, now: Instant) -> Verdict {
        let activity = parse_activity(screen);
        state.observe(screen, &activity, now)
    }

    #[test]
    fn line_delta_counts_changes_and_growth() {
        let a = vec!["one".to_string(), "two".to_string()];
        let b = vec!["one".to_string(), "two!".to_string(), "three".to_string()];
        assert_eq!(line_delta(&a, &b), 2);
        assert_eq!(line_delta(&a, &a), 0);
        assert_eq!(line_delta(&[], &a), 2);
    }

    #[test]
    fn stable_not_thinking_completes_exactly_once() {
        let t0 = Instant::now();
        let mut state = RefreshState::new(&config(), t0);
        let screen = "build output\n> ";

        // the loop stops at the first Finish, like the engine does
        let mut finish_at = None;
        for poll in 1..=10 {
            let verdict = observe(&mut state, screen, t0);
            if let Verdict::Finish(ending) = verdict {
                assert_eq!(
                    ending,
                    Ending::Completed { forced: false },
                    "a settled non-thinking screen completes unforced"
                );
                finish_at = Some(poll);
                break;
            }
        }

        assert_eq!(
            finish_at,
            Some(6),
            "5 consecutive stable comparisons (first poll has no previous) complete the loop"
        );
    }

    #[test]
    fn thinking_screens_do_not_complete_on_calm_threshold() {
        let t0 = Instant::now();
        let mut state = RefreshState::new(&config(), t0);
        let screen = "⠙ crunching (esc to interrupt)";

        for i in 0..7 {
            let verdict = observe(&mut state, screen, t0);
            assert!(
                matches!(verdict, Verdict::Continue { .. }),
                "poll {}: a thinking screen must not hit the calm threshold",
                i
            );
        }
    }

    #[test]
    fn forced_completion_after_stability_ceiling() {
        let t0 = Instant::now();
        let mut state = RefreshState::new(&config(), t0);
        // unchanged screen that always classifies as thinking — a classifier
        // false negative must not poll forever
        let screen = "⠙ stuck spinner frame";

        let mut last = Verdict::Continue { edit_due: false };
        for _ in 0..9 {
            last = observe(&mut state, screen, t0);
        }
        assert_eq!(
            last,
            Verdict::Finish(Ending::Completed { forced: true }),
            "8 stable polls force completion regardless of classification"
        );
    }

    #[test]
    fn changing_screens_reset_stability() {
        let t0 = Instant::now();
        let mut state = RefreshState::new(&config(), t0);

        for i in 0..20 {
            let screen = format!("line a\nline b\nprogress {}\nmore {}\nyet {}", i, i, i);
            let verdict = observe(&mut state, &screen, t0);
            assert!(
                matches!(verdict, Verdict::Continue { .. }),
                "a screen changing by 3 lines each poll never stabilizes"
            );
        }
    }

    #[test]
    fn small_changes_still_count_as_stable() {
        let t0 = Instant::now();
        let mut state = RefreshState::new(&config(), t0);

        let mut finished = false;
        for i in 0..8 {
            // exactly one line differs per poll, below the 2-line delta
            let screen = format!("header\nbody\nclock {}", i);
            if let Verdict::Finish(ending) = observe(&mut state, &screen, t0) {
                assert_eq!(ending, Ending::Completed { forced: false });
                finished = true;
                break;
            }
        }
        assert!(finished, "sub-threshold changes must count toward stability");
    }

    #[test]
    fn hard_ceiling_times_out() {
        let t0 = Instant::now();
        let mut state = RefreshState::new(&config(), t0);

        let later = t0 + Duration::from_secs(601);
        let verdict = observe(&mut state, "⠙ still going", later);
        assert_eq!(verdict, Verdict::Finish(Ending::TimedOut));
    }

    #[test]
    fn edits_are_paced_while_thinking() {
        let t0 = Instant::now();
        let mut state = RefreshState::new(&config(), t0);
        let screen = "⠙ working\nnew content each poll 1";

        assert_eq!(
            observe(&mut state, "⠙ working\nfirst", t0),
            Verdict::Continue { edit_due: true },
            "first thinking poll should update the progress message"
        );
        assert_eq!(
            observe(&mut state, screen, t0 + Duration::from_secs(3)),
            Verdict::Continue { edit_due: false },
            "3s after an edit is inside the 8s pacing window"
        );
        assert_eq!(
            observe(
                &mut state,
                "⠙ working\nnew content each poll 2",
                t0 + Duration::from_secs(9)
            ),
            Verdict::Continue { edit_due: true },
            "9s after an edit the pacing window has passed"
        );
    }

    #[test]
    fn non_thinking_polls_never_request_edits() {
        let t0 = Instant::now();
        let mut state = RefreshState::new(&config(), t0);
        let verdict = observe(&mut state, "plain output, nothing else", t0);
        assert_eq!(verdict, Verdict::Continue { edit_due: false });
    }
}
