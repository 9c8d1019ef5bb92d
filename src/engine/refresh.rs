use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::oneshot;

use crate::bridge::Multiplexer;
use crate::config::{Config, EngineConfig};
use crate::delivery::SafeDelivery;
use crate::models::{ChatId, MessageRef, UserId};
use crate::notify;
use crate::registry::Registry;
use crate::screen;

use super::state::{Ending, RefreshState, Verdict};
use super::RefreshHandle;

/// Shown while thinking when no reply preview is available yet.
const WAIT_TIPS: &[&str] = &[
    "Still working…",
    "The reply arrives once the screen settles.",
    "Large outputs come through in chunks or as a file.",
];

/// Characters of cleaned reply tail shown in progress updates.
const PREVIEW_CHARS: usize = 200;

/// One interaction to watch: a user's prompt sent to an assistant session.
#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub session: String,
    pub prompt: String,
}

/// Per-user live update engine. Each attached user gets at most one polling
/// task; starting a new interaction cancels the previous instance through
/// the registry before the new one begins.
pub struct RefreshEngine {
    mux: Arc<dyn Multiplexer>,
    registry: Arc<Registry>,
    delivery: Arc<SafeDelivery>,
    config: EngineConfig,
    capture_lines: usize,
}

impl RefreshEngine {
    pub fn new(
        mux: Arc<dyn Multiplexer>,
        registry: Arc<Registry>,
        delivery: Arc<SafeDelivery>,
        config: &Config,
    ) -> Self {
        Self {
            mux,
            registry,
            delivery,
            config: config.engine.clone(),
            capture_lines: config.capture_lines,
        }
    }

    /// Starts (or restarts) the live-update loop for a user. The returned
    /// receiver resolves when the loop ends, however it ends.
    pub fn start(&self, request: RefreshRequest) -> oneshot::Receiver<()> {
        let user = request.user_id;
        let alive = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = oneshot::channel();

        let ctx = LoopCtx {
            mux: Arc::clone(&self.mux),
            delivery: Arc::clone(&self.delivery),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            capture_lines: self.capture_lines,
            request,
            alive: Arc::clone(&alive),
        };
        let task = tokio::spawn(async move {
            run_loop(ctx).await;
            let _ = done_tx.send(());
        });

        self.registry.store_refresh(user, RefreshHandle::new(alive, task));
        done_rx
    }

    /// Cancels the user's live loop, if any. Idempotent.
    pub fn cancel(&self, user: UserId) {
        self.registry.cancel_refresh(user);
    }
}

struct LoopCtx {
    mux: Arc<dyn Multiplexer>,
    delivery: Arc<SafeDelivery>,
    registry: Arc<Registry>,
    config: EngineConfig,
    capture_lines: usize,
    request: RefreshRequest,
    alive: Arc<AtomicBool>,
}

impl LoopCtx {
    fn is_live(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// The polling loop proper. Bridge and delivery calls all degrade
/// internally, so the only exits are the state machine's verdicts and
/// cancellation; anything unexpected ends this user's loop without touching
/// anyone else's.
async fn run_loop(ctx: LoopCtx) {
    let mut state = RefreshState::new(&ctx.config, Instant::now());
    let mut progress: Option<MessageRef> = None;

    loop {
        tokio::time::sleep(ctx.config.poll_interval()).await;
        if !ctx.is_live() {
            return;
        }

        let screen = ctx
            .mux
            .capture_pane(&ctx.request.session, ctx.capture_lines)
            .await;
        if !ctx.is_live() {
            return;
        }

        ctx.registry.touch(ctx.request.user_id);
        ctx.registry.cache_screen(ctx.request.user_id, &screen);

        let activity = screen::parse_activity(&screen);
        let now = Instant::now();
        match state.observe(&screen, &activity, now) {
            Verdict::Continue { edit_due } => {
                if edit_due {
                    let text = progress_text(&ctx, &state, &screen, now);
                    progress = update_progress(&ctx, progress, &text).await;
                    if !ctx.is_live() {
                        return;
                    }
                }
            }
            Verdict::Finish(ending) => {
                finish(&ctx, &state, ending, progress).await;
                return;
            }
        }
    }
}

fn progress_text(ctx: &LoopCtx, state: &RefreshState, screen: &str, now: Instant) -> String {
    let elapsed = state.elapsed(now).as_secs();
    match screen::reply_preview(screen, &ctx.request.prompt, PREVIEW_CHARS) {
        Some(preview) => format!("⏳ {}s — {}", elapsed, preview),
        None => {
            let tip = WAIT_TIPS[(state.polls() as usize / 3) % WAIT_TIPS.len()];
            format!("⏳ {}s — {}", elapsed, tip)
        }
    }
}

async fn update_progress(
    ctx: &LoopCtx,
    current: Option<MessageRef>,
    text: &str,
) -> Option<MessageRef> {
    match current {
        Some(id) => Some(ctx.delivery.edit_safe(ctx.request.chat_id, id, text).await),
        None => ctx.delivery.send_safe(ctx.request.chat_id, text).await,
    }
}

async fn finish(ctx: &LoopCtx, state: &RefreshState, ending: Ending, progress: Option<MessageRef>) {
    let final_screen = ctx
        .mux
        .capture_pane(&ctx.request.session, ctx.capture_lines)
        .await;
    if !ctx.is_live() {
        return;
    }

    match ending {
        Ending::TimedOut => {
            let note = format!(
                "⌛ No settle after {}s — live updates stopped; the session keeps running.",
                state.elapsed(Instant::now()).as_secs()
            );
            match progress {
                Some(id) => {
                    ctx.delivery.edit_safe(ctx.request.chat_id, id, &note).await;
                }
                None => {
                    ctx.delivery.send_safe(ctx.request.chat_id, &note).await;
                }
            }
        }
        Ending::Completed { forced } => {
            if forced {
                tracing::debug!(
                    session = %ctx.request.session,
                    "completion forced by the stability ceiling"
                );
            }
            let reply = screen::extract_reply(&final_screen, &ctx.request.prompt);
            let mut message = if reply.trim().is_empty() {
                "✅ Done (no visible output).".to_string()
            } else {
                format!("✅ Done\n{}", reply)
            };
            if let Some(warning) = screen::context_warning(&final_screen) {
                message.push_str("\n\n⚠️ ");
                message.push_str(&warning);
            }
            ctx.delivery.send_safe(ctx.request.chat_id, &message).await;

            let elapsed = state.elapsed(Instant::now());
            if elapsed >= ctx.config.notify_after() {
                notify::desktop(
                    "muxbridge",
                    &format!("Assistant reply ready in {}", ctx.request.session),
                );
            }
        }
    }
}
