mod refresh;
mod state;

pub use refresh::{RefreshEngine, RefreshRequest};
pub use state::{Ending, RefreshState, Verdict};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Handle to one user's live refresh task. Cancellation is cooperative: the
/// flag is flipped here and the loop re-checks it after every suspension
/// point before acting on resumed data.
pub struct RefreshHandle {
    alive: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub(crate) fn new(alive: Arc<AtomicBool>, task: JoinHandle<()>) -> Self {
        Self { alive, task }
    }

    /// Idempotent; safe to call on an already-stopped instance.
    pub fn cancel(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn is_live(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.task.is_finished()
    }
}
