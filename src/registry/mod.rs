use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::engine::RefreshHandle;
use crate::models::UserId;

/// How long a user may stay idle before the sweeper evicts their state.
pub const INACTIVE_TTL: Duration = Duration::from_secs(60 * 60);

/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Everything the bridge remembers about one user. Partitioned under a
/// single per-user entry so eviction removes all of it at once, and so no
/// user's mutation can touch another user's state.
struct UserState {
    session: Option<String>,
    last_screen: Option<String>,
    last_command: Option<String>,
    pending_confirmation: Option<String>,
    refresh: Option<RefreshHandle>,
    last_active: Instant,
}

impl UserState {
    fn new() -> Self {
        Self {
            session: None,
            last_screen: None,
            last_command: None,
            pending_confirmation: None,
            refresh: None,
            last_active: Instant::now(),
        }
    }
}

/// In-memory per-user attachment registry. The attached multiplexer session
/// name here is distinct from durable `Session` records: non-interactive
/// shell sessions keep their own working directory.
#[derive(Default)]
pub struct Registry {
    inner: Mutex<HashMap<UserId, UserState>>,
}

fn lock(inner: &Mutex<HashMap<UserId, UserState>>) -> MutexGuard<'_, HashMap<UserId, UserState>> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, user: UserId, session: &str) {
        let mut users = lock(&self.inner);
        let state = users.entry(user).or_insert_with(UserState::new);
        state.session = Some(session.to_string());
        state.last_active = Instant::now();
    }

    /// Detaches the user and cancels any live refresh loop. Returns the
    /// session name that was attached, if any.
    pub fn detach(&self, user: UserId) -> Option<String> {
        let mut users = lock(&self.inner);
        let state = users.get_mut(&user)?;
        if let Some(refresh) = state.refresh.take() {
            refresh.cancel();
        }
        state.last_active = Instant::now();
        state.session.take()
    }

    #[allow(dead_code)]
    pub fn is_attached(&self, user: UserId) -> bool {
        lock(&self.inner)
            .get(&user)
            .is_some_and(|s| s.session.is_some())
    }

    #[allow(dead_code)]
    pub fn current_session(&self, user: UserId) -> Option<String> {
        lock(&self.inner).get(&user).and_then(|s| s.session.clone())
    }

    pub fn touch(&self, user: UserId) {
        let mut users = lock(&self.inner);
        users
            .entry(user)
            .or_insert_with(UserState::new)
            .last_active = Instant::now();
    }

    pub fn cache_screen(&self, user: UserId, screen: &str) {
        let mut users = lock(&self.inner);
        users
            .entry(user)
            .or_insert_with(UserState::new)
            .last_screen = Some(screen.to_string());
    }

    #[allow(dead_code)]
    pub fn cached_screen(&self, user: UserId) -> Option<String> {
        lock(&self.inner)
            .get(&user)
            .and_then(|s| s.last_screen.clone())
    }

    #[allow(dead_code)]
    pub fn remember_command(&self, user: UserId, command: &str) {
        let mut users = lock(&self.inner);
        users
            .entry(user)
            .or_insert_with(UserState::new)
            .last_command = Some(command.to_string());
    }

    #[allow(dead_code)]
    pub fn last_command(&self, user: UserId) -> Option<String> {
        lock(&self.inner)
            .get(&user)
            .and_then(|s| s.last_command.clone())
    }

    #[allow(dead_code)]
    pub fn set_pending_confirmation(&self, user: UserId, action: &str) {
        let mut users = lock(&self.inner);
        users
            .entry(user)
            .or_insert_with(UserState::new)
            .pending_confirmation = Some(action.to_string());
    }

    #[allow(dead_code)]
    pub fn take_pending_confirmation(&self, user: UserId) -> Option<String> {
        lock(&self.inner)
            .get_mut(&user)
            .and_then(|s| s.pending_confirmation.take())
    }

    /// Installs a new refresh handle for the user, cancelling any prior one.
    /// At most one live refresh instance exists per user.
    pub fn store_refresh(&self, user: UserId, handle: RefreshHandle) {
        let mut users = lock(&self.inner);
        let state = users.entry(user).or_insert_with(UserState::new);
        state.last_active = Instant::now();
        if let Some(old) = state.refresh.replace(handle) {
            old.cancel();
        }
    }

    /// Idempotent: cancelling a user with no live refresh is a no-op.
    pub fn cancel_refresh(&self, user: UserId) {
        let mut users = lock(&self.inner);
        if let Some(state) = users.get_mut(&user) {
            if let Some(refresh) = state.refresh.take() {
                refresh.cancel();
            }
        }
    }

    /// Evicts all state for users inactive beyond `ttl`, cancelling their
    /// refresh loops. Returns how many users were evicted.
    pub fn sweep_inactive(&self, ttl: Duration) -> usize {
        let mut users = lock(&self.inner);
        let before = users.len();
        users.retain(|user, state| {
            if state.last_active.elapsed() <= ttl {
                return true;
            }
            if let Some(refresh) = state.refresh.take() {
                refresh.cancel();
            }
            tracing::debug!(user, "evicting inactive user state");
            false
        });
        before - users.len()
    }

    /// Spawns the hourly sweep, bounding memory under long uptime with many
    /// users.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                let evicted = registry.sweep_inactive(INACTIVE_TTL);
                if evicted > 0 {
                    tracing::info!(evicted, "registry sweep evicted inactive users");
                }
            }
        })
    }

    #[cfg(test)]
    fn backdate(&self, user: UserId, age: Duration) {
        let mut users = lock(&self.inner);
        if let Some(state) = users.get_mut(&user) {
            if let Some(then) = Instant::now().checked_sub(age) {
                state.last_active = then;
            }
        }
    }
}
