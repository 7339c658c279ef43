//! Observable auth-session state for the current browser user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route guards and user-aware components read snapshots or subscribe to
//! changes. Only the bootstrap fetch and the provider listener write.
//!
//! DESIGN
//! ======
//! State lives in a `tokio::sync::watch` channel, so every write is visible
//! to subscribers on their next poll. Writers are serialized by the channel's
//! internal lock; the write-policy check runs inside that lock.
//!
//! TRADE-OFFS
//! ==========
//! `WritePolicy::ListenerWins` drops a bootstrap result that lands after any
//! listener event. That removes the overlap window where a stale fetch could
//! overwrite a fresher event. `LastWriteWins` keeps the plain overwrite race
//! for callers that need the historical behavior.

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::debug;

use crate::model::{Identity, Session};

/// Authentication state tracking the current session and loading status.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthState {
    pub identity: Option<Identity>,
    pub session: Option<Session>,
    /// True until the first of bootstrap completion or first listener event.
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self { identity: None, session: None, loading: true }
    }
}

impl AuthState {
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }
}

/// How a bootstrap write is reconciled against listener writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WritePolicy {
    /// Once the listener has written, bootstrap results only clear `loading`.
    #[default]
    ListenerWins,
    /// Every write overwrites, whichever lands last.
    LastWriteWins,
}

/// Which producer is writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteSource {
    Bootstrap,
    Listener,
}

pub struct SessionStore {
    tx: watch::Sender<AuthState>,
    policy: WritePolicy,
    listener_applied: AtomicBool,
}

impl SessionStore {
    #[must_use]
    pub fn new(policy: WritePolicy) -> Self {
        let (tx, _) = watch::channel(AuthState::default());
        Self { tx, policy, listener_applied: AtomicBool::new(false) }
    }

    #[must_use]
    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    /// Receiver that observes every subsequent write.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Apply a new session snapshot. Returns whether the session was stored.
    ///
    /// Listener writes always land and clear `loading`. Bootstrap writes are
    /// subject to the store's [`WritePolicy`] and leave `loading` to
    /// [`SessionStore::mark_bootstrap_complete`].
    pub(crate) fn apply_session(&self, session: Option<Session>, source: WriteSource) -> bool {
        let identity = session.as_ref().map(|s| s.user.clone());
        let user_id = identity.as_ref().map(|i| i.id);
        let applied = self.tx.send_if_modified(|state| {
            if source == WriteSource::Bootstrap
                && self.policy == WritePolicy::ListenerWins
                && self.listener_applied.load(Ordering::Acquire)
            {
                return false;
            }
            if source == WriteSource::Listener {
                self.listener_applied.store(true, Ordering::Release);
                state.loading = false;
            }
            state.identity = identity;
            state.session = session;
            true
        });
        debug!(?source, ?user_id, applied, "session snapshot write");
        applied
    }

    /// Clear `loading`. Idempotent; `loading` never becomes true again.
    pub(crate) fn mark_bootstrap_complete(&self) {
        self.tx.send_if_modified(|state| {
            let was_loading = state.loading;
            state.loading = false;
            was_loading
        });
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(WritePolicy::default())
    }
}
