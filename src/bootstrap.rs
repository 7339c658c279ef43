//! One-shot startup fetch of any pre-existing session.
//!
//! ERROR HANDLING
//! ==============
//! A failed fetch is logged and treated as "nobody signed in"; `loading` is
//! cleared either way so the UI never sticks on a spinner.
//!
//! TRADE-OFFS
//! ==========
//! The fetch itself is not cancelled on teardown. Its result is dropped
//! instead. The store writes run under the liveness read lock, and `kill`
//! takes the write lock, so once `kill` returns no bootstrap write can land.

#[cfg(test)]
#[path = "bootstrap_test.rs"]
mod tests;

use std::sync::{Arc, PoisonError, RwLock};

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::provider::IdentityProvider;
use crate::store::{SessionStore, WriteSource};

/// Liveness flag for the UI scope that owns a store.
#[derive(Clone, Debug)]
pub struct Liveness(Arc<RwLock<bool>>);

impl Liveness {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(true)))
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the scope torn down. Irreversible.
    ///
    /// Blocks until any in-flight bootstrap write has finished.
    pub fn kill(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = false;
    }

    /// Run `f` only if the scope is still alive, holding off `kill` until it
    /// returns. `f` must not block or await.
    pub(crate) fn while_alive<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let alive = self.0.read().unwrap_or_else(PoisonError::into_inner);
        alive.then(f)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// What the bootstrap did with its fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The fetched session (or its absence) was written to the store.
    Applied { signed_in: bool },
    /// A listener event had already written; only `loading` was cleared.
    Superseded,
    /// The owning scope was gone; nothing was written.
    Abandoned,
}

pub struct SessionBootstrap {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<SessionStore>,
    liveness: Liveness,
}

impl SessionBootstrap {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<SessionStore>, liveness: Liveness) -> Self {
        Self { provider, store, liveness }
    }

    /// Fetch the current session once and publish it.
    pub async fn run(self) -> BootstrapOutcome {
        let session = match self.provider.get_current_session().await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, code = e.error_code(), "error getting session");
                None
            }
        };

        let signed_in = session.is_some();
        let written = self.liveness.while_alive(|| {
            let applied = self.store.apply_session(session, WriteSource::Bootstrap);
            self.store.mark_bootstrap_complete();
            applied
        });
        let Some(applied) = written else {
            debug!("bootstrap resolved after teardown; result dropped");
            return BootstrapOutcome::Abandoned;
        };

        if applied {
            info!(signed_in, "session bootstrap complete");
            BootstrapOutcome::Applied { signed_in }
        } else {
            debug!("bootstrap superseded by listener event");
            BootstrapOutcome::Superseded
        }
    }

    /// Run on a detached task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<BootstrapOutcome> {
        tokio::spawn(self.run())
    }
}
