//! Auth runtime — single owner of the session store and its producers.
//!
//! ARCHITECTURE
//! ============
//! `start` builds the store, subscribes the listener, then spawns the
//! bootstrap fetch. Subscribing first means no provider event can slip
//! between the fetch and the subscription. `shutdown` tears the scope down:
//! the liveness flag drops any in-flight bootstrap result and the listener
//! unsubscribes before returning.

#[cfg(test)]
#[path = "runtime_test.rs"]
mod tests;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::bootstrap::{Liveness, SessionBootstrap};
use crate::listener::{ListenerHandle, SessionListener};
use crate::profile_sync::ProfileSync;
use crate::provider::{IdentityProvider, ProfileStore};
use crate::store::{AuthState, SessionStore, WritePolicy};

pub struct AuthRuntime {
    store: Arc<SessionStore>,
    liveness: Liveness,
    listener: ListenerHandle,
}

impl AuthRuntime {
    /// Start the listener and bootstrap against `provider`.
    pub async fn start(
        provider: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        policy: WritePolicy,
    ) -> Self {
        let store = Arc::new(SessionStore::new(policy));
        let liveness = Liveness::new();

        let listener = SessionListener::new(Arc::clone(&store), ProfileSync::new(profiles))
            .start(provider.as_ref())
            .await;
        // Detached: teardown is handled by the liveness flag, not by abort.
        drop(SessionBootstrap::new(provider, Arc::clone(&store), liveness.clone()).spawn());

        info!(?policy, "auth runtime started");
        Self { store, liveness, listener }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.store.snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.store.subscribe()
    }

    /// Wait until `loading` has cleared and return that state.
    pub async fn loaded(&self) -> AuthState {
        let mut rx = self.store.subscribe();
        match rx.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.store.snapshot(),
        }
    }

    /// Tear down the owning scope. No store writes happen after this returns.
    pub async fn shutdown(self) {
        self.liveness.kill();
        let handled = self.listener.shutdown().await;
        info!(handled, "auth runtime stopped");
    }
}
