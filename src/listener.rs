//! Provider event listener — the store's source of truth after the first
//! notification.
//!
//! DESIGN
//! ======
//! One task per application owns the subscription. Each event is handled to
//! completion (store write, then profile-sync dispatch) before the next one
//! is received, so store writes follow provider order exactly. Profile
//! upserts are detached and may finish in any order.
//!
//! Teardown is a oneshot stop signal checked between events; after it fires
//! the subscription is dropped and no further writes happen.

#[cfg(test)]
#[path = "listener_test.rs"]
mod tests;

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::model::AuthEvent;
use crate::profile_sync::ProfileSync;
use crate::provider::{AuthSubscription, IdentityProvider};
use crate::store::{SessionStore, WriteSource};

pub struct SessionListener {
    store: Arc<SessionStore>,
    profiles: ProfileSync,
}

impl SessionListener {
    #[must_use]
    pub fn new(store: Arc<SessionStore>, profiles: ProfileSync) -> Self {
        Self { store, profiles }
    }

    /// Apply one event: overwrite the stored session unconditionally, then
    /// kick off a profile sync when the event qualifies.
    pub fn handle_event(&self, event: AuthEvent) -> Option<JoinHandle<()>> {
        info!(
            event = %event.kind,
            user_id = ?event.session.as_ref().map(|s| s.user.id),
            "auth state change"
        );
        self.store.apply_session(event.session.clone(), WriteSource::Listener);
        self.profiles.on_event(&event)
    }

    /// Subscribe to `provider` and start handling events on a background task.
    pub async fn start(self, provider: &dyn IdentityProvider) -> ListenerHandle {
        let subscription = provider.on_auth_state_change().await;
        self.spawn(subscription)
    }

    /// Handle events from an existing subscription on a background task.
    #[must_use]
    pub fn spawn(self, mut subscription: AuthSubscription) -> ListenerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut handled = 0usize;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    event = subscription.recv() => {
                        let Some(event) = event else {
                            debug!("provider closed auth event stream");
                            break;
                        };
                        // Profile sync is fire-and-forget; the handle is dropped.
                        let _ = self.handle_event(event);
                        handled += 1;
                    }
                }
            }
            subscription.unsubscribe();
            debug!(handled, "auth listener stopped");
            handled
        });
        ListenerHandle { stop: Some(stop_tx), task }
    }
}

/// Owner's handle on the listener task. Dropping it also stops the listener.
pub struct ListenerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<usize>,
}

impl ListenerHandle {
    /// Unsubscribe and wait for the task to exit. Returns how many events
    /// were handled.
    pub async fn shutdown(mut self) -> usize {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        (&mut self.task).await.unwrap_or(0)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
