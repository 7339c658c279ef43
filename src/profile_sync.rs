//! Profile sync — mirror sign-in identity into the `profiles` table.
//!
//! DESIGN
//! ======
//! The upsert runs on a detached task. The event handler that triggers it
//! returns immediately, so session-state updates never wait on the profile
//! store and the next auth event is not held back by it.
//!
//! ERROR HANDLING
//! ==============
//! Failures are logged and dropped. There is no retry: the row stays stale
//! until the next sign-in or user-update event.

#[cfg(test)]
#[path = "profile_sync_test.rs"]
mod tests;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::model::{AuthEvent, ProfileRecord};
use crate::provider::ProfileStore;

#[derive(Clone)]
pub struct ProfileSync {
    store: Arc<dyn ProfileStore>,
}

impl ProfileSync {
    #[must_use]
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Spawn an upsert if `event` qualifies. Returns the detached task so
    /// tests can await it; production callers drop the handle.
    pub fn on_event(&self, event: &AuthEvent) -> Option<JoinHandle<()>> {
        if !event.kind.triggers_profile_sync() {
            return None;
        }
        let session = event.session.as_ref()?;
        let record = ProfileRecord::from_identity(&session.user);
        Some(self.spawn_upsert(record))
    }

    fn spawn_upsert(&self, record: ProfileRecord) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match store.upsert_profile(&record).await {
                Ok(()) => debug!(user_id = %record.id, "profile upserted"),
                Err(e) => warn!(user_id = %record.id, error = %e, code = e.error_code(), "profile upsert failed"),
            }
        })
    }
}
