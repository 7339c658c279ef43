//! OAuth redirect landing — finish sign-in, then leave the callback route.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs once when the browser arrives on the callback route. The provider
//! consumes the URL's tokens or code; this routine then does a single
//! session fetch and replaces the history entry with the landing route, so
//! back-navigation never returns to the callback URL.
//!
//! ERROR HANDLING
//! ==============
//! Neither an artifact-exchange failure nor a fetch failure blocks the
//! redirect. They are logged; the landing route's guard decides what the
//! user sees. There is no retry and no timeout beyond the one fetch.

#[cfg(test)]
#[path = "callback_test.rs"]
mod tests;

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::provider::{IdentityProvider, Navigator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackState {
    Waiting,
    Done,
}

/// Result of a callback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub signed_in: bool,
    pub navigated: bool,
}

pub struct CallbackRedirector {
    provider: Arc<dyn IdentityProvider>,
    navigator: Arc<dyn Navigator>,
    landing_route: String,
    state: CallbackState,
}

impl CallbackRedirector {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, navigator: Arc<dyn Navigator>, landing_route: impl Into<String>) -> Self {
        Self { provider, navigator, landing_route: landing_route.into(), state: CallbackState::Waiting }
    }

    #[must_use]
    pub fn state(&self) -> CallbackState {
        self.state
    }

    /// Handle arrival on `callback_url`. Navigates at most once per redirector.
    pub async fn handle(&mut self, callback_url: &str) -> CallbackOutcome {
        if self.state == CallbackState::Done {
            debug!("callback already handled");
            return CallbackOutcome { signed_in: false, navigated: false };
        }

        if let Err(e) = self.provider.complete_callback(callback_url).await {
            error!(error = %e, code = e.error_code(), "auth callback exchange failed");
        }

        let signed_in = match self.provider.get_current_session().await {
            Ok(session) => session.is_some(),
            Err(e) => {
                error!(error = %e, code = e.error_code(), "auth callback error");
                false
            }
        };

        self.state = CallbackState::Done;
        info!(signed_in, route = %self.landing_route, "auth callback complete");
        self.navigator.replace(&self.landing_route);
        CallbackOutcome { signed_in, navigated: true }
    }
}
