//! Seams to the external collaborators: identity provider, profile store,
//! and the router.
//!
//! SYSTEM CONTEXT
//! ==============
//! Bootstrap, listener, and callback components take these as explicit
//! `Arc<dyn ...>` parameters. Production wires in the HTTP client from
//! `supabase`; tests wire in fakes.

#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;

use std::fmt;
use std::str::FromStr;

use reqwest::Url;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::error::AuthError;
use crate::model::{AuthEvent, ProfileRecord, Session};

// =============================================================================
// OAUTH PROVIDERS
// =============================================================================

/// Third-party identity sources offered on the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
    Facebook,
    Azure,
    Gitlab,
    Discord,
}

impl OAuthProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Facebook => "facebook",
            Self::Azure => "azure",
            Self::Gitlab => "gitlab",
            Self::Discord => "discord",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            "facebook" => Ok(Self::Facebook),
            "azure" => Ok(Self::Azure),
            "gitlab" => Ok(Self::Gitlab),
            "discord" => Ok(Self::Discord),
            other => Err(AuthError::ConfigParse(format!("unknown OAuth provider: {other}"))),
        }
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Handle to the provider's auth event stream.
///
/// Events arrive in the order the provider emitted them. An optional
/// initial event is delivered before anything from the shared channel.
pub struct AuthSubscription {
    initial: Option<AuthEvent>,
    rx: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
    #[must_use]
    pub fn new(initial: Option<AuthEvent>, rx: broadcast::Receiver<AuthEvent>) -> Self {
        Self { initial, rx }
    }

    /// Next event, or `None` once the provider has shut its channel.
    ///
    /// A slow subscriber that fell behind skips the dropped events and
    /// resumes with the oldest one still retained.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        if let Some(event) = self.initial.take() {
            return Some(event);
        }
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "auth subscription lagged; dropped events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Stop delivery. The handle is consumed so nothing can be received after.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

// =============================================================================
// TRAITS
// =============================================================================

/// OAuth-capable identity provider.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Return the current session, `None` when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the provider cannot be reached or a
    /// token refresh is rejected.
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Subscribe to session-change notifications.
    async fn on_auth_state_change(&self) -> AuthSubscription;

    /// Build the consent-screen URL that begins an OAuth sign-in. The
    /// provider redirects back to `redirect_to` afterwards.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the authorize URL cannot be built.
    async fn sign_in_with_oauth(&self, provider: OAuthProvider, redirect_to: &str) -> Result<Url, AuthError>;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when local sign-out state cannot be cleared.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Consume authorization artifacts from the OAuth redirect URL. Providers
    /// that detect the session themselves keep the default no-op.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the URL carries an OAuth error or the
    /// code/token exchange fails.
    async fn complete_callback(&self, _url: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Remote `profiles` table.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert or replace the row keyed by `record.id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ProfileUpsert`] when the store rejects the write.
    async fn upsert_profile(&self, record: &ProfileRecord) -> Result<(), AuthError>;
}

/// Client-side router.
pub trait Navigator: Send + Sync {
    /// Navigate to `route`, replacing the current history entry.
    fn replace(&self, route: &str);
}
