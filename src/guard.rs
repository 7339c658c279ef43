//! Shared auth route helpers.
//!
//! SYSTEM CONTEXT
//! ==============
//! Authenticated routes apply identical unauthenticated redirect behavior,
//! and every sign-in button builds the same callback redirect.

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;

use reqwest::Url;
use tracing::info;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::provider::{IdentityProvider, OAuthProvider};
use crate::store::AuthState;

pub const LOGIN_ROUTE: &str = "/login";

/// Redirect to `/login` once auth has loaded and nobody is signed in.
#[must_use]
pub fn should_redirect_unauth(state: &AuthState) -> bool {
    !state.loading && state.session.is_none()
}

/// Route an authenticated page should be replaced with, if any.
#[must_use]
pub fn unauth_redirect(state: &AuthState) -> Option<&'static str> {
    should_redirect_unauth(state).then_some(LOGIN_ROUTE)
}

/// Begin an OAuth sign-in that returns to the configured callback route.
///
/// # Errors
///
/// Returns an [`AuthError`] if the provider cannot build the consent URL.
pub async fn sign_in(provider: &dyn IdentityProvider, oauth: OAuthProvider, config: &AuthConfig) -> Result<Url, AuthError> {
    let redirect_to = config.callback_url();
    let url = provider.sign_in_with_oauth(oauth, &redirect_to).await?;
    info!(provider = %oauth, %redirect_to, "oauth sign-in started");
    Ok(url)
}
