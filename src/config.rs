//! Provider configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! The provider URL and public (anon) key are required; without them the
//! provider client is never constructed and startup fails. The web build
//! historically used `NEXT_PUBLIC_*` / `REACT_APP_*` names, so those are
//! accepted as fallbacks.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use crate::error::AuthError;

pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";
pub const DEFAULT_LANDING_ROUTE: &str = "/dashboard";
pub const DEFAULT_CALLBACK_ROUTE: &str = "/auth/callback";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const URL_VARS: [&str; 3] = ["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL", "REACT_APP_SUPABASE_URL"];
const ANON_KEY_VARS: [&str; 3] = ["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY", "REACT_APP_SUPABASE_ANON_KEY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Identity provider base URL, without trailing slash.
    pub supabase_url: String,
    pub anon_key: String,
    /// Origin the OAuth redirect comes back to.
    pub site_url: String,
    pub landing_route: String,
    pub callback_route: String,
    pub timeouts: HttpTimeouts,
}

impl AuthConfig {
    /// Build typed config from the process environment.
    ///
    /// `.env.local` and `.env` are loaded first when present; values already
    /// in the environment win.
    ///
    /// Required:
    /// - `SUPABASE_URL` (or `NEXT_PUBLIC_SUPABASE_URL`, `REACT_APP_SUPABASE_URL`)
    /// - `SUPABASE_ANON_KEY` (or `NEXT_PUBLIC_SUPABASE_ANON_KEY`, `REACT_APP_SUPABASE_ANON_KEY`)
    ///
    /// Optional:
    /// - `SITE_URL`: default `http://localhost:3000`
    /// - `AUTH_LANDING_ROUTE`: default `/dashboard`
    /// - `AUTH_CALLBACK_ROUTE`: default `/auth/callback`
    /// - `AUTH_REQUEST_TIMEOUT_SECS`: default 30
    /// - `AUTH_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigurationMissing`] when a required value is absent.
    pub fn from_env() -> Result<Self, AuthError> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigurationMissing`] when a required value is
    /// absent, or [`AuthError::ConfigParse`] when a timeout is not a number.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let supabase_url = first_present(&lookup, &URL_VARS)?
            .trim_end_matches('/')
            .to_owned();
        let anon_key = first_present(&lookup, &ANON_KEY_VARS)?;

        let site_url = lookup("SITE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SITE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let landing_route = route_or(lookup("AUTH_LANDING_ROUTE"), DEFAULT_LANDING_ROUTE);
        let callback_route = route_or(lookup("AUTH_CALLBACK_ROUTE"), DEFAULT_CALLBACK_ROUTE);

        let timeouts = HttpTimeouts {
            request_secs: parse_u64(&lookup, "AUTH_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_u64(&lookup, "AUTH_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        Ok(Self { supabase_url, anon_key, site_url, landing_route, callback_route, timeouts })
    }

    /// Absolute URL the provider redirects back to after consent.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.site_url, self.callback_route)
    }
}

fn first_present<F>(lookup: &F, keys: &[&str]) -> Result<String, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.trim().is_empty())
        .ok_or_else(|| AuthError::ConfigurationMissing { vars: keys.join(", ") })
}

fn route_or(raw: Option<String>, default: &str) -> String {
    match raw.map(|v| v.trim().to_owned()) {
        Some(v) if v.starts_with('/') => v,
        Some(v) if !v.is_empty() => format!("/{v}"),
        _ => default.to_owned(),
    }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> Result<u64, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| AuthError::ConfigParse(format!("{key} must be a whole number of seconds, got '{raw}'"))),
    }
}
