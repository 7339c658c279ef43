//! Session, identity, and auth-event types.
//!
//! DESIGN
//! ======
//! `Session` and `Identity` mirror the provider's JSON shape so HTTP
//! responses deserialize directly. Profile metadata stays a free-form map;
//! `ProfileRecord::from_identity` is the only place that interprets it.

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::AuthError;

const NAME_KEYS: [&str; 3] = ["full_name", "name", "fullName"];
const AVATAR_KEYS: [&str; 2] = ["avatar_url", "picture"];

// =============================================================================
// IDENTITY / SESSION
// =============================================================================

/// The authenticated user as described by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl Identity {
    /// First non-empty string value among `keys` in the user metadata.
    #[must_use]
    pub fn metadata_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.user_metadata.get(*key))
            .filter_map(Value::as_str)
            .find(|s| !s.is_empty())
    }
}

/// Provider-issued proof of authentication plus the identity it belongs to.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<u64>,
    pub user: Identity,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

impl Session {
    /// Fill `expires_at` from `expires_in` when the provider only sent the latter.
    #[must_use]
    pub fn with_absolute_expiry(mut self, now_secs: u64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now_secs.saturating_add(secs));
        }
        self
    }

    /// Whether the token expires within `margin_secs` of `now_secs`.
    /// Sessions without an expiry never count as expiring.
    #[must_use]
    pub fn expires_within(&self, now_secs: u64, margin_secs: u64) -> bool {
        self.expires_at
            .is_some_and(|at| at <= now_secs.saturating_add(margin_secs))
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user.id)
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Current wall-clock time in unix seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

// =============================================================================
// AUTH EVENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl AuthEventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }

    /// Events after which the profile row is rewritten.
    #[must_use]
    pub fn triggers_profile_sync(self) -> bool {
        matches!(self, Self::SignedIn | Self::UserUpdated)
    }
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthEventKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIAL_SESSION" => Ok(Self::InitialSession),
            "SIGNED_IN" => Ok(Self::SignedIn),
            "SIGNED_OUT" => Ok(Self::SignedOut),
            "TOKEN_REFRESHED" => Ok(Self::TokenRefreshed),
            "USER_UPDATED" => Ok(Self::UserUpdated),
            "PASSWORD_RECOVERY" => Ok(Self::PasswordRecovery),
            other => Err(AuthError::MalformedEvent(other.to_owned())),
        }
    }
}

/// A session-state transition reported by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    #[must_use]
    pub fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }
}

// =============================================================================
// PROFILE RECORD
// =============================================================================

/// Row upserted into the `profiles` table, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: Uuid,
    pub full_name: String,
    pub avatar_url: String,
}

impl ProfileRecord {
    /// Normalize provider metadata into a profile row.
    ///
    /// Name comes from the first non-empty of `full_name`, `name`, `fullName`;
    /// avatar from `avatar_url`, then `picture`. Missing values become `""`.
    #[must_use]
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            full_name: identity.metadata_str(&NAME_KEYS).unwrap_or_default().to_owned(),
            avatar_url: identity.metadata_str(&AVATAR_KEYS).unwrap_or_default().to_owned(),
        }
    }
}
