//! Supabase client — GoTrue auth endpoints and the PostgREST `profiles` table.
//!
//! ARCHITECTURE
//! ============
//! The client owns the current session in memory and is the only emitter of
//! auth events. Every state change goes through `store_session`, which
//! updates the held session and broadcasts the event in one step, so
//! subscribers see changes in the order they happened.
//!
//! OAuth uses PKCE with the `plain` challenge method: the verifier minted by
//! `sign_in_with_oauth` is remembered and spent by the callback exchange.
//! Implicit-flow redirects (`#access_token=...`) are accepted too.
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx responses surface as `ApiResponse { status, body }`. A rejected
//! token refresh signs the user out locally before the error is returned.
//! Sign-out clears local state even when the remote logout call fails.

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;

use std::fmt::Write;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::model::{AuthEvent, AuthEventKind, Identity, ProfileRecord, Session, unix_now};
use crate::provider::{AuthSubscription, IdentityProvider, OAuthProvider, ProfileStore};

const EVENT_CHANNEL_CAPACITY: usize = 64;
const REFRESH_MARGIN_SECS: u64 = 30;
const PROFILES_TABLE: &str = "profiles";

// =============================================================================
// HELPERS
// =============================================================================

/// Lowercase hex, two digits per byte.
pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

/// Random 32-byte hex PKCE verifier (64 chars, inside the 43..=128 range).
#[must_use]
pub(crate) fn generate_code_verifier() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    encode_hex(&bytes)
}

pub(crate) fn token_endpoint(base_url: &str, grant_type: &str) -> String {
    format!("{base_url}/auth/v1/token?grant_type={grant_type}")
}

pub(crate) fn table_endpoint(base_url: &str, table: &str) -> String {
    format!("{base_url}/rest/v1/{table}")
}

pub(crate) fn authorize_url(
    base_url: &str,
    provider: OAuthProvider,
    redirect_to: &str,
    code_challenge: &str,
) -> Result<Url, AuthError> {
    let mut url = Url::parse(&format!("{base_url}/auth/v1/authorize"))
        .map_err(|e| AuthError::ConfigParse(format!("invalid provider URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("provider", provider.as_str())
        .append_pair("redirect_to", redirect_to)
        .append_pair("code_challenge", code_challenge)
        .append_pair("code_challenge_method", "plain");
    Ok(url)
}

/// Authorization artifacts carried by an OAuth redirect URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CallbackArtifacts {
    Tokens {
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<u64>,
        token_type: Option<String>,
    },
    Code(String),
}

fn fragment_pairs(url: &Url) -> Vec<(String, String)> {
    let Some(fragment) = url.fragment().filter(|f| !f.is_empty()) else {
        return Vec::new();
    };
    // Reuse the query decoder for the fragment's form encoding.
    let mut scratch = url.clone();
    scratch.set_fragment(None);
    scratch.set_query(Some(fragment));
    scratch.query_pairs().into_owned().collect()
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.as_str())
}

pub(crate) fn parse_callback(url: &Url) -> Result<CallbackArtifacts, AuthError> {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    pairs.extend(fragment_pairs(url));

    if let Some(code) = lookup(&pairs, "error") {
        let description = lookup(&pairs, "error_description").unwrap_or(code).to_owned();
        return Err(AuthError::Provider { code: code.to_owned(), description });
    }

    if let Some(access_token) = lookup(&pairs, "access_token") {
        return Ok(CallbackArtifacts::Tokens {
            access_token: access_token.to_owned(),
            refresh_token: lookup(&pairs, "refresh_token").map(str::to_owned),
            expires_in: lookup(&pairs, "expires_in").and_then(|v| v.parse().ok()),
            token_type: lookup(&pairs, "token_type").map(str::to_owned),
        });
    }

    lookup(&pairs, "code")
        .map(|code| CallbackArtifacts::Code(code.to_owned()))
        .ok_or(AuthError::MissingCallbackArtifacts)
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, AuthError> {
    let status = resp.status().as_u16();
    let text = resp
        .text()
        .await
        .map_err(|e| AuthError::ApiRequest(e.to_string()))?;
    if !(200..300).contains(&status) {
        return Err(AuthError::ApiResponse { status, body: text });
    }
    serde_json::from_str(&text).map_err(|e| AuthError::ApiParse(e.to_string()))
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<Session>>,
    code_verifier: Mutex<Option<String>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SupabaseClient {
    /// Build a client from typed config.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| AuthError::HttpClientBuild(e.to_string()))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            http,
            base_url: config.supabase_url.clone(),
            anon_key: config.anon_key.clone(),
            session: RwLock::new(None),
            code_verifier: Mutex::new(None),
            events,
        })
    }

    /// Seed the client with a session persisted by an earlier run. Emits no event.
    pub async fn restore_session(&self, session: Session) {
        *self.session.write().await = Some(session);
    }

    async fn store_session(&self, session: Option<Session>, kind: AuthEventKind) {
        let mut guard = self.session.write().await;
        *guard = session.clone();
        // Send under the lock so event order matches write order.
        let _ = self.events.send(AuthEvent::new(kind, session));
        drop(guard);
        debug!(event = %kind, "auth event emitted");
    }

    async fn current_access_token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        let resp = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::ApiRequest(e.to_string()))?;
        read_json(resp).await
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, AuthError> {
        let resp = self
            .http
            .post(token_endpoint(&self.base_url, grant_type))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::ApiRequest(e.to_string()))?;
        let session: Session = read_json(resp).await?;
        Ok(session.with_absolute_expiry(unix_now()))
    }

    /// Exchange the current refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when no refresh token is held or the
    /// provider rejects it; in the latter case the session is cleared.
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
            .ok_or_else(|| AuthError::SessionFetch("no refresh token".into()))?;

        match self
            .token_grant("refresh_token", serde_json::json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(session) => {
                self.store_session(Some(session.clone()), AuthEventKind::TokenRefreshed)
                    .await;
                Ok(session)
            }
            Err(e @ AuthError::ApiResponse { status: 400..=499, .. }) => {
                warn!(error = %e, "token refresh rejected; signing out locally");
                self.store_session(None, AuthEventKind::SignedOut).await;
                Err(AuthError::SessionFetch(e.to_string()))
            }
            // Transport and server errors keep the session for a later retry.
            Err(e) => Err(AuthError::SessionFetch(e.to_string())),
        }
    }

    /// Consume the authorization artifacts on an OAuth redirect URL and
    /// store the resulting session.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the URL carries an OAuth error, has no
    /// artifacts, or the token/code exchange fails.
    pub async fn consume_callback_url(&self, callback_url: &str) -> Result<Session, AuthError> {
        let url = Url::parse(callback_url).map_err(|e| AuthError::ApiParse(format!("invalid callback URL: {e}")))?;
        let session = match parse_callback(&url)? {
            CallbackArtifacts::Tokens { access_token, refresh_token, expires_in, token_type } => {
                let user = self.fetch_user(&access_token).await?;
                Session {
                    access_token,
                    refresh_token,
                    token_type: token_type.unwrap_or_else(|| "bearer".to_owned()),
                    expires_in,
                    expires_at: None,
                    user,
                }
                .with_absolute_expiry(unix_now())
            }
            CallbackArtifacts::Code(code) => {
                let verifier = self
                    .code_verifier
                    .lock()
                    .map_err(|_| AuthError::SessionFetch("code verifier lock poisoned".into()))?
                    .clone()
                    .ok_or_else(|| AuthError::Provider {
                        code: "missing_code_verifier".into(),
                        description: "no sign-in was started from this client".into(),
                    })?;
                let session = self
                    .token_grant("pkce", serde_json::json!({ "auth_code": code, "code_verifier": verifier }))
                    .await?;
                // Spent only on success; a failed exchange can be retried.
                if let Ok(mut slot) = self.code_verifier.lock() {
                    if slot.as_deref() == Some(verifier.as_str()) {
                        *slot = None;
                    }
                }
                session
            }
        };
        info!(user_id = %session.user.id, "oauth callback consumed");
        self.store_session(Some(session.clone()), AuthEventKind::SignedIn)
            .await;
        Ok(session)
    }

    /// Re-arm a PKCE verifier minted by an earlier process, so a callback
    /// can be completed somewhere other than where sign-in started.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the verifier slot is poisoned.
    pub fn resume_pkce(&self, verifier: String) -> Result<(), AuthError> {
        *self
            .code_verifier
            .lock()
            .map_err(|_| AuthError::SessionFetch("code verifier lock poisoned".into()))? = Some(verifier);
        Ok(())
    }

    /// Sign in with a refresh token from an earlier session and emit `SIGNED_IN`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the provider rejects the token.
    pub async fn sign_in_with_refresh_token(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let session = self
            .token_grant("refresh_token", serde_json::json!({ "refresh_token": refresh_token }))
            .await?;
        self.store_session(Some(session.clone()), AuthEventKind::SignedIn)
            .await;
        Ok(session)
    }

    /// Replace the signed-in user's metadata and emit `USER_UPDATED`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when nobody is signed in or the provider
    /// rejects the update.
    pub async fn update_user_metadata(&self, metadata: Map<String, Value>) -> Result<Identity, AuthError> {
        let access_token = self
            .current_access_token()
            .await
            .ok_or_else(|| AuthError::SessionFetch("not signed in".into()))?;
        let resp = self
            .http
            .put(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&access_token)
            .json(&serde_json::json!({ "data": metadata }))
            .send()
            .await
            .map_err(|e| AuthError::ApiRequest(e.to_string()))?;
        let user: Identity = read_json(resp).await?;

        let updated = self.session.read().await.clone().map(|mut s| {
            s.user = user.clone();
            s
        });
        self.store_session(updated, AuthEventKind::UserUpdated).await;
        Ok(user)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for SupabaseClient {
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.session.read().await.clone() else {
            return Ok(None);
        };
        let now = unix_now();
        if !session.expires_within(now, REFRESH_MARGIN_SECS) {
            return Ok(Some(session));
        }
        if session.refresh_token.is_some() {
            return self.refresh_session().await.map(Some);
        }
        if session.expires_within(now, 0) {
            info!("session expired without refresh token");
            self.store_session(None, AuthEventKind::SignedOut).await;
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn on_auth_state_change(&self) -> AuthSubscription {
        let rx = self.events.subscribe();
        let current = self.session.read().await.clone();
        AuthSubscription::new(Some(AuthEvent::new(AuthEventKind::InitialSession, current)), rx)
    }

    async fn sign_in_with_oauth(&self, provider: OAuthProvider, redirect_to: &str) -> Result<Url, AuthError> {
        let verifier = generate_code_verifier();
        let url = authorize_url(&self.base_url, provider, redirect_to, &verifier)?;
        self.resume_pkce(verifier)?;
        Ok(url)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(access_token) = self.current_access_token().await {
            let result = self
                .http
                .post(format!("{}/auth/v1/logout", self.base_url))
                .header("apikey", &self.anon_key)
                .bearer_auth(&access_token)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => warn!(status = resp.status().as_u16(), "remote logout rejected"),
                Err(e) => warn!(error = %e, "remote logout failed"),
            }
        }
        self.store_session(None, AuthEventKind::SignedOut).await;
        Ok(())
    }

    async fn complete_callback(&self, url: &str) -> Result<(), AuthError> {
        self.consume_callback_url(url).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl ProfileStore for SupabaseClient {
    async fn upsert_profile(&self, record: &ProfileRecord) -> Result<(), AuthError> {
        let bearer = self
            .current_access_token()
            .await
            .unwrap_or_else(|| self.anon_key.clone());
        let resp = self
            .http
            .post(table_endpoint(&self.base_url, PROFILES_TABLE))
            .header("apikey", &self.anon_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .bearer_auth(bearer)
            .json(record)
            .send()
            .await
            .map_err(|e| AuthError::ProfileUpsert(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::ProfileUpsert(format!("{}: {body}", status.as_u16())));
        }
        Ok(())
    }
}
