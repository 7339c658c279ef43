//! Test doubles for the provider seams.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::Url;
use serde_json::{Map, Value, json};
use tokio::sync::{Notify, broadcast};
use uuid::Uuid;

use crate::error::AuthError;
use crate::model::{AuthEvent, AuthEventKind, Identity, ProfileRecord, Session};
use crate::provider::{AuthSubscription, IdentityProvider, Navigator, OAuthProvider, ProfileStore};

/// Session for a fresh user whose metadata carries `full_name`.
pub fn session_for(full_name: &str) -> Session {
    let mut metadata = Map::new();
    metadata.insert("full_name".into(), json!(full_name));
    session_with_metadata(metadata)
}

pub fn session_with_metadata(user_metadata: Map<String, Value>) -> Session {
    Session {
        access_token: format!("token-{}", Uuid::new_v4()),
        refresh_token: Some("refresh".into()),
        token_type: "bearer".into(),
        expires_in: Some(3600),
        expires_at: None,
        user: Identity { id: Uuid::new_v4(), email: Some("user@example.com".into()), user_metadata },
    }
}

// =============================================================================
// FakeProvider
// =============================================================================

/// Scripted identity provider.
///
/// `get_current_session` optionally parks on `gate` until the test releases
/// it, which lets tests order the bootstrap fetch against listener events.
pub struct FakeProvider {
    session: Mutex<Result<Option<Session>, String>>,
    events: broadcast::Sender<AuthEvent>,
    initial_event: bool,
    pub gate: Option<Notify>,
    pub fetch_calls: AtomicUsize,
    pub callback_urls: Mutex<Vec<String>>,
    pub callback_error: Mutex<Option<AuthError>>,
}

impl FakeProvider {
    pub fn new(session: Option<Session>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            session: Mutex::new(Ok(session)),
            events,
            initial_event: false,
            gate: None,
            fetch_calls: AtomicUsize::new(0),
            callback_urls: Mutex::new(Vec::new()),
            callback_error: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        let provider = Self::new(None);
        *provider.session.lock().unwrap() = Err(message.to_owned());
        provider
    }

    /// Hold `get_current_session` until [`FakeProvider::release`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    /// Emit a synthetic `INITIAL_SESSION` to each new subscriber.
    pub fn with_initial_event(mut self) -> Self {
        self.initial_event = true;
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        let _ = self.events.send(AuthEvent::new(kind, session));
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FakeProvider {
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.session
            .lock()
            .unwrap()
            .clone()
            .map_err(AuthError::SessionFetch)
    }

    async fn on_auth_state_change(&self) -> AuthSubscription {
        let initial = if self.initial_event {
            let current = self.session.lock().unwrap().clone().ok().flatten();
            Some(AuthEvent::new(AuthEventKind::InitialSession, current))
        } else {
            None
        };
        AuthSubscription::new(initial, self.events.subscribe())
    }

    async fn sign_in_with_oauth(&self, provider: OAuthProvider, redirect_to: &str) -> Result<Url, AuthError> {
        let mut url = Url::parse("https://fake.provider/authorize").map_err(|e| AuthError::ApiParse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to);
        Ok(url)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.session.lock().unwrap() = Ok(None);
        self.emit(AuthEventKind::SignedOut, None);
        Ok(())
    }

    async fn complete_callback(&self, url: &str) -> Result<(), AuthError> {
        self.callback_urls.lock().unwrap().push(url.to_owned());
        match self.callback_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// =============================================================================
// RecordingProfiles
// =============================================================================

/// Profile store that records upserts, optionally failing every call.
pub struct RecordingProfiles {
    pub records: Mutex<Vec<ProfileRecord>>,
    pub fail: bool,
    pub written: Notify,
}

impl RecordingProfiles {
    pub fn new() -> Self {
        Self { records: Mutex::new(Vec::new()), fail: false, written: Notify::new() }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    pub fn records(&self) -> Vec<ProfileRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ProfileStore for RecordingProfiles {
    async fn upsert_profile(&self, record: &ProfileRecord) -> Result<(), AuthError> {
        self.records.lock().unwrap().push(record.clone());
        self.written.notify_one();
        if self.fail {
            return Err(AuthError::ProfileUpsert("store unavailable".into()));
        }
        Ok(())
    }
}

// =============================================================================
// RecordingNavigator
// =============================================================================

#[derive(Default)]
pub struct RecordingNavigator {
    pub routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn replace(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_owned());
    }
}
