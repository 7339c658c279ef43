use serde_json::{Map, json};
use uuid::Uuid;

use super::*;
use crate::model::AuthEventKind;
use crate::testing::{RecordingProfiles, session_for, session_with_metadata};

fn metadata(value: serde_json::Value) -> Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}

async fn sync_once(event: AuthEvent) -> Vec<ProfileRecord> {
    let profiles = Arc::new(RecordingProfiles::new());
    let sync = ProfileSync::new(profiles.clone());
    if let Some(handle) = sync.on_event(&event) {
        handle.await.unwrap();
    }
    profiles.records()
}

// =============================================================================
// qualifying events
// =============================================================================

#[tokio::test]
async fn signed_in_upserts_exact_record() {
    let session = session_with_metadata(metadata(json!({ "full_name": "Ann", "avatar_url": "x" })));
    let id = session.user.id;

    let records = sync_once(AuthEvent::new(AuthEventKind::SignedIn, Some(session))).await;

    assert_eq!(records, vec![ProfileRecord { id, full_name: "Ann".into(), avatar_url: "x".into() }]);
}

#[tokio::test]
async fn signed_in_with_only_name_uses_name() {
    let session = session_with_metadata(metadata(json!({ "name": "Bob" })));
    let records = sync_once(AuthEvent::new(AuthEventKind::SignedIn, Some(session))).await;
    assert_eq!(records[0].full_name, "Bob");
}

#[tokio::test]
async fn signed_in_without_name_keys_upserts_empty_name() {
    let session = session_with_metadata(Map::new());
    let records = sync_once(AuthEvent::new(AuthEventKind::SignedIn, Some(session))).await;
    assert_eq!(records[0].full_name, "");
    assert_eq!(records[0].avatar_url, "");
}

#[tokio::test]
async fn user_updated_also_upserts() {
    let records = sync_once(AuthEvent::new(AuthEventKind::UserUpdated, Some(session_for("Cleo")))).await;
    assert_eq!(records.len(), 1);
    assert_ne!(records[0].id, Uuid::nil());
}

// =============================================================================
// non-qualifying events
// =============================================================================

#[tokio::test]
async fn other_event_kinds_do_not_upsert() {
    for kind in [AuthEventKind::InitialSession, AuthEventKind::TokenRefreshed, AuthEventKind::SignedOut] {
        let records = sync_once(AuthEvent::new(kind, Some(session_for("Ann")))).await;
        assert!(records.is_empty(), "{kind} must not sync");
    }
}

#[tokio::test]
async fn signed_in_without_session_does_not_upsert() {
    let profiles = Arc::new(RecordingProfiles::new());
    let sync = ProfileSync::new(profiles.clone());
    assert!(sync.on_event(&AuthEvent::new(AuthEventKind::SignedIn, None)).is_none());
    assert!(profiles.records().is_empty());
}

// =============================================================================
// failures
// =============================================================================

#[tokio::test]
async fn upsert_failure_is_swallowed() {
    let profiles = Arc::new(RecordingProfiles::failing());
    let sync = ProfileSync::new(profiles.clone());
    let handle = sync
        .on_event(&AuthEvent::new(AuthEventKind::SignedIn, Some(session_for("Ann"))))
        .unwrap();

    // The task completes normally; the error never escapes.
    handle.await.unwrap();
    assert_eq!(profiles.records().len(), 1);
}
