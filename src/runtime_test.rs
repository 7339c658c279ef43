use std::time::Duration;

use super::*;
use crate::model::AuthEventKind;
use crate::testing::{FakeProvider, RecordingProfiles, session_for};

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn existing_session_is_loaded_at_start() {
    let session = session_for("Ann");
    let provider = Arc::new(FakeProvider::new(Some(session.clone())));
    let profiles = Arc::new(RecordingProfiles::new());

    let runtime = AuthRuntime::start(provider.clone(), profiles, WritePolicy::default()).await;
    let state = tokio::time::timeout(WAIT, runtime.loaded()).await.unwrap();

    assert!(!state.loading);
    assert_eq!(state.session, Some(session));
    assert_eq!(provider.fetches(), 1);
    runtime.shutdown().await;
}

#[tokio::test]
async fn listener_is_subscribed_before_bootstrap_fetch() {
    let provider = Arc::new(FakeProvider::new(None).gated());
    let profiles = Arc::new(RecordingProfiles::new());

    let runtime = AuthRuntime::start(provider.clone(), profiles.clone(), WritePolicy::ListenerWins).await;
    assert_eq!(provider.subscriber_count(), 1);

    let session = session_for("Ann");
    provider.emit(AuthEventKind::SignedIn, Some(session.clone()));
    let state = tokio::time::timeout(WAIT, runtime.loaded()).await.unwrap();
    assert_eq!(state.session, Some(session.clone()));

    // The stale "no session" bootstrap result must not undo the sign-in.
    provider.release();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(runtime.snapshot().session, Some(session));

    tokio::time::timeout(WAIT, async {
        while profiles.records().is_empty() {
            profiles.written.notified().await;
        }
    })
    .await
    .unwrap();
    runtime.shutdown().await;
}

#[tokio::test]
async fn shutdown_drops_pending_bootstrap_and_unsubscribes() {
    let provider = Arc::new(FakeProvider::new(Some(session_for("Late"))).gated());
    let profiles = Arc::new(RecordingProfiles::new());

    let runtime = AuthRuntime::start(provider.clone(), profiles, WritePolicy::default()).await;
    let store = Arc::clone(runtime.store());
    runtime.shutdown().await;
    assert_eq!(provider.subscriber_count(), 0);

    provider.release();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let state = store.snapshot();
    assert!(state.loading);
    assert!(state.session.is_none());
}
