// Session synchronizer state machine: atomic identity commits, defensive
// sign-out, observer subscriptions, and the provider event pump.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keywing::errors::CeremonyError;
use keywing::models::AuthState;
use keywing::provider::AuthEvent;
use keywing::session::{MemorySessionStore, SessionStore, SessionSynchronizer};
use keywing::testing::{provider_session, FlakySessionStore, MockIdentityProvider};

fn synchronizer() -> (
    Arc<MockIdentityProvider>,
    Arc<MemorySessionStore>,
    Arc<SessionSynchronizer>,
) {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemorySessionStore::new());
    let sync = Arc::new(SessionSynchronizer::new(
        Arc::clone(&provider) as Arc<dyn keywing::provider::IdentityProvider>,
        Arc::clone(&store) as Arc<dyn SessionStore>,
    ));
    (provider, store, sync)
}

/// Record every state-change notification
fn observe(sync: &SessionSynchronizer) -> (Arc<Mutex<Vec<AuthState>>>, keywing::session::ListenerHandle) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handle = sync.subscribe(Box::new(move |state| {
        sink.lock().unwrap().push(state.clone());
    }));
    (seen, handle)
}

async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 1s");
}

#[tokio::test]
async fn test_signed_in_commits_identity_and_token_together() {
    let (_, store, sync) = synchronizer();
    assert_eq!(sync.state(), AuthState::Loading);

    sync.apply(AuthEvent::SignedIn(provider_session("uid_1", "a@example.com")))
        .await;

    let state = sync.state();
    let AuthState::Authenticated(record) = state else {
        panic!("expected authenticated state, got {state:?}");
    };
    assert_eq!(record.user.uid, "uid_1");
    assert_eq!(record.user.email, "a@example.com");
    assert_eq!(record.bearer_token, "bearer-1");

    // The persisted record is the same full snapshot
    assert_eq!(store.load().await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_signed_out_clears_record_entirely() {
    let (_, store, sync) = synchronizer();
    sync.apply(AuthEvent::SignedIn(provider_session("uid_1", "a@example.com")))
        .await;

    let (seen, _handle) = observe(&sync);
    sync.apply(AuthEvent::SignedOut).await;

    assert_eq!(sync.state(), AuthState::Unauthenticated);
    // No partial record: everything is gone in one commit
    assert_eq!(store.load().await.unwrap(), None);
    assert_eq!(seen.lock().unwrap().as_slice(), &[AuthState::Unauthenticated]);
}

#[tokio::test]
async fn test_successive_sign_ins_never_mix_identities_and_tokens() {
    let (_, store, sync) = synchronizer();
    let (seen, _handle) = observe(&sync);

    sync.apply(AuthEvent::SignedIn(provider_session("uid_a", "a@example.com")))
        .await;
    sync.apply(AuthEvent::SignedIn(provider_session("uid_b", "b@example.com")))
        .await;

    // Tokens are issued in order, so a mixed commit would pair uid_a with
    // bearer-2 or uid_b with bearer-1
    for state in seen.lock().unwrap().iter() {
        if let AuthState::Authenticated(record) = state {
            match record.user.uid.as_str() {
                "uid_a" => assert_eq!(record.bearer_token, "bearer-1"),
                "uid_b" => assert_eq!(record.bearer_token, "bearer-2"),
                other => panic!("unexpected uid {other}"),
            }
        }
    }

    let persisted = store.load().await.unwrap().unwrap();
    assert_eq!(persisted.user.uid, "uid_b");
    assert_eq!(persisted.bearer_token, "bearer-2");
}

#[tokio::test]
async fn test_provider_error_never_leaves_loading() {
    let (_, store, sync) = synchronizer();

    sync.apply(AuthEvent::Error("resolution failed".to_string())).await;

    assert_eq!(sync.state(), AuthState::Unauthenticated);
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_token_issue_failure_during_sign_in_is_defensive_sign_out() {
    let (provider, store, sync) = synchronizer();
    provider.set_fail_token_refresh(true);

    sync.apply(AuthEvent::SignedIn(provider_session("uid_1", "a@example.com")))
        .await;

    assert_eq!(sync.state(), AuthState::Unauthenticated);
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_persist_failure_leaves_no_partial_record() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(FlakySessionStore::new());
    let sync = SessionSynchronizer::new(
        Arc::clone(&provider) as Arc<dyn keywing::provider::IdentityProvider>,
        Arc::clone(&store) as Arc<dyn SessionStore>,
    );
    store.set_fail_commits(true);

    sync.apply(AuthEvent::SignedIn(provider_session("uid_1", "a@example.com")))
        .await;

    assert_eq!(sync.state(), AuthState::Unauthenticated);
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_refresh_replaces_token_without_state_change() {
    let (_, store, sync) = synchronizer();
    sync.apply(AuthEvent::SignedIn(provider_session("uid_1", "a@example.com")))
        .await;

    let (seen, _handle) = observe(&sync);
    let refreshed = sync.refresh_bearer_token().await.unwrap();
    assert_eq!(refreshed, "bearer-2");

    // Identity fields unchanged, token replaced, commit atomic
    let persisted = store.load().await.unwrap().unwrap();
    assert_eq!(persisted.user.uid, "uid_1");
    assert_eq!(persisted.bearer_token, "bearer-2");
    assert_eq!(sync.current_bearer_token(), Some("bearer-2".to_string()));

    // A credential refresh is not a state change, no notification fires
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_bearer_for_call_refreshes_opportunistically() {
    let (_, store, sync) = synchronizer();
    sync.apply(AuthEvent::SignedIn(provider_session("uid_1", "a@example.com")))
        .await;

    let token = sync.bearer_for_call().await.unwrap();
    assert_eq!(token, "bearer-2");

    // The refreshed token is the one persisted for the next reload
    let persisted = store.load().await.unwrap().unwrap();
    assert_eq!(persisted.bearer_token, "bearer-2");
}

#[tokio::test]
async fn test_bearer_for_call_falls_back_to_current_token() {
    let (provider, _, sync) = synchronizer();
    sync.apply(AuthEvent::SignedIn(provider_session("uid_1", "a@example.com")))
        .await;

    provider.set_fail_token_refresh(true);
    let token = sync.bearer_for_call().await.unwrap();
    assert_eq!(token, "bearer-1");
}

#[tokio::test]
async fn test_bearer_for_call_without_session_is_unauthorized() {
    let (_, _, sync) = synchronizer();
    let err = sync.bearer_for_call().await.unwrap_err();
    assert!(matches!(err, CeremonyError::Unauthorized(_)));
}

#[tokio::test]
async fn test_refresh_without_session_is_unauthorized() {
    let (_, _, sync) = synchronizer();
    let err = sync.refresh_bearer_token().await.unwrap_err();
    assert!(matches!(err, CeremonyError::Unauthorized(_)));
}

#[tokio::test]
async fn test_unsubscribed_listener_stops_receiving() {
    let (_, _, sync) = synchronizer();
    let (seen, handle) = observe(&sync);

    sync.apply(AuthEvent::SignedIn(provider_session("uid_1", "a@example.com")))
        .await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    handle.unsubscribe();
    sync.apply(AuthEvent::SignedOut).await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_attach_pumps_provider_events_in_order() {
    let (provider, store, sync) = synchronizer();
    let _subscription = SessionSynchronizer::attach(&sync);
    assert_eq!(provider.listener_count(), 1);

    provider.fire(&AuthEvent::SignedIn(provider_session("uid_1", "a@example.com")));
    {
        let sync = Arc::clone(&sync);
        wait_until(move || sync.state().is_authenticated()).await;
    }

    provider.fire(&AuthEvent::SignedOut);
    {
        let sync = Arc::clone(&sync);
        wait_until(move || sync.state() == AuthState::Unauthenticated).await;
    }
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_dropping_subscription_detaches_from_provider() {
    let (provider, _, sync) = synchronizer();
    let subscription = SessionSynchronizer::attach(&sync);
    assert_eq!(provider.listener_count(), 1);

    drop(subscription);
    assert_eq!(provider.listener_count(), 0);
}

#[tokio::test]
async fn test_sign_out_round_trips_through_provider_events() {
    let (provider, _, sync) = synchronizer();
    let _subscription = SessionSynchronizer::attach(&sync);

    provider.fire(&AuthEvent::SignedIn(provider_session("uid_1", "a@example.com")));
    {
        let sync = Arc::clone(&sync);
        wait_until(move || sync.state().is_authenticated()).await;
    }

    sync.sign_out().await.unwrap();
    {
        let sync = Arc::clone(&sync);
        wait_until(move || sync.state() == AuthState::Unauthenticated).await;
    }
}

#[tokio::test]
async fn test_restore_warm_starts_from_persisted_record() {
    let (_, store, sync) = synchronizer();

    // A record left behind by a previous run
    let previous = keywing::models::PersistedSession {
        user: keywing::models::SessionUser {
            uid: "uid_prev".to_string(),
            email: "prev@example.com".to_string(),
            name: None,
            avatar_url: None,
            email_verified: true,
        },
        bearer_token: "bearer-old".to_string(),
        authenticated_at: chrono::Utc::now(),
    };
    store.commit(&previous).await.unwrap();

    sync.restore().await;
    let AuthState::Authenticated(record) = sync.state() else {
        panic!("expected warm-started authenticated state");
    };
    assert_eq!(record.user.uid, "uid_prev");

    // The provider's first report remains authoritative
    sync.apply(AuthEvent::SignedIn(provider_session("uid_new", "new@example.com")))
        .await;
    let AuthState::Authenticated(record) = sync.state() else {
        panic!("expected authenticated state");
    };
    assert_eq!(record.user.uid, "uid_new");
}
