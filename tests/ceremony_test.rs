// Ceremony orchestration: step ordering, success paths, and the full
// failure taxonomy, exercised over mock seams.
use std::sync::Arc;

use keywing::ceremony::{AuthenticatorError, CeremonyOrchestrator};
use keywing::errors::CeremonyError;
use keywing::models::DeviceType;
use keywing::settings::CeremonySettings;
use keywing::testing::{
    provider_session, AuthenticatorBehavior, CallLog, MockIdentityProvider,
    MockPlatformAuthenticator, MockTransport,
};

struct Harness {
    log: Arc<CallLog>,
    transport: Arc<MockTransport>,
    authenticator: Arc<MockPlatformAuthenticator>,
    provider: Arc<MockIdentityProvider>,
    orchestrator: CeremonyOrchestrator,
}

fn harness_with_timeout(timeout_seconds: u64) -> Harness {
    let log = CallLog::new();
    let transport = Arc::new(MockTransport::new(Arc::clone(&log)).with_bearer("tok123"));
    let authenticator = Arc::new(MockPlatformAuthenticator::new(Arc::clone(&log)));
    let provider = Arc::new(MockIdentityProvider::new());
    let orchestrator = CeremonyOrchestrator::new(
        Arc::clone(&transport) as _,
        Arc::clone(&authenticator) as _,
        Arc::clone(&provider) as _,
        &CeremonySettings { timeout_seconds },
    );
    Harness {
        log,
        transport,
        authenticator,
        provider,
        orchestrator,
    }
}

fn harness() -> Harness {
    harness_with_timeout(0)
}

#[tokio::test]
async fn test_register_returns_created_passkey() {
    let h = harness();

    let passkey = h.orchestrator.register("tok123", "MacBook Pro").await.unwrap();

    assert_eq!(passkey.id, 7);
    assert_eq!(passkey.name, "MacBook Pro");
    assert_eq!(passkey.device_type, DeviceType::Platform);
    assert!(passkey.last_used_at.is_none());

    // The server-side table now holds the credential
    assert_eq!(h.transport.server_passkeys().len(), 1);
}

#[tokio::test]
async fn test_register_step_ordering() {
    let h = harness();
    h.orchestrator.register("tok123", "MacBook Pro").await.unwrap();

    let options = h.log.position("registration_options").unwrap();
    let create = h.log.position("create_credential").unwrap();
    let verify = h.log.position("verify_registration").unwrap();
    assert!(options < create);
    assert!(create < verify);
}

#[tokio::test]
async fn test_register_rejects_empty_label_before_any_round_trip() {
    let h = harness();

    let err = h.orchestrator.register("tok123", "   ").await.unwrap_err();
    assert!(matches!(err, CeremonyError::InvalidRequest(_)));
    assert!(h.log.entries().is_empty());
}

#[tokio::test]
async fn test_register_expired_token_is_an_authorization_failure() {
    let h = harness();

    let err = h.orchestrator.register("stale", "MacBook Pro").await.unwrap_err();
    assert!(matches!(err, CeremonyError::Unauthorized(_)));

    // The ceremony aborted before the platform was ever invoked
    assert!(h.log.never_called("create_credential"));
    assert!(h.log.never_called("verify_registration"));
}

#[tokio::test]
async fn test_register_cancelled_by_platform() {
    let h = harness();
    h.authenticator
        .set_behavior(AuthenticatorBehavior::Fail(AuthenticatorError::Cancelled));

    let err = h.orchestrator.register("tok123", "MacBook Pro").await.unwrap_err();
    assert_eq!(err, CeremonyError::Cancelled);

    // Abandoned ceremony leaves no residue
    assert!(h.log.never_called("verify_registration"));
    assert!(h.transport.server_passkeys().is_empty());
}

#[tokio::test]
async fn test_register_duplicate_authenticator() {
    let h = harness();
    h.authenticator.set_behavior(AuthenticatorBehavior::Fail(
        AuthenticatorError::from_platform_error("InvalidStateError", "already registered"),
    ));

    let err = h.orchestrator.register("tok123", "MacBook Pro").await.unwrap_err();
    assert_eq!(err, CeremonyError::DuplicateCredential);
    assert!(err.is_permanent_for_device());
}

#[tokio::test]
async fn test_register_platform_unsupported() {
    let h = harness();
    h.authenticator.set_behavior(AuthenticatorBehavior::Fail(
        AuthenticatorError::from_platform_error("NotSupportedError", "no authenticator"),
    ));

    let err = h.orchestrator.register("tok123", "MacBook Pro").await.unwrap_err();
    assert!(matches!(err, CeremonyError::Unsupported(_)));
    assert!(err.is_permanent_for_device());
}

#[tokio::test]
async fn test_register_server_verification_reject() {
    let h = harness();
    h.transport
        .fail_registration_verify(CeremonyError::VerificationFailed(
            "signature mismatch".to_string(),
        ));

    let err = h.orchestrator.register("tok123", "MacBook Pro").await.unwrap_err();
    assert!(matches!(err, CeremonyError::VerificationFailed(_)));
    assert!(h.transport.server_passkeys().is_empty());
}

#[tokio::test]
async fn test_register_transport_failure_on_options_fetch() {
    let h = harness();
    h.transport
        .fail_registration_options(CeremonyError::Transport("connection reset".to_string()));

    let err = h.orchestrator.register("tok123", "MacBook Pro").await.unwrap_err();
    assert!(matches!(err, CeremonyError::Transport(_)));
    assert!(err.is_retryable());
    assert!(h.log.never_called("create_credential"));
}

#[tokio::test(start_paused = true)]
async fn test_register_ceremony_timeout_maps_to_cancelled() {
    let h = harness_with_timeout(30);
    h.authenticator.set_behavior(AuthenticatorBehavior::Hang);

    let err = h.orchestrator.register("tok123", "MacBook Pro").await.unwrap_err();
    assert_eq!(err, CeremonyError::Cancelled);
    assert!(h.log.never_called("verify_registration"));
}

#[tokio::test]
async fn test_authenticate_hands_off_provider_session() {
    let h = harness();
    let expected_exchange = format!("xchg-{}", h.transport.challenge());
    h.provider
        .register_exchange(&expected_exchange, provider_session("uid_42", "user@example.com"));

    let session = h.orchestrator.authenticate().await.unwrap();
    assert_eq!(session.uid, "uid_42");
    assert_eq!(session.email, "user@example.com");
}

#[tokio::test]
async fn test_authenticate_step_ordering() {
    let h = harness();
    let expected_exchange = format!("xchg-{}", h.transport.challenge());
    h.provider
        .register_exchange(&expected_exchange, provider_session("uid_42", "user@example.com"));

    h.orchestrator.authenticate().await.unwrap();

    let options = h.log.position("authentication_options").unwrap();
    let assertion = h.log.position("get_assertion").unwrap();
    let verify = h.log.position("verify_authentication").unwrap();
    assert!(options < assertion);
    assert!(assertion < verify);
}

#[tokio::test]
async fn test_authenticate_cancelled_makes_no_exchange_request() {
    let h = harness();
    h.authenticator.set_behavior(AuthenticatorBehavior::Fail(
        AuthenticatorError::from_platform_error("NotAllowedError", "user dismissed"),
    ));

    let err = h.orchestrator.authenticate().await.unwrap_err();
    assert_eq!(err, CeremonyError::Cancelled);
    assert!(h.log.never_called("verify_authentication"));
}

#[tokio::test]
async fn test_authenticate_no_matching_credential() {
    let h = harness();
    h.transport
        .fail_authentication_verify(CeremonyError::NoCredential);

    let err = h.orchestrator.authenticate().await.unwrap_err();
    assert_eq!(err, CeremonyError::NoCredential);
}

#[tokio::test]
async fn test_authenticate_exchange_token_is_one_time() {
    let h = harness();
    let expected_exchange = format!("xchg-{}", h.transport.challenge());
    h.provider
        .register_exchange(&expected_exchange, provider_session("uid_42", "user@example.com"));

    h.orchestrator.authenticate().await.unwrap();

    // The same token cannot be redeemed twice
    let err = h.orchestrator.authenticate().await.unwrap_err();
    assert!(matches!(err, CeremonyError::Provider(_)));
}

#[tokio::test]
async fn test_failure_kinds_surface_distinct_user_messages() {
    let kinds = [
        CeremonyError::Transport("x".to_string()),
        CeremonyError::Unauthorized("x".to_string()),
        CeremonyError::Cancelled,
        CeremonyError::Unsupported("x".to_string()),
        CeremonyError::Platform("x".to_string()),
        CeremonyError::DuplicateCredential,
        CeremonyError::VerificationFailed("x".to_string()),
    ];

    for (i, a) in kinds.iter().enumerate() {
        for b in kinds.iter().skip(i + 1) {
            assert_ne!(a.user_message(), b.user_message());
        }
    }
}
