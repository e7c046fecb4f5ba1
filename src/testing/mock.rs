//! Mock seam implementations for isolated testing
//!
//! `MockTransport` models a small fake backend: it issues a fixed challenge,
//! accepts only credentials that echo that challenge, and keeps a real
//! passkey table so delete/list semantics behave like the server's.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::ApiTransport;
use crate::ceremony::{AuthenticatorError, PlatformAuthenticator};
use crate::errors::CeremonyError;
use crate::models::{DeviceType, ExchangeToken, Passkey};
use crate::provider::{
    AuthEvent, AuthListener, IdentityProvider, ProviderError, ProviderSession,
    ProviderSubscription,
};
use crate::session::{MemorySessionStore, SessionStore, StoreError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, ordered record of seam invocations
///
/// Used to assert ceremony step ordering across the transport and the
/// platform authenticator.
#[derive(Default)]
pub struct CallLog {
    entries: Mutex<Vec<String>>,
}

impl CallLog {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, entry: &str) {
        lock(&self.entries).push(entry.to_string());
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }

    /// Index of the first occurrence of `entry`, if recorded
    #[must_use]
    pub fn position(&self, entry: &str) -> Option<usize> {
        lock(&self.entries).iter().position(|e| e == entry)
    }

    /// True when `entry` was never recorded
    #[must_use]
    pub fn never_called(&self, entry: &str) -> bool {
        self.position(entry).is_none()
    }
}

/// Fake backend for the six passkey endpoints
pub struct MockTransport {
    log: Arc<CallLog>,
    challenge: String,
    expected_bearer: Option<String>,
    next_id: AtomicU64,
    passkeys: Mutex<Vec<Passkey>>,
    fail_registration_options: Mutex<Option<CeremonyError>>,
    fail_registration_verify: Mutex<Option<CeremonyError>>,
    fail_authentication_verify: Mutex<Option<CeremonyError>>,
    fail_list: Mutex<Option<CeremonyError>>,
}

impl MockTransport {
    #[must_use]
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            log,
            challenge: "challenge-C".to_string(),
            expected_bearer: None,
            next_id: AtomicU64::new(7),
            passkeys: Mutex::new(Vec::new()),
            fail_registration_options: Mutex::new(None),
            fail_registration_verify: Mutex::new(None),
            fail_authentication_verify: Mutex::new(None),
            fail_list: Mutex::new(None),
        }
    }

    /// Require this bearer token on authenticated endpoints
    #[must_use]
    pub fn with_bearer(mut self, bearer_token: &str) -> Self {
        self.expected_bearer = Some(bearer_token.to_string());
        self
    }

    /// Seed the server-side passkey table
    #[must_use]
    pub fn with_passkeys(self, passkeys: Vec<Passkey>) -> Self {
        *lock(&self.passkeys) = passkeys;
        self
    }

    /// Fail the next registration-options fetch with the given error
    pub fn fail_registration_options(&self, err: CeremonyError) {
        *lock(&self.fail_registration_options) = Some(err);
    }

    /// Fail the next registration-verify with the given error
    pub fn fail_registration_verify(&self, err: CeremonyError) {
        *lock(&self.fail_registration_verify) = Some(err);
    }

    /// Fail the next authentication-verify with the given error
    pub fn fail_authentication_verify(&self, err: CeremonyError) {
        *lock(&self.fail_authentication_verify) = Some(err);
    }

    /// Fail the next list with the given error
    pub fn fail_list(&self, err: CeremonyError) {
        *lock(&self.fail_list) = Some(err);
    }

    /// The challenge this fake server embeds in every options blob
    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Server-side passkey table snapshot
    #[must_use]
    pub fn server_passkeys(&self) -> Vec<Passkey> {
        lock(&self.passkeys).clone()
    }

    fn check_bearer(&self, bearer_token: &str) -> Result<(), CeremonyError> {
        match &self.expected_bearer {
            Some(expected) if bearer_token != expected => Err(CeremonyError::Unauthorized(
                "bearer token rejected".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn credential_echoes_challenge(&self, credential: &Value) -> bool {
        credential.get("challenge").and_then(Value::as_str) == Some(self.challenge.as_str())
    }

    fn take(failure: &Mutex<Option<CeremonyError>>) -> Option<CeremonyError> {
        lock(failure).take()
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn registration_options(&self, bearer_token: &str) -> Result<Value, CeremonyError> {
        self.log.record("registration_options");
        self.check_bearer(bearer_token)?;
        if let Some(err) = Self::take(&self.fail_registration_options) {
            return Err(err);
        }
        Ok(crate::testing::fixtures::registration_options(
            &self.challenge,
        ))
    }

    async fn verify_registration(
        &self,
        bearer_token: &str,
        credential: &Value,
        device_label: &str,
    ) -> Result<Passkey, CeremonyError> {
        self.log.record("verify_registration");
        self.check_bearer(bearer_token)?;
        if let Some(err) = Self::take(&self.fail_registration_verify) {
            return Err(err);
        }
        if !self.credential_echoes_challenge(credential) {
            return Err(CeremonyError::VerificationFailed(
                "challenge mismatch".to_string(),
            ));
        }

        let passkey = Passkey {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: device_label.to_string(),
            device_type: DeviceType::Platform,
            created_at: Utc::now(),
            last_used_at: None,
        };
        lock(&self.passkeys).push(passkey.clone());
        Ok(passkey)
    }

    async fn authentication_options(&self) -> Result<Value, CeremonyError> {
        self.log.record("authentication_options");
        Ok(json!({
            "challenge": self.challenge,
            "rpId": "example.com",
            "userVerification": "preferred"
        }))
    }

    async fn verify_authentication(
        &self,
        credential: &Value,
    ) -> Result<ExchangeToken, CeremonyError> {
        self.log.record("verify_authentication");
        if let Some(err) = Self::take(&self.fail_authentication_verify) {
            return Err(err);
        }
        if !self.credential_echoes_challenge(credential) {
            return Err(CeremonyError::VerificationFailed(
                "challenge mismatch".to_string(),
            ));
        }
        Ok(ExchangeToken(format!("xchg-{}", self.challenge)))
    }

    async fn list_passkeys(&self, bearer_token: &str) -> Result<Vec<Passkey>, CeremonyError> {
        self.log.record("list_passkeys");
        self.check_bearer(bearer_token)?;
        if let Some(err) = Self::take(&self.fail_list) {
            return Err(err);
        }
        let mut passkeys = lock(&self.passkeys).clone();
        passkeys.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(passkeys)
    }

    async fn delete_passkey(&self, bearer_token: &str, id: u64) -> Result<(), CeremonyError> {
        self.log.record("delete_passkey");
        self.check_bearer(bearer_token)?;
        let mut passkeys = lock(&self.passkeys);
        let before = passkeys.len();
        passkeys.retain(|p| p.id != id);
        if passkeys.len() == before {
            return Err(CeremonyError::NotFound(id));
        }
        Ok(())
    }
}

/// What the fake platform does when invoked
pub enum AuthenticatorBehavior {
    /// Produce a credential echoing the challenge from the options blob
    Sign,
    /// Report the given platform failure
    Fail(AuthenticatorError),
    /// Suspend forever, as a platform awaiting user presence does
    Hang,
}

/// Fake platform authenticator
pub struct MockPlatformAuthenticator {
    log: Arc<CallLog>,
    behavior: Mutex<AuthenticatorBehavior>,
}

impl MockPlatformAuthenticator {
    #[must_use]
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            log,
            behavior: Mutex::new(AuthenticatorBehavior::Sign),
        }
    }

    #[must_use]
    pub fn with_behavior(log: Arc<CallLog>, behavior: AuthenticatorBehavior) -> Self {
        Self {
            log,
            behavior: Mutex::new(behavior),
        }
    }

    pub fn set_behavior(&self, behavior: AuthenticatorBehavior) {
        *lock(&self.behavior) = behavior;
    }

    async fn invoke(&self, options: &Value, kind: &str) -> Result<Value, AuthenticatorError> {
        // Decide before any await so the behavior lock never spans a
        // suspension point
        let outcome = match &*lock(&self.behavior) {
            AuthenticatorBehavior::Sign => {
                let challenge = options
                    .get("challenge")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Some(Ok(json!({
                    "type": "public-key",
                    "rawId": URL_SAFE_NO_PAD.encode(b"test_credential_id"),
                    "kind": kind,
                    "challenge": challenge,
                })))
            }
            AuthenticatorBehavior::Fail(err) => Some(Err(err.clone())),
            AuthenticatorBehavior::Hang => None,
        };

        match outcome {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

#[async_trait]
impl PlatformAuthenticator for MockPlatformAuthenticator {
    async fn create_credential(&self, options: &Value) -> Result<Value, AuthenticatorError> {
        self.log.record("create_credential");
        self.invoke(options, "registration").await
    }

    async fn get_assertion(&self, options: &Value) -> Result<Value, AuthenticatorError> {
        self.log.record("get_assertion");
        self.invoke(options, "authentication").await
    }
}

/// Fake identity provider with manual event firing
pub struct MockIdentityProvider {
    listeners: Arc<Mutex<Vec<(Uuid, AuthListener)>>>,
    sessions: Mutex<HashMap<String, ProviderSession>>,
    token_counter: AtomicU64,
    fail_token_refresh: AtomicBool,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            sessions: Mutex::new(HashMap::new()),
            token_counter: AtomicU64::new(0),
            fail_token_refresh: AtomicBool::new(false),
        }
    }

    /// Make an exchange token redeemable for the given session (one-time)
    pub fn register_exchange(&self, exchange_token: &str, session: ProviderSession) {
        lock(&self.sessions).insert(exchange_token.to_string(), session);
    }

    /// Make the next `fresh_bearer_token` calls fail
    pub fn set_fail_token_refresh(&self, fail: bool) {
        self.fail_token_refresh.store(fail, Ordering::SeqCst);
    }

    /// Fire an auth event at every registered listener
    pub fn fire(&self, event: &AuthEvent) {
        for (_, listener) in lock(&self.listeners).iter() {
            listener(event.clone());
        }
    }

    /// Number of currently registered listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn sign_in_with_token(
        &self,
        exchange_token: &ExchangeToken,
    ) -> Result<ProviderSession, ProviderError> {
        // Exchange tokens are one-time: redeemed means removed
        lock(&self.sessions)
            .remove(exchange_token.as_str())
            .ok_or_else(|| {
                ProviderError::SignInFailed("exchange token unknown or already used".to_string())
            })
    }

    async fn fresh_bearer_token(&self) -> Result<String, ProviderError> {
        if self.fail_token_refresh.load(Ordering::SeqCst) {
            return Err(ProviderError::TokenRefreshFailed(
                "token endpoint unavailable".to_string(),
            ));
        }
        let n = self.token_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("bearer-{n}"))
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.fire(&AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self, listener: AuthListener) -> ProviderSubscription {
        let id = Uuid::new_v4();
        lock(&self.listeners).push((id, listener));

        let listeners = Arc::clone(&self.listeners);
        ProviderSubscription::new(move || {
            lock(&listeners).retain(|(listener_id, _)| *listener_id != id);
        })
    }
}

/// Session store whose commits can be made to fail
pub struct FlakySessionStore {
    inner: MemorySessionStore,
    fail_commits: AtomicBool,
}

impl Default for FlakySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlakySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MemorySessionStore::new(),
            fail_commits: AtomicBool::new(false),
        }
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn load(&self) -> Result<Option<crate::models::PersistedSession>, StoreError> {
        self.inner.load().await
    }

    async fn commit(&self, record: &crate::models::PersistedSession) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other(
                "simulated commit failure",
            )));
        }
        self.inner.commit(record).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }
}
