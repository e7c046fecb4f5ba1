use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::errors::CeremonyError;
use crate::models::{AuthState, PersistedSession};
use crate::provider::{AuthEvent, IdentityProvider, ProviderSession, ProviderSubscription};
use crate::session::store::SessionStore;

/// Observer invoked after every committed state change
pub type StateListener = Box<dyn Fn(&AuthState) + Send + Sync>;

type ListenerSlot = (Uuid, Arc<StateListener>);

/// Unregister handle returned by [`SessionSynchronizer::subscribe`]
///
/// Dropping the handle removes the listener.
pub struct ListenerHandle {
    id: Uuid,
    listeners: Weak<Mutex<Vec<ListenerSlot>>>,
}

impl ListenerHandle {
    /// Remove the listener now instead of on drop
    pub fn unsubscribe(self) {
        self.remove();
    }

    fn remove(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Single source of truth reconciling the identity provider's live session
/// with the persisted, serializable session record
///
/// State machine: `Loading` (initial) transitions to `Authenticated` when
/// the provider reports a signed-in principal and to `Unauthenticated` when
/// it reports none or errors. Identity fields and the bearer token are
/// committed together in one store write, so a reader observes either the
/// full prior record or the full new one.
///
/// Constructed once by the application and threaded explicitly through
/// whatever needs it; there is no ambient global.
pub struct SessionSynchronizer {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn SessionStore>,
    state: Mutex<AuthState>,
    listeners: Arc<Mutex<Vec<ListenerSlot>>>,
    // Serializes event application so at most one notification is in flight
    event_gate: tokio::sync::Mutex<()>,
}

impl SessionSynchronizer {
    /// Create a synchronizer in the `Loading` state
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            provider,
            store,
            state: Mutex::new(AuthState::Loading),
            listeners: Arc::new(Mutex::new(Vec::new())),
            event_gate: tokio::sync::Mutex::new(()),
        }
    }

    fn state_guard(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state snapshot
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state_guard().clone()
    }

    /// Bearer token of the authenticated session, if any
    #[must_use]
    pub fn current_bearer_token(&self) -> Option<String> {
        match &*self.state_guard() {
            AuthState::Authenticated(record) => Some(record.bearer_token.clone()),
            _ => None,
        }
    }

    /// Register a state-change observer; the handle unregisters it
    ///
    /// Notifications fire after the corresponding commit, one at a time.
    pub fn subscribe(&self, listener: StateListener) -> ListenerHandle {
        let id = Uuid::new_v4();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        ListenerHandle {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Warm-start from the persisted record before the provider reports
    ///
    /// The provider's first event remains authoritative and will overwrite
    /// whatever this restores. A corrupt or unreadable record is discarded.
    pub async fn restore(&self) {
        let _gate = self.event_gate.lock().await;
        match self.store.load().await {
            Ok(Some(record)) => {
                let mut state = self.state_guard();
                if matches!(*state, AuthState::Loading) {
                    *state = AuthState::Authenticated(record);
                    drop(state);
                    self.notify();
                }
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!("discarding unreadable session record: {e}");
                if let Err(e) = self.store.clear().await {
                    log::error!("failed to clear session record: {e}");
                }
            }
        }
    }

    /// Pump provider auth events into the synchronizer
    ///
    /// Subscribes to the provider and applies events strictly in order on a
    /// background task. The listener stays armed across transitions; the
    /// returned subscription detaches it when dropped.
    pub fn attach(synchronizer: &Arc<Self>) -> ProviderSubscription {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = synchronizer.provider.subscribe(Box::new(move |event| {
            let _ = tx.send(event);
        }));

        let sync = Arc::clone(synchronizer);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sync.apply(event).await;
            }
        });

        subscription
    }

    /// Apply one provider auth event
    ///
    /// Events are serialized; a second call waits for the first commit and
    /// its notifications to finish.
    pub async fn apply(&self, event: AuthEvent) {
        let _gate = self.event_gate.lock().await;
        match event {
            AuthEvent::SignedIn(session) => self.commit_signed_in(session).await,
            AuthEvent::SignedOut => self.commit_signed_out().await,
            AuthEvent::Error(message) => {
                // Never leave callers in Loading; drop to unauthenticated
                // and let the provider's subscription re-fire on its own
                log::warn!("identity provider error while resolving state: {message}");
                self.commit_signed_out().await;
            }
        }
    }

    /// Refresh the bearer token without an identity change
    ///
    /// An `authenticated -> authenticated` credential refresh: the persisted
    /// record is replaced in one commit and no state-change notification
    /// fires.
    ///
    /// # Errors
    ///
    /// Returns [`CeremonyError::Unauthorized`] when no session is
    /// authenticated or [`CeremonyError::Provider`] when the provider cannot
    /// issue a token.
    pub async fn refresh_bearer_token(&self) -> Result<String, CeremonyError> {
        let _gate = self.event_gate.lock().await;

        let current = match self.state() {
            AuthState::Authenticated(record) => record,
            _ => {
                return Err(CeremonyError::Unauthorized(
                    "no authenticated session to refresh".to_string(),
                ))
            }
        };

        let bearer_token = self
            .provider
            .fresh_bearer_token()
            .await
            .map_err(|e| CeremonyError::Provider(e.to_string()))?;

        let record = PersistedSession {
            bearer_token: bearer_token.clone(),
            ..current
        };
        if let Err(e) = self.store.commit(&record).await {
            return Err(CeremonyError::Provider(format!(
                "failed to persist refreshed token: {e}"
            )));
        }

        *self.state_guard() = AuthState::Authenticated(record);
        Ok(bearer_token)
    }

    /// Bearer token to attach to the next authorized API call
    ///
    /// Refreshes opportunistically: asks the provider for a fresh token and
    /// falls back to the current persisted one when issuance fails, so a
    /// flaky token endpoint degrades to a possibly-stale credential instead
    /// of a failed call.
    ///
    /// # Errors
    ///
    /// Returns [`CeremonyError::Unauthorized`] when no session is
    /// authenticated.
    pub async fn bearer_for_call(&self) -> Result<String, CeremonyError> {
        match self.refresh_bearer_token().await {
            Ok(token) => Ok(token),
            Err(CeremonyError::Unauthorized(msg)) => Err(CeremonyError::Unauthorized(msg)),
            Err(refresh_err) => match self.current_bearer_token() {
                Some(token) => {
                    log::debug!("bearer refresh failed, reusing current token: {refresh_err}");
                    Ok(token)
                }
                None => Err(refresh_err),
            },
        }
    }

    /// Sign the current principal out at the provider
    ///
    /// The resulting signed-out event flows back through the attached
    /// subscription (or a direct [`SessionSynchronizer::apply`]) and clears
    /// the persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`CeremonyError::Provider`] when the provider cannot be
    /// reached.
    pub async fn sign_out(&self) -> Result<(), CeremonyError> {
        self.provider
            .sign_out()
            .await
            .map_err(|e| CeremonyError::Provider(e.to_string()))
    }

    async fn commit_signed_in(&self, session: ProviderSession) {
        let bearer_token = match self.provider.fresh_bearer_token().await {
            Ok(token) => token,
            Err(e) => {
                log::error!("could not obtain bearer token for signed-in principal: {e}");
                self.commit_signed_out().await;
                return;
            }
        };

        let record = PersistedSession {
            user: session.to_session_user(),
            bearer_token,
            authenticated_at: Utc::now(),
        };

        match self.store.commit(&record).await {
            Ok(()) => {
                log::info!("session authenticated for {}", record.user.uid);
                self.transition(AuthState::Authenticated(record));
            }
            Err(e) => {
                log::error!("failed to persist session record: {e}");
                self.commit_signed_out().await;
            }
        }
    }

    async fn commit_signed_out(&self) {
        if let Err(e) = self.store.clear().await {
            log::error!("failed to clear session record: {e}");
        }
        self.transition(AuthState::Unauthenticated);
    }

    fn transition(&self, next: AuthState) {
        {
            let mut state = self.state_guard();
            if *state == next {
                return;
            }
            *state = next.clone();
        }
        self.notify();
    }

    fn notify(&self) {
        let state = self.state();
        let listeners: Vec<Arc<StateListener>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        // Lock released before dispatch so a listener may (un)subscribe
        for listener in listeners {
            listener(&state);
        }
    }
}
