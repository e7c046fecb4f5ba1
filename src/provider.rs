//! Identity provider seam
//!
//! The application never holds the provider's live session object beyond the
//! handoff to the synchronizer; everything durable is re-derived through
//! [`ProviderSession::to_session_user`]. Auth-state changes arrive through an
//! explicit subscription with an unregister handle, not ambient callbacks.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{ExchangeToken, SessionUser};

/// The richer in-memory session object owned by the identity provider
///
/// Carries provider internals (raw claims) alongside the serializable
/// identity fields. Only the snapshot taken by
/// [`ProviderSession::to_session_user`] ever crosses the persistence
/// boundary.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    /// Provider-specific claims, never persisted
    pub raw_claims: Value,
}

impl ProviderSession {
    /// Snapshot exactly the serializable identity fields
    ///
    /// The result is a fresh value, reconstructed rather than aliased, so the
    /// persisted record can never hold a live provider handle.
    #[must_use]
    pub fn to_session_user(&self) -> SessionUser {
        SessionUser {
            uid: self.uid.clone(),
            email: self.email.clone(),
            name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
            email_verified: self.email_verified,
        }
    }
}

/// Auth-state change reported by the identity provider
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// A principal is signed in (password, OAuth, or passkey token exchange)
    SignedIn(ProviderSession),
    /// No principal (explicit sign-out or an expired, unrefreshable session)
    SignedOut,
    /// The provider failed while resolving state
    Error(String),
}

/// Errors reported by the identity provider
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Exchange token was rejected or sign-in failed
    SignInFailed(String),
    /// A fresh bearer token could not be issued
    TokenRefreshFailed(String),
    /// Provider could not be reached
    Network(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::SignInFailed(msg) => write!(f, "Sign-in failed: {msg}"),
            ProviderError::TokenRefreshFailed(msg) => write!(f, "Token refresh failed: {msg}"),
            ProviderError::Network(msg) => write!(f, "Provider unreachable: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Listener invoked for every provider auth event
pub type AuthListener = Box<dyn Fn(AuthEvent) + Send + Sync>;

/// Unregister handle returned by [`IdentityProvider::subscribe`]
///
/// Dropping the handle removes the listener; [`ProviderSubscription::unsubscribe`]
/// does the same explicitly.
pub struct ProviderSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ProviderSubscription {
    /// Wrap the provider-specific removal closure
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the listener now instead of on drop
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for ProviderSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for ProviderSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Third-party identity provider surface consumed by this crate
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Redeem a one-time exchange token for a full provider session
    ///
    /// # Errors
    ///
    /// Returns an error if the token was already used, expired, or the
    /// provider cannot be reached.
    async fn sign_in_with_token(
        &self,
        exchange_token: &ExchangeToken,
    ) -> Result<ProviderSession, ProviderError>;

    /// Issue a fresh short-lived bearer token for the current principal
    ///
    /// # Errors
    ///
    /// Returns an error if no principal is signed in or the provider cannot
    /// be reached.
    async fn fresh_bearer_token(&self) -> Result<String, ProviderError>;

    /// Sign the current principal out
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Register an auth-state listener; the handle unregisters it
    fn subscribe(&self, listener: AuthListener) -> ProviderSubscription;
}
