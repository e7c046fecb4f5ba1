//! Server boundary for the passkey endpoints
//!
//! [`ApiTransport`] is the client-observable contract of the backend's REST
//! surface:
//! two authenticated ceremony endpoints, two public ceremony endpoints, and
//! the inventory pair. Challenge and credential payloads are opaque JSON
//! passed through verbatim.

mod client;

pub use client::HttpApiClient;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::CeremonyError;
use crate::models::{ExchangeToken, Passkey};

/// The six REST operations backing ceremonies and inventory
///
/// Authenticated calls carry a bearer token; its absence or expiry surfaces
/// as [`CeremonyError::Unauthorized`], never as an empty result.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Fetch single-use registration options scoped to the caller's account
    ///
    /// # Errors
    ///
    /// Returns [`CeremonyError::Unauthorized`] for a missing/expired token or
    /// [`CeremonyError::Transport`] on network failure.
    async fn registration_options(&self, bearer_token: &str) -> Result<Value, CeremonyError>;

    /// Submit a created credential plus its device label for verification
    ///
    /// # Errors
    ///
    /// Returns [`CeremonyError::VerificationFailed`] on challenge/signature
    /// mismatch, [`CeremonyError::DuplicateCredential`] for an already
    /// enrolled authenticator, plus the authorization/transport kinds.
    async fn verify_registration(
        &self,
        bearer_token: &str,
        credential: &Value,
        device_label: &str,
    ) -> Result<Passkey, CeremonyError>;

    /// Fetch authentication options not yet bound to an account (public)
    ///
    /// # Errors
    ///
    /// Returns [`CeremonyError::Transport`] on network failure.
    async fn authentication_options(&self) -> Result<Value, CeremonyError>;

    /// Submit an assertion for verification (public), yielding a one-time
    /// exchange token bound to the resolved account
    ///
    /// # Errors
    ///
    /// Returns [`CeremonyError::NoCredential`] when no matching credential
    /// exists, [`CeremonyError::VerificationFailed`] on rejection, or
    /// [`CeremonyError::Transport`] on network failure.
    async fn verify_authentication(&self, credential: &Value)
        -> Result<ExchangeToken, CeremonyError>;

    /// Fetch the caller's passkeys, ordered by creation
    ///
    /// # Errors
    ///
    /// Returns the authorization/transport kinds.
    async fn list_passkeys(&self, bearer_token: &str) -> Result<Vec<Passkey>, CeremonyError>;

    /// Remove one passkey by id
    ///
    /// # Errors
    ///
    /// Returns [`CeremonyError::NotFound`] if the id does not exist or does
    /// not belong to the caller, plus the authorization/transport kinds.
    async fn delete_passkey(&self, bearer_token: &str, id: u64) -> Result<(), CeremonyError>;
}
