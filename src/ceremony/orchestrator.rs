use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::api::ApiTransport;
use crate::ceremony::authenticator::{AuthenticatorError, PlatformAuthenticator};
use crate::errors::CeremonyError;
use crate::models::Passkey;
use crate::provider::{IdentityProvider, ProviderSession};
use crate::settings::CeremonySettings;

/// Drives registration and authentication ceremonies end-to-end
pub struct CeremonyOrchestrator {
    transport: Arc<dyn ApiTransport>,
    authenticator: Arc<dyn PlatformAuthenticator>,
    provider: Arc<dyn IdentityProvider>,
    /// None means the platform authenticator owns the timeout
    ceremony_timeout: Option<Duration>,
}

impl CeremonyOrchestrator {
    /// Create an orchestrator over the injected seams
    #[must_use]
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        authenticator: Arc<dyn PlatformAuthenticator>,
        provider: Arc<dyn IdentityProvider>,
        settings: &CeremonySettings,
    ) -> Self {
        let ceremony_timeout = if settings.timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(settings.timeout_seconds))
        };

        Self {
            transport,
            authenticator,
            provider,
            ceremony_timeout,
        }
    }

    /// Register a new passkey for the signed-in account
    ///
    /// Fetches registration options, invokes the platform's credential
    /// creation with the exact blob, and submits the result plus the device
    /// label for verification. Returns the created [`Passkey`] for the caller
    /// to insert into its inventory.
    ///
    /// # Errors
    ///
    /// Returns one of the taxonomy kinds: `InvalidRequest` for an empty
    /// label, `Unauthorized`/`Transport` from the options fetch,
    /// `Cancelled`/`Unsupported`/`DuplicateCredential` from the platform, or
    /// `VerificationFailed` from the server.
    pub async fn register(
        &self,
        bearer_token: &str,
        device_label: &str,
    ) -> Result<Passkey, CeremonyError> {
        let label = device_label.trim();
        if label.is_empty() {
            return Err(CeremonyError::InvalidRequest(
                "device label must not be empty".to_string(),
            ));
        }

        let result = self.run_registration(bearer_token, label).await;
        match &result {
            Ok(passkey) => {
                log::info!("registered passkey {} ({})", passkey.id, passkey.name);
            }
            Err(err) => Self::log_failure("registration", err),
        }
        result
    }

    async fn run_registration(
        &self,
        bearer_token: &str,
        label: &str,
    ) -> Result<Passkey, CeremonyError> {
        let options = self.transport.registration_options(bearer_token).await?;
        let credential = self
            .invoke_platform(self.authenticator.create_credential(&options))
            .await?;
        self.transport
            .verify_registration(bearer_token, &credential, label)
            .await
    }

    /// Sign in with a passkey
    ///
    /// Runs the public authentication ceremony, exchanges the resulting
    /// one-time token for a full identity-provider session, and returns that
    /// session for handoff to the session synchronizer.
    ///
    /// # Errors
    ///
    /// Mirrors the registration taxonomy, plus `NoCredential` when this
    /// device holds no matching passkey and `Provider` when the token
    /// exchange fails.
    pub async fn authenticate(&self) -> Result<ProviderSession, CeremonyError> {
        let result = self.run_authentication().await;
        match &result {
            Ok(session) => log::info!("passkey sign-in for {}", session.uid),
            Err(err) => Self::log_failure("authentication", err),
        }
        result
    }

    async fn run_authentication(&self) -> Result<ProviderSession, CeremonyError> {
        let options = self.transport.authentication_options().await?;
        let assertion = self
            .invoke_platform(self.authenticator.get_assertion(&options))
            .await?;
        let exchange_token = self.transport.verify_authentication(&assertion).await?;

        self.provider
            .sign_in_with_token(&exchange_token)
            .await
            .map_err(|e| CeremonyError::Provider(e.to_string()))
    }

    /// Run one platform step, bounded by the configured ceremony timeout
    ///
    /// The platform step suspends on user presence/biometric input; when no
    /// timeout is configured it may suspend indefinitely and the platform
    /// authenticator owns giving up. A configured timeout maps to the
    /// cancelled kind, matching how platforms report their own expiry.
    async fn invoke_platform<F>(&self, step: F) -> Result<Value, CeremonyError>
    where
        F: Future<Output = Result<Value, AuthenticatorError>> + Send,
    {
        let outcome = match self.ceremony_timeout {
            Some(limit) => match tokio::time::timeout(limit, step).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    log::debug!("platform ceremony expired after {}s", limit.as_secs());
                    return Err(CeremonyError::Cancelled);
                }
            },
            None => step.await,
        };
        outcome.map_err(CeremonyError::from)
    }

    /// Log with a severity matching the failure kind
    ///
    /// Cancellation is an expected outcome; server-side verification failure
    /// is potential tampering or replay and stands out from the rest.
    fn log_failure(operation: &str, err: &CeremonyError) {
        match err {
            CeremonyError::Cancelled => {
                log::debug!("passkey {operation} cancelled");
            }
            CeremonyError::VerificationFailed(detail) => {
                log::warn!("passkey {operation} rejected by server verification: {detail}");
            }
            other => {
                log::info!("passkey {operation} failed: {other}");
            }
        }
    }
}
