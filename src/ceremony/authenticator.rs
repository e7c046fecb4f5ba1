//! Platform authenticator seam
//!
//! The orchestrator never talks to a biometric sensor or security key
//! directly; it goes through [`PlatformAuthenticator`]. The challenge/options
//! blob is carried as opaque JSON and handed over verbatim. An invocation may
//! suspend indefinitely awaiting user presence; the platform owns the
//! timeout unless the ceremony settings bound it.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::CeremonyError;

/// Failure kinds reported by a platform authenticator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticatorError {
    /// User or platform aborted the ceremony
    Cancelled,
    /// Platform has no passkey capability
    Unsupported(String),
    /// This authenticator already holds a credential for the account
    DuplicateCredential,
    /// No stored credential matches the requested account
    NoCredential,
    /// Anything else the platform reports
    Platform(String),
}

// WebAuthn platforms signal failures through a small set of named errors.
// Cancellation is a distinct error name, not a separate cancel API.
const DOM_ERROR_TABLE: &[(&str, fn(&str) -> AuthenticatorError)] = &[
    ("NotAllowedError", |_| AuthenticatorError::Cancelled),
    ("AbortError", |_| AuthenticatorError::Cancelled),
    ("InvalidStateError", |_| {
        AuthenticatorError::DuplicateCredential
    }),
    ("NotSupportedError", |msg| {
        AuthenticatorError::Unsupported(msg.to_string())
    }),
    ("SecurityError", |msg| {
        AuthenticatorError::Unsupported(msg.to_string())
    }),
];

impl AuthenticatorError {
    /// Map a platform-reported error name to the closed failure set
    ///
    /// Unknown names land in [`AuthenticatorError::Platform`] so a new
    /// browser error can never escape the taxonomy.
    #[must_use]
    pub fn from_platform_error(name: &str, message: &str) -> Self {
        DOM_ERROR_TABLE
            .iter()
            .find(|(known, _)| *known == name)
            .map_or_else(
                || AuthenticatorError::Platform(format!("{name}: {message}")),
                |(_, map)| map(message),
            )
    }
}

impl fmt::Display for AuthenticatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticatorError::Cancelled => write!(f, "Ceremony cancelled by user or platform"),
            AuthenticatorError::Unsupported(msg) => write!(f, "Platform unsupported: {msg}"),
            AuthenticatorError::DuplicateCredential => write!(f, "Authenticator already enrolled"),
            AuthenticatorError::NoCredential => write!(f, "No matching credential"),
            AuthenticatorError::Platform(msg) => write!(f, "Platform error: {msg}"),
        }
    }
}

impl std::error::Error for AuthenticatorError {}

impl From<AuthenticatorError> for CeremonyError {
    fn from(err: AuthenticatorError) -> Self {
        match err {
            AuthenticatorError::Cancelled => CeremonyError::Cancelled,
            AuthenticatorError::Unsupported(msg) => CeremonyError::Unsupported(msg),
            AuthenticatorError::DuplicateCredential => CeremonyError::DuplicateCredential,
            AuthenticatorError::NoCredential => CeremonyError::NoCredential,
            // Unknown platform errors may be transient; only an explicit
            // unsupported report suppresses future ceremony offers
            AuthenticatorError::Platform(msg) => CeremonyError::Platform(msg),
        }
    }
}

/// The platform's credential-creation and assertion capability
#[async_trait]
pub trait PlatformAuthenticator: Send + Sync {
    /// Create a new credential from server-issued registration options
    ///
    /// The options blob must be passed to the platform exactly as received.
    ///
    /// # Errors
    ///
    /// Returns an error if the user or platform cancels, the platform has no
    /// passkey support, or this authenticator is already enrolled.
    async fn create_credential(&self, options: &Value) -> Result<Value, AuthenticatorError>;

    /// Produce an assertion from server-issued authentication options
    ///
    /// # Errors
    ///
    /// Returns an error if the user or platform cancels, the platform has no
    /// passkey support, or no stored credential matches.
    async fn get_assertion(&self, options: &Value) -> Result<Value, AuthenticatorError>;
}
