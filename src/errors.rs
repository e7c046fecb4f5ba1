//! Failure taxonomy for ceremony and inventory operations
//!
//! Every failure is caught at the orchestrator/inventory boundary and
//! re-expressed as one of these kinds. Raw platform or transport error
//! identifiers are mapped into the taxonomy, never surfaced verbatim; the
//! short user-safe text comes from [`CeremonyError::user_message`].

use std::fmt;

/// Typed outcome for every failed ceremony or inventory operation
///
/// Nothing here is fatal and nothing is retried automatically; each variant
/// returns control to the caller with enough information to decide whether a
/// manual retry makes sense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CeremonyError {
    /// Network-level failure, transient, safe to retry manually
    Transport(String),
    /// Bearer token missing or expired, caller must re-authenticate
    Unauthorized(String),
    /// User or platform aborted the ceremony, expected, not logged as unexpected
    Cancelled,
    /// Platform cannot do passkeys, permanent for this device
    Unsupported(String),
    /// Unrecognized platform failure, transient as far as we know
    Platform(String),
    /// This authenticator is already enrolled for the account
    DuplicateCredential,
    /// No credential on this device matches the account (authentication only)
    NoCredential,
    /// Server rejected the signed response, potential tampering or replay
    VerificationFailed(String),
    /// Requested record does not exist or does not belong to the caller
    NotFound(u64),
    /// Caller-supplied input was rejected before any network round trip
    InvalidRequest(String),
    /// Identity provider failed to redeem the exchange token or issue a token
    Provider(String),
}

impl CeremonyError {
    /// Short, user-presentable message for this failure kind
    ///
    /// Internal detail strings stay in the `Display` form for logs; this text
    /// is safe to show directly in a UI.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            CeremonyError::Transport(_) => "Connection problem. Check your network and try again.",
            CeremonyError::Unauthorized(_) => "Your session has expired. Please sign in again.",
            CeremonyError::Cancelled => "The passkey prompt was dismissed.",
            CeremonyError::Unsupported(_) => "Passkeys are not supported on this device.",
            CeremonyError::Platform(_) => {
                "Something went wrong with the passkey prompt. Please try again."
            }
            CeremonyError::DuplicateCredential => {
                "This device is already registered as a passkey."
            }
            CeremonyError::NoCredential => "No passkey for this account was found on this device.",
            CeremonyError::VerificationFailed(_) => {
                "The passkey could not be verified. Please try again."
            }
            CeremonyError::NotFound(_) => "That passkey no longer exists.",
            CeremonyError::InvalidRequest(_) => "Please provide a name for this passkey.",
            CeremonyError::Provider(_) => "Sign-in could not be completed. Please try again.",
        }
    }

    /// Whether a manual retry of the same operation can reasonably succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            CeremonyError::Transport(_)
                | CeremonyError::VerificationFailed(_)
                | CeremonyError::Platform(_)
                | CeremonyError::Provider(_)
        )
    }

    /// Whether future ceremony offers should be suppressed on this device
    #[must_use]
    pub const fn is_permanent_for_device(&self) -> bool {
        matches!(
            self,
            CeremonyError::Unsupported(_) | CeremonyError::DuplicateCredential
        )
    }
}

impl fmt::Display for CeremonyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CeremonyError::Transport(msg) => write!(f, "Transport failure: {msg}"),
            CeremonyError::Unauthorized(msg) => write!(f, "Authorization failure: {msg}"),
            CeremonyError::Cancelled => write!(f, "Ceremony cancelled"),
            CeremonyError::Unsupported(msg) => write!(f, "Platform unsupported: {msg}"),
            CeremonyError::Platform(msg) => write!(f, "Platform error: {msg}"),
            CeremonyError::DuplicateCredential => write!(f, "Authenticator already enrolled"),
            CeremonyError::NoCredential => write!(f, "No matching credential on this device"),
            CeremonyError::VerificationFailed(msg) => {
                write!(f, "Server verification failed: {msg}")
            }
            CeremonyError::NotFound(id) => write!(f, "Passkey {id} not found"),
            CeremonyError::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
            CeremonyError::Provider(msg) => write!(f, "Identity provider error: {msg}"),
        }
    }
}

impl std::error::Error for CeremonyError {}
