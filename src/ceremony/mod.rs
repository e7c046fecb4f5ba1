//! WebAuthn ceremony orchestration
//!
//! One [`CeremonyOrchestrator`] drives both ceremonies end-to-end: fetch the
//! server-issued challenge, invoke the platform authenticator with it
//! verbatim, submit the signed response for verification. Steps are strictly
//! sequential and nothing is retried automatically; a failed or abandoned
//! ceremony leaves no residue on either side.

mod authenticator;
mod orchestrator;

pub use authenticator::{AuthenticatorError, PlatformAuthenticator};
pub use orchestrator::CeremonyOrchestrator;
