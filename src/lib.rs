#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![deny(warnings)]
#![allow(clippy::multiple_crate_versions)]

//! Client-side core of a passkey (WebAuthn) credential lifecycle: ceremony
//! orchestration against a REST backend and a platform authenticator,
//! inventory management of registered credentials, and synchronization of
//! the identity-provider session into a durable persisted record.

/// Version of the keywing library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod api;
pub mod ceremony;
pub mod errors;
pub mod inventory;
pub mod models;
pub mod provider;
pub mod session;
pub mod settings;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use api::{ApiTransport, HttpApiClient};
pub use ceremony::{AuthenticatorError, CeremonyOrchestrator, PlatformAuthenticator};
pub use errors::CeremonyError;
pub use inventory::PasskeyInventory;
pub use models::{AuthState, DeviceType, ExchangeToken, Passkey, PersistedSession, SessionUser};
pub use provider::{AuthEvent, IdentityProvider, ProviderSession, ProviderSubscription};
pub use session::{FileSessionStore, SessionStore, SessionSynchronizer};
pub use settings::KeywingSettings;
