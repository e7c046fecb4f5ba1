//! Testing utilities for keywing
//!
//! Mock seams and fixtures for exercising ceremonies, inventory, and session
//! synchronization without a network, platform authenticator, or identity
//! provider. Enabled with the `testing` feature for integration tests.

pub mod fixtures;
pub mod mock;

pub use fixtures::{passkey, provider_session, registration_options};
pub use mock::{
    AuthenticatorBehavior, CallLog, FlakySessionStore, MockIdentityProvider, MockPlatformAuthenticator,
    MockTransport,
};
