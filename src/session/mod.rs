//! Session identity synchronization
//!
//! Bridges the identity-provider session (password, OAuth, or passkey token
//! exchange) into the application's durable, persisted session state and
//! keeps the two from diverging.

mod store;
mod synchronizer;

pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoreError};
pub use synchronizer::{ListenerHandle, SessionSynchronizer, StateListener};
