//! Passkey inventory
//!
//! CRUD-style view over the account's registered passkeys, kept consistent
//! with server state. Every mutation is addressed by id, never by index, so
//! overlapping operations on different ids cannot corrupt the snapshot. The
//! snapshot lock is never held across a suspension point; each async step
//! re-reads the latest state after its network round trip completes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::ApiTransport;
use crate::errors::CeremonyError;
use crate::models::Passkey;

/// In-memory view of the account's passkeys, backed by the server
pub struct PasskeyInventory {
    transport: Arc<dyn ApiTransport>,
    passkeys: Mutex<Vec<Passkey>>,
}

impl PasskeyInventory {
    /// Create an empty inventory over the given transport
    #[must_use]
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Self {
            transport,
            passkeys: Mutex::new(Vec::new()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Passkey>> {
        self.passkeys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sort(passkeys: &mut [Passkey]) {
        passkeys.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }

    /// Fetch the account's passkeys and replace the snapshot
    ///
    /// Returns the ordered-by-creation sequence. No implicit retry; the
    /// caller may re-invoke on failure.
    ///
    /// # Errors
    ///
    /// Returns [`CeremonyError::Unauthorized`] for a missing/expired bearer
    /// token (never an empty list) or [`CeremonyError::Transport`] on
    /// network failure.
    pub async fn list(&self, bearer_token: &str) -> Result<Vec<Passkey>, CeremonyError> {
        let mut fetched = self.transport.list_passkeys(bearer_token).await?;
        Self::sort(&mut fetched);

        // Lock taken only after the round trip has completed
        *self.guard() = fetched.clone();
        Ok(fetched)
    }

    /// Delete one passkey by id on the server, then drop it locally
    ///
    /// Does not re-fetch the full list; a concurrent creation elsewhere is
    /// only picked up on the next [`PasskeyInventory::list`].
    ///
    /// # Errors
    ///
    /// Returns [`CeremonyError::NotFound`] when the id no longer exists
    /// server-side (the stale local entry is dropped too so the view
    /// reconciles), plus the authorization/transport kinds.
    pub async fn delete(&self, bearer_token: &str, id: u64) -> Result<(), CeremonyError> {
        match self.transport.delete_passkey(bearer_token, id).await {
            Ok(()) => {
                self.guard().retain(|p| p.id != id);
                log::info!("deleted passkey {id}");
                Ok(())
            }
            Err(CeremonyError::NotFound(missing)) => {
                // Already gone server-side; reconcile the local view but
                // still report not-found so the caller knows
                self.guard().retain(|p| p.id != missing);
                Err(CeremonyError::NotFound(missing))
            }
            Err(other) => Err(other),
        }
    }

    /// Insert the record returned by a successful registration ceremony
    ///
    /// Keeps creation ordering; an id already present is replaced rather
    /// than duplicated.
    pub fn insert(&self, passkey: Passkey) {
        let mut passkeys = self.guard();
        passkeys.retain(|p| p.id != passkey.id);
        passkeys.push(passkey);
        Self::sort(&mut passkeys);
    }

    /// Current in-memory snapshot
    #[must_use]
    pub fn snapshot(&self) -> Vec<Passkey> {
        self.guard().clone()
    }

    /// Number of passkeys in the snapshot
    #[must_use]
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// True when the snapshot holds no passkeys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}
