//! Durable session record storage
//!
//! The persisted record is the crate's only durable state. A commit replaces
//! the whole record in one step: [`FileSessionStore`] writes a sibling temp
//! file and renames it over the target, so a reader sees either the full
//! prior record or the full new one, never a mix.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::PersistedSession;

/// Storage failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session record corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Durable home of the persisted session record
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the current record, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read or the record
    /// does not parse.
    async fn load(&self) -> Result<Option<PersistedSession>, StoreError>;

    /// Replace the record atomically
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    async fn commit(&self, record: &PersistedSession) -> Result<(), StoreError>;

    /// Remove the record entirely
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be modified.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// JSON-file-backed store with write-then-rename commits
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut path = self.path.clone();
        path.set_extension("tmp");
        path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<PersistedSession>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let record = serde_json::from_str(&contents)?;
        Ok(Some(record))
    }

    async fn commit(&self, record: &PersistedSession) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(record)?;
        let temp = self.temp_path();
        std::fs::write(&temp, json)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// In-memory store, mainly for tests and ephemeral sessions
#[derive(Default)]
pub struct MemorySessionStore {
    record: Mutex<Option<PersistedSession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Option<PersistedSession>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<PersistedSession>, StoreError> {
        Ok(self.guard().clone())
    }

    async fn commit(&self, record: &PersistedSession) -> Result<(), StoreError> {
        *self.guard() = Some(record.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.guard() = None;
        Ok(())
    }
}
