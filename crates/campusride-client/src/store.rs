//! The credential-store seam between the client and persistence.
//!
//! The client never caches credentials across awaits: every attempt re-reads
//! the store, and every mutation goes back through it. The [`CredentialStore`]
//! trait is that seam; production code hands the client a [`VaultStore`]
//! (encrypted SQLite via `campusride-vault`), tests and ephemeral sessions
//! use a [`MemoryStore`].
//!
//! All trait methods are synchronous and hold their lock briefly — the vault
//! connection is cheap single-row I/O, the same discipline the persistence
//! layer itself uses.

use std::sync::Mutex;

use campusride_vault::{Session, SessionVault, VaultError};

use crate::error::{ClientError, Result};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Read/write access to the persisted session credential set.
///
/// The store exclusively owns the credentials; components read or request
/// mutation through it and never hold a copy across suspension points.
pub trait CredentialStore: Send + Sync {
    /// The current session. Empty (all fields `None`) when signed out.
    fn session(&self) -> Result<Session>;

    /// Persist the whole session, replacing the previous one.
    fn save(&self, session: &Session) -> Result<()>;

    /// Drop every credential field together. Idempotent.
    fn clear(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// VaultStore
// ---------------------------------------------------------------------------

/// Production store: a [`SessionVault`] behind a mutex.
///
/// The mutex exists because `rusqlite::Connection` is not `Sync`; every
/// operation locks, does its single-row read or write, and releases.
pub struct VaultStore {
    vault: Mutex<SessionVault>,
}

impl VaultStore {
    /// Wrap an opened vault.
    pub fn new(vault: SessionVault) -> Self {
        Self {
            vault: Mutex::new(vault),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SessionVault>> {
        self.vault.lock().map_err(|e| {
            ClientError::Store(VaultError::Internal(format!("vault lock poisoned: {e}")))
        })
    }
}

impl CredentialStore for VaultStore {
    fn session(&self) -> Result<Session> {
        Ok(self.lock()?.load()?)
    }

    fn save(&self, session: &Session) -> Result<()> {
        Ok(self.lock()?.save(session)?)
    }

    fn clear(&self) -> Result<()> {
        Ok(self.lock()?.clear()?)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process store with no persistence. Used by the test suites and by
/// callers that deliberately want a session scoped to the process lifetime.
#[derive(Default)]
pub struct MemoryStore {
    session: Mutex<Session>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a session (test convenience).
    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Session>> {
        self.session.lock().map_err(|e| {
            ClientError::Store(VaultError::Internal(format!("store lock poisoned: {e}")))
        })
    }
}

impl CredentialStore for MemoryStore {
    fn session(&self) -> Result<Session> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.lock()? = session.clone();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = Session::default();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
