//! SQLite-backed encrypted session store.
//!
//! The [`SessionVault`] wraps a `rusqlite::Connection` and a master key.
//! The whole credential set for the signed-in rider — access token, refresh
//! token, user id, user name, and the token issuance timestamp — lives in a
//! single row, serialized as JSON and sealed with AES-256-GCM before it
//! touches disk.
//!
//! The single-row shape is deliberate: the credential set is populated
//! together on login or refresh and cleared together on logout or
//! irrecoverable refresh failure, and one encrypted blob makes that
//! all-or-nothing behavior structural rather than a convention.
//!
//! Schema setup is automatic: [`SessionVault::open`] creates or upgrades the
//! database as needed.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::crypto::{self, Sealed};
use crate::error::{Result, VaultError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The persisted credential set for the signed-in user.
///
/// Created empty at first launch, populated by the login flow or a token
/// refresh, and fully cleared on logout or when a refresh is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Short-lived bearer token attached to every authenticated request.
    pub access_token: Option<String>,

    /// Longer-lived token exchanged for new access tokens.
    pub refresh_token: Option<String>,

    /// Backend id of the signed-in user.
    pub user_id: Option<String>,

    /// Display name of the signed-in user.
    pub user_name: Option<String>,

    /// Unix timestamp (seconds) when the access token was issued.
    pub token_timestamp: Option<i64>,
}

impl Session {
    /// Whether an access token is present.
    ///
    /// Absence does not mean requests fail — the client simply sends them
    /// unauthenticated and lets the server reject what it must.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

// ---------------------------------------------------------------------------
// SessionVault
// ---------------------------------------------------------------------------

/// Encrypted single-row session store backed by SQLite.
///
/// # Example
///
/// ```rust,no_run
/// # use campusride_vault::store::{Session, SessionVault};
/// # fn example() -> campusride_vault::error::Result<()> {
/// # let master_key = [0u8; 32];
/// let vault = SessionVault::open("data/session.db", &master_key)?;
///
/// let mut session = vault.load()?;
/// session.access_token = Some("eyJ...".to_string());
/// vault.save(&session)?;
/// # Ok(())
/// # }
/// ```
pub struct SessionVault {
    conn: Connection,
    master_key: Vec<u8>,
}

impl SessionVault {
    /// Open (or create) a session database at `path` with the given
    /// `master_key`.
    ///
    /// Runs schema setup automatically.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Database`] if the database cannot be opened,
    /// or [`VaultError::MigrationFailed`] if schema setup fails.
    pub fn open(path: impl AsRef<std::path::Path>, master_key: &[u8]) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "opening session vault");

        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;

        let vault = Self {
            conn,
            master_key: master_key.to_vec(),
        };
        vault.run_migrations()?;

        tracing::info!("session vault ready");
        Ok(vault)
    }

    /// Open an in-memory vault (useful for testing).
    pub fn open_in_memory(master_key: &[u8]) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;

        let vault = Self {
            conn,
            master_key: master_key.to_vec(),
        };
        vault.run_migrations()?;
        Ok(vault)
    }

    /// Configure SQLite pragmas for performance and safety.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(())
    }

    /// Run database schema migrations.
    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS session (
                id         INTEGER PRIMARY KEY CHECK(id = 0),
                data       BLOB NOT NULL,
                nonce      BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );",
            )
            .map_err(|e| VaultError::MigrationFailed {
                reason: e.to_string(),
            })?;

        tracing::debug!("session vault schema ready");
        Ok(())
    }

    // -- Session CRUD -------------------------------------------------------

    /// Load and decrypt the stored session.
    ///
    /// Returns an empty [`Session`] when nothing has been stored yet — first
    /// launch and post-logout states are not errors.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::OpenFailed`] if the stored blob cannot be
    /// decrypted (wrong key or corrupted database).
    pub fn load(&self) -> Result<Session> {
        let row = self
            .conn
            .query_row(
                "SELECT data, nonce FROM session WHERE id = 0",
                [],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                    ))
                },
            )
            .optional()?;

        let Some((data, nonce)) = row else {
            tracing::debug!("no stored session, returning empty");
            return Ok(Session::default());
        };

        if nonce.len() != crypto::NONCE_LEN_BYTES {
            return Err(VaultError::OpenFailed {
                reason: format!(
                    "stored nonce is {} bytes, expected {}",
                    nonce.len(),
                    crypto::NONCE_LEN_BYTES
                ),
            });
        }
        let mut nonce_bytes = [0u8; crypto::NONCE_LEN_BYTES];
        nonce_bytes.copy_from_slice(&nonce);

        let plaintext = crypto::open(
            &Sealed {
                nonce: nonce_bytes,
                bytes: data,
            },
            &self.master_key,
        )?;
        let session: Session = serde_json::from_slice(&plaintext)?;
        Ok(session)
    }

    /// Encrypt and persist the session, replacing any previous one.
    ///
    /// Every save re-seals with a fresh nonce.
    pub fn save(&self, session: &Session) -> Result<()> {
        let plaintext = serde_json::to_vec(session)?;
        let sealed = crypto::seal(&plaintext, &self.master_key)?;
        let now = Utc::now().timestamp();

        self.conn.execute(
            "INSERT INTO session (id, data, nonce, updated_at) VALUES (0, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET data = ?1, nonce = ?2, updated_at = ?3",
            params![sealed.bytes, sealed.nonce.as_slice(), now],
        )?;

        tracing::info!(
            authenticated = session.is_authenticated(),
            "saved session"
        );
        Ok(())
    }

    /// Remove the stored session entirely.
    ///
    /// All credential fields disappear together. Clearing an already-empty
    /// vault is a no-op, not an error — logout must be idempotent.
    pub fn clear(&self) -> Result<()> {
        let rows = self.conn.execute("DELETE FROM session WHERE id = 0", [])?;
        tracing::info!(had_session = rows > 0, "cleared session vault");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
