//! Vault error types.
//!
//! Every public API in this crate surfaces failures through [`VaultError`].
//! Each variant carries enough context for callers to decide how to handle
//! the failure without inspecting opaque strings.

/// Unified error type for the CampusRide session vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Crypto errors ------------------------------------------------------
    /// Sealing (encryption) failed, e.g. invalid key length or a ring
    /// internal error.
    #[error("seal failed: {reason}")]
    SealFailed { reason: String },

    /// Opening (decryption) failed, e.g. wrong key, corrupted ciphertext,
    /// or a bad nonce.
    #[error("open failed: {reason}")]
    OpenFailed { reason: String },

    /// Key derivation from a device passcode failed.
    #[error("key derivation failed: {reason}")]
    KeyDerivationFailed { reason: String },

    // -- Store errors -------------------------------------------------------
    /// Database schema setup failed.
    #[error("migration failed: {reason}")]
    MigrationFailed { reason: String },

    // -- Underlying errors --------------------------------------------------
    /// SQLite error from `rusqlite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error from the filesystem.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors that don't fit a specific
    /// variant.  Prefer a typed variant whenever possible.
    #[error("internal vault error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;
