//! Encrypted on-device session vault for CampusRide.
//!
//! This crate persists the signed-in rider's credentials — access token,
//! refresh token, user id, user name, and token issuance timestamp — across
//! process restarts. The credential set is stored as a single AES-256-GCM
//! sealed blob in SQLite, so it is always populated and cleared as one unit.
//!
//! # Modules
//!
//! - [`crypto`] — AES-256-GCM seal/open, PBKDF2 passcode derivation.
//! - [`store`] — SQLite-backed encrypted session CRUD.
//! - [`error`] — Unified error types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use campusride_vault::crypto;
//! use campusride_vault::store::{Session, SessionVault};
//!
//! # fn example() -> campusride_vault::error::Result<()> {
//! // Derive the vault key from a device passcode (or load from the OS
//! // keystore on platforms that have one).
//! let (salt, key) = crypto::derive_key(b"device-passcode")?;
//!
//! let vault = SessionVault::open("data/session.db", &key)?;
//!
//! // Login flow stores the whole credential set at once.
//! vault.save(&Session {
//!     access_token: Some("eyJ...".into()),
//!     refresh_token: Some("rt-...".into()),
//!     user_id: Some("u-42".into()),
//!     user_name: Some("Ada Rider".into()),
//!     token_timestamp: Some(chrono::Utc::now().timestamp()),
//! })?;
//!
//! // Logout (or an irrecoverable refresh failure) clears everything.
//! vault.clear()?;
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod error;
pub mod store;

// Re-export the most commonly used types at the crate root for convenience.
pub use error::{Result, VaultError};
pub use store::{Session, SessionVault};
