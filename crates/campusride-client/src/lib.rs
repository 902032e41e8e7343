//! Resilient API client for the CampusRide backend.
//!
//! This crate is the HTTP access layer for the CampusRide mobile client. It
//! discovers which of several candidate backend endpoints is reachable,
//! attaches and refreshes bearer credentials transparently, retries failed
//! requests under bounded policies, and notifies the application when a
//! session is irrecoverably invalid.
//!
//! # Architecture
//!
//! ```text
//! ApiClient
//! ├── EndpointRegistry   (ordered candidates + shared current pointer)
//! ├── CredentialStore    (vault-backed or in-memory session storage)
//! ├── FailureKind        (network / unauthorized / other classification)
//! ├── refresh            (single-flight token refresh coordinator)
//! └── SessionNotifier    (one callback, fired once per failed epoch)
//! ```
//!
//! Control flow per call: attach credentials → transport → classify →
//! either return, rotate the endpoint and replay once, or refresh the token
//! and replay once. A logical request never exceeds two extra attempts, and
//! callers only ever see the final outcome.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use campusride_client::{ApiClient, EndpointRegistry, VaultStore, default_endpoints};
//! use campusride_vault::{SessionVault, crypto};
//!
//! # async fn example() -> campusride_client::Result<()> {
//! let key = crypto::random_bytes(crypto::KEY_LEN)?;
//! let vault = SessionVault::open("data/session.db", &key)?;
//!
//! let client = Arc::new(ApiClient::new(
//!     EndpointRegistry::new(default_endpoints())?,
//!     Arc::new(VaultStore::new(vault)),
//! ));
//!
//! // The UI layer registers the logout route once at startup.
//! client.on_session_failure(|| {
//!     // clear auth state, reset navigation, show the login screen
//! });
//!
//! let rides = client.get("/rides/available").await?;
//! println!("rides: {rides}");
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod notify;
mod refresh;
pub mod store;

// Re-export key types at the crate root for convenience.
pub use classify::FailureKind;
pub use client::{ApiClient, Method};
pub use endpoint::{EndpointConfig, EndpointRegistry, default_endpoints};
pub use error::{ClientError, Result};
pub use notify::SessionNotifier;
pub use store::{CredentialStore, MemoryStore, VaultStore};
