//! Client error types.
//!
//! All client operations surface errors through [`ClientError`]. Callers
//! only ever see a final, already-classified failure — endpoint fallback and
//! token refresh happen transparently inside the client, so intermediate
//! retry attempts never escape as errors.

/// Unified error type for the CampusRide API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The backend could not be reached, even after rotating to the fallback
    /// endpoint.
    #[error("network error, check your connection: {reason}")]
    Network {
        /// The underlying transport failure.
        reason: String,
    },

    /// The session could not be refreshed; the user must log in again.
    ///
    /// By the time a caller sees this, the credential store has been cleared
    /// and the session-failure callback has fired.
    #[error("authentication expired, please log in again")]
    AuthExpired,

    /// The server rejected the request with a non-401 status. The message is
    /// whatever the server sent, verbatim; these are never retried.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Server-provided error message.
        message: String,
    },

    /// A transport-layer error that is not a connectivity failure (e.g. a
    /// malformed response stream).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// URL parsing error.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An error propagated from the credential vault.
    #[error("credential store error: {0}")]
    Store(#[from] campusride_vault::VaultError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ClientError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
