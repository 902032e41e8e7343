//! Failure classification for request attempts.
//!
//! Every failed attempt falls into exactly one of three categories, and the
//! category alone decides which recovery path runs:
//!
//! - [`FailureKind::NetworkUnreachable`] — the transport never completed the
//!   exchange (connection refused, DNS failure, timeout). Recovered once by
//!   rotating the endpoint registry.
//! - [`FailureKind::Unauthorized`] — the server answered HTTP 401. Recovered
//!   once by exchanging the refresh token.
//! - [`FailureKind::Other`] — anything else. Never retried; the server's
//!   message is surfaced to the caller unchanged.

use reqwest::StatusCode;

/// The three-way category of a failed request attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The transport could not complete the exchange at all.
    NetworkUnreachable,
    /// The server returned HTTP 401.
    Unauthorized,
    /// Any other HTTP status or application-level error.
    Other,
}

/// Classify a transport-level error from `reqwest`.
///
/// Timeouts and connection failures (which include DNS resolution errors)
/// are the network-unreachable class; everything else — e.g. a broken body
/// stream on an established connection — is `Other`.
pub fn classify_transport(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() || err.is_connect() {
        FailureKind::NetworkUnreachable
    } else {
        FailureKind::Other
    }
}

/// Classify an HTTP response status.
///
/// Returns `None` for success statuses — there is nothing to classify.
pub fn classify_status(status: StatusCode) -> Option<FailureKind> {
    if status.is_success() {
        None
    } else if status == StatusCode::UNAUTHORIZED {
        Some(FailureKind::Unauthorized)
    } else {
        Some(FailureKind::Other)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
