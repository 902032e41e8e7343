//! Candidate backend endpoints and the shared rotation pointer.
//!
//! A CampusRide build talks to whichever of several candidate base URLs is
//! reachable from the current network: the Android emulator's host mapping,
//! the development machine on the campus LAN, or plain loopback. The
//! [`EndpointRegistry`] holds the ordered candidate list and one mutable
//! "current" index shared by every request the client makes.
//!
//! Rotation is a global route switch: once a network failure advances the
//! pointer, all subsequent requests start from the new endpoint, not just
//! the retried one. That keeps the worst case per request at two attempts
//! while still self-healing across calls.

use std::sync::atomic::{AtomicUsize, Ordering};

use url::Url;

use crate::error::{ClientError, Result};

// ---------------------------------------------------------------------------
// EndpointConfig
// ---------------------------------------------------------------------------

/// One candidate backend base URL with human-readable metadata.
///
/// Immutable once constructed.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Short identifier, e.g. "emulator" or "lan".
    pub name: String,

    /// The base URL all request paths are resolved against.
    pub base_url: Url,

    /// Human-readable description shown in diagnostics.
    pub description: String,
}

impl EndpointConfig {
    /// Create a new endpoint configuration.
    pub fn new(
        name: impl Into<String>,
        base_url: Url,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url,
            description: description.into(),
        }
    }
}

/// The default candidate list for development builds: emulator host mapping
/// first, then the campus LAN address, then loopback.
pub fn default_endpoints() -> Vec<EndpointConfig> {
    vec![
        EndpointConfig::new(
            "emulator",
            Url::parse("http://10.0.2.2:8000/").expect("hard-coded URL is valid"),
            "Android emulator mapping of the host machine",
        ),
        EndpointConfig::new(
            "lan",
            Url::parse("http://192.168.1.50:8000/").expect("hard-coded URL is valid"),
            "development machine on the campus LAN",
        ),
        EndpointConfig::new(
            "local",
            Url::parse("http://127.0.0.1:8000/").expect("hard-coded URL is valid"),
            "device-local loopback",
        ),
    ]
}

// ---------------------------------------------------------------------------
// EndpointRegistry
// ---------------------------------------------------------------------------

/// Ordered, non-empty list of candidate endpoints with a shared current
/// index.
///
/// The index is always valid (`0 <= idx < len`) and rotation is circular.
/// Neither [`current`](Self::current) nor [`advance`](Self::advance) can
/// fail; with a single configured endpoint, `advance` is a no-op that
/// returns the same config, and the caller's per-request retry flag bounds
/// the number of attempts.
pub struct EndpointRegistry {
    endpoints: Vec<EndpointConfig>,
    current: AtomicUsize,
}

impl EndpointRegistry {
    /// Create a registry starting at the first endpoint in the list.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] if the list is empty.
    pub fn new(endpoints: Vec<EndpointConfig>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(ClientError::InvalidConfig {
                reason: "endpoint registry requires at least one endpoint".to_string(),
            });
        }

        Ok(Self {
            endpoints,
            current: AtomicUsize::new(0),
        })
    }

    /// The currently selected endpoint.
    pub fn current(&self) -> EndpointConfig {
        self.endpoints[self.current.load(Ordering::SeqCst)].clone()
    }

    /// Rotate to the next endpoint (circularly) and return the new current.
    ///
    /// The switch is observed by all subsequent requests process-wide.
    pub fn advance(&self) -> EndpointConfig {
        let len = self.endpoints.len();
        // fetch_update keeps the stored index in range at all times; the
        // closure never returns None, so the Err arm is unreachable.
        let prev = self
            .current
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |idx| {
                Some((idx + 1) % len)
            })
            .unwrap_or(0);

        let next = &self.endpoints[(prev + 1) % len];
        tracing::info!(
            endpoint = %next.name,
            base_url = %next.base_url,
            "switched current endpoint"
        );
        next.clone()
    }

    /// How many candidate endpoints are configured.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false: the constructor rejects empty lists.
    pub fn is_empty(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
