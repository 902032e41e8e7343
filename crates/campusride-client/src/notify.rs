//! Session-failure notification.
//!
//! When a token refresh fails irrecoverably the client has to tell the
//! application "this session is dead, route to login" without ever calling
//! UI or navigation code itself. The [`SessionNotifier`] is that seam: the
//! UI layer registers a single callback at startup, and the refresh
//! coordinator fires it when credentials cannot be recovered.
//!
//! Emission is armed per credential epoch: once fired, the notifier stays
//! quiet until a successful login or refresh rearms it. This is what keeps
//! N concurrent failures from producing N logout navigations.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// The registered callback. Expected to clear UI-held auth state, discard
/// the navigation stack, and route to the login screen.
type FailureCallback = Box<dyn Fn() + Send + Sync>;

/// Single-slot, epoch-armed session failure notifier.
pub struct SessionNotifier {
    slot: RwLock<Option<FailureCallback>>,
    /// True while an emission is permitted for the current credential epoch.
    armed: AtomicBool,
}

impl SessionNotifier {
    /// Create a notifier with no callback registered, armed for the first
    /// failure.
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
            armed: AtomicBool::new(true),
        }
    }

    /// Register the callback. At most one is stored; the last registration
    /// wins.
    pub fn register(&self, callback: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut slot) = self.slot.write() {
            let replaced = slot.replace(Box::new(callback)).is_some();
            tracing::debug!(replaced, "registered session failure callback");
        }
    }

    /// Fire the callback if one is registered and this epoch has not already
    /// been reported.
    ///
    /// The armed flag is consumed whether or not a callback is present, so a
    /// late registration never replays an old failure.
    pub fn emit(&self) {
        if !self.armed.swap(false, Ordering::SeqCst) {
            tracing::debug!("session failure already reported for this epoch");
            return;
        }

        tracing::warn!("session irrecoverable, notifying application");
        if let Ok(slot) = self.slot.read() {
            if let Some(callback) = slot.as_ref() {
                callback();
            }
        }
    }

    /// Re-enable emission for the next independent session failure.
    ///
    /// Called after a successful login or token refresh establishes a new
    /// credential epoch.
    pub fn rearm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl Default for SessionNotifier {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
