//! Single-flight token refresh.
//!
//! On a 401 the client exchanges the stored refresh token for a new access
//! token and replays the original request. Many requests can discover an
//! expired token at the same moment, so the exchange is single-flight: one
//! task wins the refresh lock and performs the wire call; the rest wait,
//! then re-read the store and adopt whatever token the winner persisted.
//! N concurrent 401s produce exactly one refresh request and at most one
//! session-failure notification.
//!
//! When the refresh itself fails — no refresh token, transport failure, or
//! a rejection from the auth endpoint — the session is irrecoverable: the
//! vault is cleared in full, the notifier fires, and the caller gets
//! [`ClientError::AuthExpired`].

use chrono::Utc;
use serde::Deserialize;

use crate::client::{ApiClient, ATTEMPT_TIMEOUT, REFRESH_PATH};
use crate::error::{ClientError, Result};

/// Success body of `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

impl ApiClient {
    /// Obtain a fresh access token, serialized across concurrent callers.
    ///
    /// `stale_token` is the access token the caller's failed attempt was
    /// sent with (possibly `None` for an unauthenticated attempt). If the
    /// store already holds a different token by the time the lock is
    /// acquired, a concurrent refresh finished first and its token is
    /// adopted without another wire call.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AuthExpired`] after clearing the store and
    /// notifying the application.
    pub(crate) async fn refresh_access_token(&self, stale_token: Option<&str>) -> Result<String> {
        let _flight = self.refresh_lock.lock().await;

        let session = self.store().session()?;
        if let Some(current) = session.access_token.as_deref() {
            if stale_token != Some(current) {
                tracing::debug!("adopting token refreshed by a concurrent request");
                return Ok(current.to_string());
            }
        }

        let Some(refresh_token) = session.refresh_token else {
            return Err(self.fail_session("no refresh token available"));
        };

        // The exchange targets the *current* endpoint — a fallback rotation
        // that already happened benefits the refresh call too.
        let endpoint = self.registry().current();
        let url = match endpoint.base_url.join(REFRESH_PATH) {
            Ok(url) => url,
            Err(e) => return Err(self.fail_session(&format!("bad refresh url: {e}"))),
        };

        tracing::debug!(endpoint = %endpoint.name, "exchanging refresh token");

        let response = self
            .http()
            .post(url)
            .timeout(ATTEMPT_TIMEOUT)
            .bearer_auth(&refresh_token)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                return Err(self.fail_session(&format!("refresh transport failure: {e}")));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            return Err(self.fail_session(&format!("refresh rejected with {status}")));
        }

        let body: RefreshResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                return Err(self.fail_session(&format!("bad refresh response: {e}")));
            }
        };

        // Persist the new token and issuance time; user identity fields are
        // untouched. A fresh epoch rearms the failure notifier.
        let mut session = self.store().session()?;
        session.access_token = Some(body.access_token.clone());
        session.token_timestamp = Some(Utc::now().timestamp());
        self.store().save(&session)?;
        self.notifier().rearm();

        tracing::info!("access token refreshed");
        Ok(body.access_token)
    }

    /// Terminal failure path: clear every credential field, fire the
    /// notifier (at most once per epoch), and hand back the error the
    /// original caller sees.
    fn fail_session(&self, reason: &str) -> ClientError {
        tracing::warn!(reason, "session irrecoverable, clearing credentials");
        if let Err(e) = self.store().clear() {
            tracing::error!(error = %e, "failed to clear credential store");
        }
        self.notifier().emit();
        ClientError::AuthExpired
    }
}
