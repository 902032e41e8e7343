//! The resilient API client: request pipeline and recovery orchestration.
//!
//! Every call goes through the same pipeline: re-read the access token from
//! the credential store, attach it as a bearer header if present, resolve
//! the path against the registry's current endpoint, and send with a fixed
//! per-attempt timeout. Failures are classified three ways and at most one
//! recovery runs per attempt:
//!
//! - network-unreachable → rotate the endpoint registry, replay once;
//! - 401 → single-flight token refresh, replay once;
//! - anything else → surfaced to the caller unchanged, never retried.
//!
//! Callers only ever observe the final outcome. The per-request retry flags
//! live in an explicit [`RequestContext`] value, so bookkeeping can never
//! leak between independent requests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::classify::{self, FailureKind};
use crate::endpoint::EndpointRegistry;
use crate::error::{ClientError, Result};
use crate::notify::SessionNotifier;
use crate::store::CredentialStore;

pub use reqwest::Method;

/// Fixed timeout per transport attempt.
pub(crate) const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(20);

/// The token refresh route. Requests to this path never trigger a refresh
/// themselves.
pub(crate) const REFRESH_PATH: &str = "/auth/refresh";

// ---------------------------------------------------------------------------
// RequestContext
// ---------------------------------------------------------------------------

/// Per-call metadata for one logical request.
///
/// The retry flags each flip false→true at most once, which bounds any
/// logical request to two extra attempts total — one endpoint fallback and
/// one post-refresh replay, never compounding.
struct RequestContext {
    method: Method,
    path: String,
    body: Option<Value>,
    endpoint_retried: bool,
    auth_retried: bool,
}

impl RequestContext {
    fn new(method: Method, path: &str, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.to_string(),
            body,
            endpoint_retried: false,
            auth_retried: false,
        }
    }
}

/// A classified attempt failure: the category driving recovery plus the
/// error handed to the caller if no recovery applies.
struct AttemptFailure {
    kind: FailureKind,
    error: ClientError,
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Resilient HTTP client for the CampusRide backend.
///
/// Owns the endpoint registry, a handle to the credential store, the
/// session-failure notifier, and the single-flight refresh lock. Construct
/// one at startup and share it (`Arc`) across the application; there is no
/// hidden module-level state.
pub struct ApiClient {
    http: reqwest::Client,
    registry: EndpointRegistry,
    store: Arc<dyn CredentialStore>,
    notifier: SessionNotifier,
    /// Serializes token refresh attempts — see `refresh.rs`.
    pub(crate) refresh_lock: AsyncMutex<()>,
}

impl ApiClient {
    /// Create a client over the given registry and credential store.
    pub fn new(registry: EndpointRegistry, store: Arc<dyn CredentialStore>) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .user_agent("CampusRide/0.1")
            .default_headers(headers)
            .build()
            .unwrap_or_default();

        Self {
            http,
            registry,
            store,
            notifier: SessionNotifier::new(),
            refresh_lock: AsyncMutex::new(()),
        }
    }

    /// Register the session-failure callback. Called once at startup by the
    /// UI layer; the client never touches navigation code directly.
    ///
    /// At most one callback is stored; the last registration wins.
    pub fn on_session_failure(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.notifier.register(callback);
    }

    /// The endpoint registry, for diagnostics screens.
    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub(crate) fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    pub(crate) fn notifier(&self) -> &SessionNotifier {
        &self.notifier
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // -- Public request surface ---------------------------------------------

    /// `GET path` against the current endpoint.
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::GET, path, None).await
    }

    /// `POST path` with a JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, path, Some(body.clone())).await
    }

    /// `PUT path` with a JSON body.
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::PUT, path, Some(body.clone())).await
    }

    /// `DELETE path` against the current endpoint.
    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::DELETE, path, None).await
    }

    /// Issue one logical request with transparent fallback and refresh.
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let mut ctx = RequestContext::new(method, path, body);
        let request_id = Uuid::now_v7();

        loop {
            // Re-read credentials per attempt; no copy is held across awaits.
            let token = self.store.session()?.access_token;

            match self.attempt(&ctx, token.as_deref()).await {
                Ok(value) => return Ok(value),
                Err(failure) => match failure.kind {
                    FailureKind::NetworkUnreachable if !ctx.endpoint_retried => {
                        ctx.endpoint_retried = true;
                        let next = self.registry.advance();
                        tracing::warn!(
                            request_id = %request_id,
                            path = %ctx.path,
                            endpoint = %next.name,
                            "endpoint unreachable, replaying against fallback"
                        );
                    }
                    FailureKind::Unauthorized
                        if !ctx.auth_retried && !ctx.path.contains(REFRESH_PATH) =>
                    {
                        ctx.auth_retried = true;
                        tracing::debug!(
                            request_id = %request_id,
                            path = %ctx.path,
                            "unauthorized, attempting token refresh"
                        );
                        // Failure here already cleared the store and fired
                        // the notifier; AuthExpired propagates to the caller.
                        self.refresh_access_token(token.as_deref()).await?;
                    }
                    _ => {
                        tracing::debug!(
                            request_id = %request_id,
                            path = %ctx.path,
                            error = %failure.error,
                            "request failed without recovery"
                        );
                        return Err(failure.error);
                    }
                },
            }
        }
    }

    // -- Pipeline internals -------------------------------------------------

    /// One transport attempt: attach credentials, resolve against the
    /// current endpoint, send, classify the outcome.
    async fn attempt(
        &self,
        ctx: &RequestContext,
        token: Option<&str>,
    ) -> std::result::Result<Value, AttemptFailure> {
        let endpoint = self.registry.current();
        let url = endpoint.base_url.join(&ctx.path).map_err(|e| AttemptFailure {
            kind: FailureKind::Other,
            error: ClientError::UrlParse(e),
        })?;

        let mut request = self
            .http
            .request(ctx.method.clone(), url)
            .timeout(ATTEMPT_TIMEOUT);

        // Absence of a token sends the request unauthenticated; rejection is
        // the server's call.
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &ctx.body {
            request = request.json(body);
        }

        tracing::trace!(
            method = %ctx.method,
            path = %ctx.path,
            endpoint = %endpoint.name,
            authenticated = token.is_some(),
            "sending attempt"
        );

        let response = request.send().await.map_err(|e| {
            let kind = classify::classify_transport(&e);
            let error = match kind {
                FailureKind::NetworkUnreachable => ClientError::Network {
                    reason: e.to_string(),
                },
                _ => ClientError::Http(e),
            };
            AttemptFailure { kind, error }
        })?;

        let status = response.status();
        match classify::classify_status(status) {
            None => {
                let text = response.text().await.map_err(|e| AttemptFailure {
                    kind: FailureKind::Other,
                    error: ClientError::Http(e),
                })?;
                Ok(parse_body(&text))
            }
            Some(kind) => {
                let text = response.text().await.unwrap_or_default();
                Err(AttemptFailure {
                    kind,
                    error: ClientError::Api {
                        status: status.as_u16(),
                        message: extract_error_message(status, &text),
                    },
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Body helpers
// ---------------------------------------------------------------------------

/// Parse a success body leniently: empty bodies become `null`, non-JSON
/// bodies are passed through as a string.
fn parse_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Pull the server's own message out of an error body, falling back to the
/// raw text or the status reason. The caller sees this verbatim.
fn extract_error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "detail", "error"] {
            if let Some(message) = value.get(key).and_then(Value::as_str) {
                return message.to_string();
            }
        }
    }
    if !body.is_empty() {
        return body.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
