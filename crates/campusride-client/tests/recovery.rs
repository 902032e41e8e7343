//! End-to-end recovery behavior against an HTTP test double.
//!
//! Covers the client's externally observable contract: bounded retries,
//! persistent endpoint rotation, refresh-then-replay, atomic credential
//! clearing with a single notification, and single-flight refresh under
//! concurrency.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use url::Url;
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use campusride_client::{
    ApiClient, ClientError, CredentialStore, EndpointConfig, EndpointRegistry, MemoryStore,
};
use campusride_vault::Session;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A base URL with nothing listening: connection refused immediately.
const DEAD_URL: &str = "http://127.0.0.1:1/";

fn endpoint(name: &str, url: &str) -> EndpointConfig {
    EndpointConfig::new(name, Url::parse(url).unwrap(), format!("{name} endpoint"))
}

fn single_endpoint_registry(server: &MockServer) -> EndpointRegistry {
    EndpointRegistry::new(vec![endpoint("live", &server.uri())]).unwrap()
}

fn logged_in_store(access: &str, refresh: &str) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_session(Session {
        access_token: Some(access.to_string()),
        refresh_token: Some(refresh.to_string()),
        user_id: Some("u-17".to_string()),
        user_name: Some("Ada Rider".to_string()),
        token_timestamp: Some(1_700_000_000),
    }))
}

/// Attach a counting session-failure callback.
fn count_failures(client: &ApiClient) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = Arc::clone(&count);
    client.on_session_failure(move || {
        count_clone.fetch_add(1, Ordering::SeqCst);
    });
    count
}

/// Matches requests carrying no Authorization header at all.
struct NoAuthHeader;

impl wiremock::Match for NoAuthHeader {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}

// ---------------------------------------------------------------------------
// Endpoint fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn network_failure_rotates_and_replays_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rides/available"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "ride_id": "r-1" }])))
        .expect(1)
        .mount(&server)
        .await;

    let registry =
        EndpointRegistry::new(vec![endpoint("dead", DEAD_URL), endpoint("live", &server.uri())])
            .unwrap();
    let client = ApiClient::new(registry, Arc::new(MemoryStore::new()));

    let rides = client.get("/rides/available").await.unwrap();
    assert_eq!(rides[0]["ride_id"], "r-1");

    // The rotation is global: the registry stays switched for later calls.
    assert_eq!(client.registry().current().name, "live");
}

#[tokio::test]
async fn rotation_persists_for_subsequent_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rides/available"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wallet/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "balance": 42 })))
        .expect(1)
        .mount(&server)
        .await;

    let registry =
        EndpointRegistry::new(vec![endpoint("dead", DEAD_URL), endpoint("live", &server.uri())])
            .unwrap();
    let client = ApiClient::new(registry, Arc::new(MemoryStore::new()));

    client.get("/rides/available").await.unwrap();

    // The second logical request starts directly at the rotated endpoint —
    // no extra attempt against the dead one.
    let wallet = client.get("/wallet/info").await.unwrap();
    assert_eq!(wallet["balance"], 42);
}

#[tokio::test]
async fn both_endpoints_down_surfaces_network_error() {
    let registry = EndpointRegistry::new(vec![
        endpoint("dead-a", DEAD_URL),
        endpoint("dead-b", "http://127.0.0.1:2/"),
    ])
    .unwrap();
    let client = ApiClient::new(registry, Arc::new(MemoryStore::new()));

    let err = client.get("/rides/available").await.unwrap_err();
    assert!(matches!(err, ClientError::Network { .. }));

    // Exactly one rotation: the retry flag stops further cycling.
    assert_eq!(client.registry().current().name, "dead-b");
}

#[tokio::test]
async fn single_endpoint_retries_same_endpoint_once() {
    // advance() is a no-op with one candidate; the request is still retried
    // exactly once before failing.
    let registry = EndpointRegistry::new(vec![endpoint("only", DEAD_URL)]).unwrap();
    let client = ApiClient::new(registry, Arc::new(MemoryStore::new()));

    let err = client.get("/rides/available").await.unwrap_err();
    assert!(matches!(err, ClientError::Network { .. }));
    assert_eq!(client.registry().current().name, "only");
}

// ---------------------------------------------------------------------------
// Token refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_replays_original_request_with_new_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wallet/info"))
        .and(bearer_token("stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(bearer_token("rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "fresh-token" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wallet/info"))
        .and(bearer_token("fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "balance": 42 })))
        .expect(1)
        .mount(&server)
        .await;

    let store = logged_in_store("stale-token", "rt-1");
    let client = ApiClient::new(single_endpoint_registry(&server), store.clone());
    let failures = count_failures(&client);

    let wallet = client.get("/wallet/info").await.unwrap();
    assert_eq!(wallet["balance"], 42);
    assert_eq!(failures.load(Ordering::SeqCst), 0);

    // The store holds the new token and a refreshed issuance timestamp;
    // user identity is untouched.
    let session = store.session().unwrap();
    assert_eq!(session.access_token.as_deref(), Some("fresh-token"));
    assert_eq!(session.refresh_token.as_deref(), Some("rt-1"));
    assert_eq!(session.user_id.as_deref(), Some("u-17"));
    assert!(session.token_timestamp.unwrap() > 1_700_000_000);
}

#[tokio::test]
async fn refresh_replay_preserves_method_and_body() {
    let server = MockServer::start().await;
    let trip = json!({ "from": "library", "to": "north-dorms", "seats": 2 });

    Mock::given(method("POST"))
        .and(path("/rides/book"))
        .and(bearer_token("stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "fresh-token" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rides/book"))
        .and(bearer_token("fresh-token"))
        .and(wiremock::matchers::body_json(trip.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "booking_id": "b-9" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = logged_in_store("stale-token", "rt-1");
    let client = ApiClient::new(single_endpoint_registry(&server), store);

    let booking = client.post("/rides/book", &trip).await.unwrap();
    assert_eq!(booking["booking_id"], "b-9");
}

#[tokio::test]
async fn refresh_failure_clears_credentials_and_notifies_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wallet/info"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let store = logged_in_store("stale-token", "rt-expired");
    let client = ApiClient::new(single_endpoint_registry(&server), store.clone());
    let failures = count_failures(&client);

    let err = client.get("/wallet/info").await.unwrap_err();
    assert!(matches!(err, ClientError::AuthExpired));

    // Every persisted field is gone, together.
    let session = store.session().unwrap();
    assert!(session.access_token.is_none());
    assert!(session.refresh_token.is_none());
    assert!(session.user_id.is_none());
    assert!(session.user_name.is_none());
    assert!(session.token_timestamp.is_none());
    assert_eq!(failures.load(Ordering::SeqCst), 1);

    // A later request in the same dead epoch fails again but does not
    // re-notify: the store is empty and the notifier stays quiet.
    let err = client.get("/wallet/info").await.unwrap_err();
    assert!(matches!(err, ClientError::AuthExpired));
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn direct_call_to_refresh_route_never_recurses() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let store = logged_in_store("stale-token", "rt-1");
    let client = ApiClient::new(single_endpoint_registry(&server), store);
    let failures = count_failures(&client);

    // A 401 from the refresh route itself is surfaced raw — no refresh
    // attempt, no session teardown.
    let err = client.post("/auth/refresh", &json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 401, .. }));
    assert_eq!(failures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn second_401_after_refresh_is_not_re_refreshed() {
    let server = MockServer::start().await;

    // The server rejects both the stale and the fresh token: the replay's
    // 401 must surface, not trigger another refresh.
    Mock::given(method("GET"))
        .and(path("/wallet/info"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "fresh-token" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = logged_in_store("stale-token", "rt-1");
    let client = ApiClient::new(single_endpoint_registry(&server), store);

    let err = client.get("/wallet/info").await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 401, .. }));
}

// ---------------------------------------------------------------------------
// Classification pass-through
// ---------------------------------------------------------------------------

#[tokio::test]
async fn other_errors_surface_verbatim_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rides/available"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "message": "seat map unavailable" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(single_endpoint_registry(&server), Arc::new(MemoryStore::new()));

    let err = client.get("/rides/available").await.unwrap_err();
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "seat map unavailable");
        }
        other => panic!("expected Api error, got {other}"),
    }
}

#[tokio::test]
async fn missing_token_sends_request_unauthenticated() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/routes"))
        .and(NoAuthHeader)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(single_endpoint_registry(&server), Arc::new(MemoryStore::new()));
    client.get("/routes").await.unwrap();
}

// ---------------------------------------------------------------------------
// Concurrency: single-flight refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_401s_trigger_exactly_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wallet/info"))
        .and(bearer_token("stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(bearer_token("rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "fresh-token" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wallet/info"))
        .and(bearer_token("fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "balance": 42 })))
        .mount(&server)
        .await;

    let store = logged_in_store("stale-token", "rt-1");
    let client = Arc::new(ApiClient::new(
        single_endpoint_registry(&server),
        store.clone(),
    ));
    let failures = count_failures(&client);

    let results = futures::future::join_all(
        (0..8).map(|_| {
            let client = Arc::clone(&client);
            async move { client.get("/wallet/info").await }
        }),
    )
    .await;

    for result in results {
        assert_eq!(result.unwrap()["balance"], 42);
    }

    // One wire refresh for the whole stampede, no failure notifications.
    assert_eq!(failures.load(Ordering::SeqCst), 0);
    assert_eq!(
        store.session().unwrap().access_token.as_deref(),
        Some("fresh-token")
    );
}

#[tokio::test]
async fn concurrent_refresh_failures_notify_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wallet/info"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let store = logged_in_store("stale-token", "rt-expired");
    let client = Arc::new(ApiClient::new(single_endpoint_registry(&server), store));
    let failures = count_failures(&client);

    let results = futures::future::join_all(
        (0..8).map(|_| {
            let client = Arc::clone(&client);
            async move { client.get("/wallet/info").await }
        }),
    )
    .await;

    for result in results {
        assert!(matches!(result.unwrap_err(), ClientError::AuthExpired));
    }
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}
