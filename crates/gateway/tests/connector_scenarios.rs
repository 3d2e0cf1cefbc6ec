//! End-to-end scenarios for the connector endpoint, exercised through the
//! full router with scripted stand-ins for the identity endpoint and the
//! device API.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use sha1::{Digest, Sha1};
use tower::ServiceExt;

use sl_domain::config::Config;
use sl_domain::error::{Error, Result};
use sl_domain::transform::OutboundMutation;
use sl_gateway::state::AppState;
use sl_platform::{AccessToken, Ack, DeviceApi, TokenCache, TokenProvider};

const SECRET: &str = "shared-secret";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fakes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hands out distinct tokens and counts fetches.
struct CountingProvider {
    fetches: AtomicUsize,
}

impl CountingProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for CountingProvider {
    async fn fetch(&self) -> Result<AccessToken> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken {
            token: format!("Bearer t{n}"),
            expires_at: chrono::Utc::now().timestamp() + 3600,
        })
    }
}

/// A provider whose identity endpoint is down.
struct FailingProvider;

#[async_trait]
impl TokenProvider for FailingProvider {
    async fn fetch(&self) -> Result<AccessToken> {
        Err(Error::Auth("token endpoint unreachable".into()))
    }
}

/// Replays a scripted sequence of outcomes and records what it was asked.
struct ScriptedApi {
    script: Mutex<VecDeque<Result<Ack>>>,
    calls: AtomicUsize,
    mutations: Mutex<Vec<OutboundMutation>>,
    tokens_seen: Mutex<Vec<String>>,
}

impl ScriptedApi {
    fn new(script: Vec<Result<Ack>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            mutations: Mutex::new(Vec::new()),
            tokens_seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceApi for ScriptedApi {
    async fn set_label(&self, mutation: &OutboundMutation, token: &AccessToken) -> Result<Ack> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.mutations.lock().unwrap().push(mutation.clone());
        self.tokens_seen.lock().unwrap().push(token.token.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Ack { status: 200 }))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn test_state(api: Arc<ScriptedApi>, provider: Arc<dyn TokenProvider>) -> AppState {
    let config = Arc::new(Config::default());
    let margin = config.auth.safety_margin_secs;
    AppState {
        config,
        signature_secret: Arc::new(SECRET.to_owned()),
        tokens: Arc::new(TokenCache::new(provider, margin)),
        devices: api,
    }
}

/// Sign `body` the way the platform does: an HS256 JWT whose `checksum`
/// claim is the hex SHA-1 of the body.
fn sign(body: &[u8], secret: &str) -> String {
    #[derive(serde::Serialize)]
    struct Claims {
        checksum: String,
        iat: i64,
        exp: i64,
    }
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        checksum: hex::encode(Sha1::digest(body)),
        iat: now,
        exp: now + 300,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn event_body(event_type: &str) -> Vec<u8> {
    serde_json::json!({
        "event": {
            "eventId": "evt-1",
            "eventType": event_type,
            "targetName": "projects/p1/devices/d1",
            "timestamp": "2024-05-02T09:00:00Z",
            "data": {
                "temperature": { "value": 21.5, "updateTime": "2024-05-02T09:00:00Z" }
            }
        },
        "labels": {}
    })
    .to_string()
    .into_bytes()
}

fn signed_request(body: &[u8], secret: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/connector")
        .header("content-type", "application/json")
        .header("x-connector-signature", sign(body, secret))
        .body(Body::from(body.to_vec()))
        .unwrap()
}

async fn send(state: AppState, request: Request<Body>) -> StatusCode {
    let app = sl_gateway::api::router().with_state(state);
    app.oneshot(request).await.unwrap().status()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn valid_temperature_event_is_forwarded() {
    let api = ScriptedApi::new(vec![Ok(Ack { status: 200 })]);
    let provider = CountingProvider::new();
    let state = test_state(api.clone(), provider.clone());

    let body = event_body("temperature");
    let status = send(state, signed_request(&body, SECRET)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(api.calls(), 1);
    assert_eq!(provider.count(), 1);
    assert_eq!(
        api.mutations.lock().unwrap()[0],
        OutboundMutation {
            project_id: "p1".into(),
            device_id: "d1".into(),
            label_key: "temperature".into(),
            label_value: "21.5".into(),
        }
    );
}

#[tokio::test]
async fn invalid_signature_stops_everything() {
    let api = ScriptedApi::new(vec![]);
    let provider = CountingProvider::new();
    let state = test_state(api.clone(), provider.clone());

    let body = event_body("temperature");
    let status = send(state, signed_request(&body, "wrong-secret")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(provider.count(), 0, "no token may be fetched");
    assert_eq!(api.calls(), 0, "no outbound call may be made");
}

#[tokio::test]
async fn missing_signature_header_is_unauthorized() {
    let api = ScriptedApi::new(vec![]);
    let state = test_state(api.clone(), CountingProvider::new());

    let body = event_body("temperature");
    let request = Request::builder()
        .method("POST")
        .uri("/v1/connector")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    assert_eq!(send(state, request).await, StatusCode::UNAUTHORIZED);
    assert_eq!(api.calls(), 0);
}

#[tokio::test]
async fn transient_platform_failure_maps_to_unavailable() {
    let api = ScriptedApi::new(vec![Err(Error::Transient(
        "PATCH devices/d1/labels/temperature returned 500".into(),
    ))]);
    let state = test_state(api.clone(), CountingProvider::new());

    let body = event_body("temperature");
    let status = send(state, signed_request(&body, SECRET)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn stale_token_is_refreshed_and_retried_once() {
    let api = ScriptedApi::new(vec![
        Err(Error::Auth("token revoked".into())),
        Ok(Ack { status: 200 }),
    ]);
    let provider = CountingProvider::new();
    let state = test_state(api.clone(), provider.clone());

    let body = event_body("temperature");
    let status = send(state, signed_request(&body, SECRET)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(api.calls(), 2);
    assert_eq!(provider.count(), 2, "initial fetch plus forced refresh");

    let tokens = api.tokens_seen.lock().unwrap();
    assert_ne!(tokens[0], tokens[1], "retry must use the refreshed token");
}

#[tokio::test]
async fn auth_failure_after_forced_refresh_is_bad_gateway() {
    let api = ScriptedApi::new(vec![
        Err(Error::Auth("token revoked".into())),
        Err(Error::Auth("still revoked".into())),
    ]);
    let provider = CountingProvider::new();
    let state = test_state(api.clone(), provider.clone());

    let body = event_body("temperature");
    let status = send(state, signed_request(&body, SECRET)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(api.calls(), 2, "exactly one forced-refresh retry");
    assert_eq!(provider.count(), 2);
}

#[tokio::test]
async fn token_fetch_failure_is_bad_gateway() {
    let api = ScriptedApi::new(vec![]);
    let state = test_state(api.clone(), Arc::new(FailingProvider));

    let body = event_body("temperature");
    let status = send(state, signed_request(&body, SECRET)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(api.calls(), 0);
}

#[tokio::test]
async fn permanent_platform_error_is_internal_error() {
    let api = ScriptedApi::new(vec![Err(Error::Permanent(
        "PATCH devices/d1/labels/temperature returned 404".into(),
    ))]);
    let state = test_state(api.clone(), CountingProvider::new());

    let body = event_body("temperature");
    let status = send(state, signed_request(&body, SECRET)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(api.calls(), 1, "permanent errors are not retried");
}

#[tokio::test]
async fn unsupported_event_type_is_acknowledged_ignore() {
    let api = ScriptedApi::new(vec![]);
    let provider = CountingProvider::new();
    let state = test_state(api.clone(), provider.clone());

    let body = event_body("touch");
    let status = send(state, signed_request(&body, SECRET)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(provider.count(), 0);
    assert_eq!(api.calls(), 0);
}

#[tokio::test]
async fn malformed_payload_is_bad_request() {
    let api = ScriptedApi::new(vec![]);
    let state = test_state(api.clone(), CountingProvider::new());

    let body = br#"{"event": {"eventType": "temperature", "targetName": "bogus"}}"#;
    let status = send(state, signed_request(body, SECRET)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(api.calls(), 0);
}

#[tokio::test]
async fn health_probe_is_public() {
    let api = ScriptedApi::new(vec![]);
    let state = test_state(api, CountingProvider::new());

    let request = Request::builder()
        .method("GET")
        .uri("/v1/health")
        .body(Body::empty())
        .unwrap();

    assert_eq!(send(state, request).await, StatusCode::OK);
}
