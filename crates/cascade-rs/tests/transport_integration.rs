//! Integration tests for the transport client over real HTTP.
//!
//! These tests start an axum server on a random port and drive the
//! reqwest-backed `TransportClient` against it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, Method as HttpMethod, StatusCode};
use axum::routing::{any, get};
use axum::{Json, Router};
use cascade_rs::api::{
    FailureKind, RequestIdInterceptor, RequestOptions, TransportClient, TransportConfig, TransportOutcome,
};
use serde::Deserialize;
use serde_json::{Value, json};

/// Helper: serve `app` on port 0 and return its base URL.
async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[derive(Clone, Default)]
struct Hits(Arc<AtomicU32>);

impl Hits {
    fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

async fn unavailable(State(hits): State<Hits>) -> StatusCode {
    hits.bump();
    StatusCode::SERVICE_UNAVAILABLE
}

async fn missing(State(hits): State<Hits>) -> (StatusCode, &'static str) {
    hits.bump();
    (StatusCode::NOT_FOUND, "no such venue")
}

async fn flaky(State(hits): State<Hits>) -> Result<Json<Value>, StatusCode> {
    if hits.bump() <= 2 {
        Err(StatusCode::BAD_GATEWAY)
    } else {
        Ok(Json(json!({"venue": "Stubb's", "capacity": 2200})))
    }
}

async fn slow(State(hits): State<Hits>) -> &'static str {
    hits.bump();
    tokio::time::sleep(Duration::from_millis(500)).await;
    "finally"
}

async fn echo(method: HttpMethod, headers: HeaderMap, body: String) -> Json<Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    Json(json!({
        "method": method.as_str(),
        "body": body,
        "app": header("x-app"),
        "request_id": header("x-request-id"),
        "user_agent": header("user-agent"),
    }))
}

async fn spawn_test_server(hits: Hits) -> String {
    let app = Router::new()
        .route("/unavailable", get(unavailable))
        .route("/missing", get(missing))
        .route("/flaky", get(flaky))
        .route("/slow", get(slow))
        .route("/echo", any(echo))
        .with_state(hits);
    spawn_server(app).await
}

fn fast_config(base: &str) -> TransportConfig {
    TransportConfig::default()
        .with_base_address(base)
        .with_retry_delay(Duration::from_millis(10))
}

// ── Retry behavior ───────────────────────────────────────────────────

#[tokio::test]
async fn retryable_status_is_attempted_max_retries_plus_one() {
    let hits = Hits::default();
    let base = spawn_test_server(hits.clone()).await;
    let client = TransportClient::new(fast_config(&base).with_retries(3)).unwrap();

    let outcome = client.get("/unavailable", RequestOptions::new()).await;
    let TransportOutcome::Failure(failure) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.kind, FailureKind::RetryableStatus);
    assert_eq!(failure.status, Some(503));
    assert_eq!(failure.attempt_count, 4);
    assert_eq!(hits.count(), 4);
}

#[tokio::test]
async fn non_retryable_status_is_attempted_once() {
    let hits = Hits::default();
    let base = spawn_test_server(hits.clone()).await;
    let client = TransportClient::new(fast_config(&base).with_retries(3)).unwrap();

    let outcome = client.get("/missing", RequestOptions::new()).await;
    assert_eq!(outcome.status(), Some(404));
    assert_eq!(outcome.attempt_count(), 1);
    assert!(!outcome.is_success());
    assert_eq!(hits.count(), 1);
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    #[derive(Deserialize)]
    struct Venue {
        venue: String,
        capacity: u32,
    }

    let hits = Hits::default();
    let base = spawn_test_server(hits.clone()).await;
    let client = TransportClient::new(fast_config(&base).with_retries(3)).unwrap();

    let venue: Venue = client.get_json("/flaky", RequestOptions::new()).await.unwrap();
    assert_eq!(venue.venue, "Stubb's");
    assert_eq!(venue.capacity, 2200);
    assert_eq!(hits.count(), 3);
}

#[tokio::test]
async fn per_call_retries_override_client_default() {
    let hits = Hits::default();
    let base = spawn_test_server(hits.clone()).await;
    let client = TransportClient::new(fast_config(&base).with_retries(3)).unwrap();

    let outcome = client.get("/unavailable", RequestOptions::new().retries(0)).await;
    assert_eq!(outcome.attempt_count(), 1);
    assert_eq!(hits.count(), 1);
}

#[tokio::test]
async fn slow_endpoint_times_out_per_attempt() {
    let hits = Hits::default();
    let base = spawn_test_server(hits.clone()).await;
    let client = TransportClient::new(
        fast_config(&base)
            .with_timeout(Duration::from_millis(100))
            .with_retries(1),
    )
    .unwrap();

    let outcome = client.get("/slow", RequestOptions::new()).await;
    let TransportOutcome::Failure(failure) = outcome else {
        panic!("expected timeout");
    };
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert_eq!(failure.attempt_count, 2);
    assert_eq!(hits.count(), 2);
}

#[tokio::test]
async fn unreachable_host_is_network_failure() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = TransportClient::new(fast_config(&format!("http://{addr}")).with_retries(1)).unwrap();
    let outcome = client.get("/anything", RequestOptions::new()).await;
    let TransportOutcome::Failure(failure) = outcome else {
        panic!("expected network failure");
    };
    assert_eq!(failure.kind, FailureKind::Network);
    assert_eq!(failure.attempt_count, 2);
}

// ── Verbs, headers, interceptors ─────────────────────────────────────

#[tokio::test]
async fn verbs_send_method_and_json_body() {
    let base = spawn_test_server(Hits::default()).await;
    let client = TransportClient::new(fast_config(&base)).unwrap();
    let body = json!({"rsvp": true});

    let cases = [
        ("GET", client.get("/echo", RequestOptions::new()).await),
        ("POST", client.post("/echo", body.clone(), RequestOptions::new()).await),
        ("PUT", client.put("/echo", body.clone(), RequestOptions::new()).await),
        ("DELETE", client.delete("/echo", RequestOptions::new()).await),
        ("PATCH", client.patch("/echo", body.clone(), RequestOptions::new()).await),
    ];

    for (method, outcome) in cases {
        let echoed: Value = outcome.into_result().unwrap().json().unwrap();
        assert_eq!(echoed["method"], method);
        if matches!(method, "POST" | "PUT" | "PATCH") {
            let sent: Value = serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
            assert_eq!(sent, body);
        } else {
            assert_eq!(echoed["body"], "");
        }
    }
}

#[tokio::test]
async fn default_headers_and_interceptors_reach_the_server() {
    let base = spawn_test_server(Hits::default()).await;
    let client = TransportClient::new(fast_config(&base).with_header("X-App", "venue-map"))
        .unwrap()
        .with_interceptor(RequestIdInterceptor);

    let echoed: Value = client.get_json("/echo", RequestOptions::new()).await.unwrap();
    assert_eq!(echoed["app"], "venue-map");
    assert!(echoed["request_id"].as_str().unwrap().starts_with("rq-"));
    assert!(echoed["user_agent"].as_str().unwrap().starts_with("cascade-rs"));

    let overridden: Value = client
        .get_json("/echo", RequestOptions::new().header("X-App", "override"))
        .await
        .unwrap();
    assert_eq!(overridden["app"], "override");
}

#[tokio::test]
async fn undecodable_body_is_parse_error_without_retry() {
    let hits = Hits::default();
    let base = spawn_test_server(hits.clone()).await;
    let client = TransportClient::new(fast_config(&base).with_retries(3)).unwrap();

    #[derive(Debug, Deserialize)]
    struct Venue {
        #[allow(dead_code)]
        venue: String,
    }

    let err = client.get_json::<Venue>("/slow", RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::ParseError);
    assert_eq!(hits.count(), 1);
}
