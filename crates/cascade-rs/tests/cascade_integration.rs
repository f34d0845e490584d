//! End-to-end cascade tests against a local axum server standing in for
//! the completion, encyclopedia and search upstreams.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use cascade_rs::api::{TransportClient, TransportConfig};
use cascade_rs::cascade::AttemptOutcome;
use cascade_rs::prelude::*;
use serde_json::{Value, json};

const AUSTIN_EXTRACT: &str = "Austin is the capital city of the U.S. state of Texas. \
    It is known for its live music scene, earning it the nickname \"Live Music Capital of the World\".";

#[derive(Clone, Default)]
struct Upstream {
    completion_calls: Arc<Mutex<Vec<Option<String>>>>,
    titles: Arc<Mutex<Vec<String>>>,
    searches: Arc<Mutex<Vec<String>>>,
}

async fn rate_limited(State(up): State<Upstream>, headers: HeaderMap) -> StatusCode {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    up.completion_calls.lock().unwrap().push(auth);
    StatusCode::TOO_MANY_REQUESTS
}

async fn summary(State(up): State<Upstream>, Path(title): Path<String>) -> Json<Value> {
    up.titles.lock().unwrap().push(title.clone());
    Json(json!({
        "type": "standard",
        "title": title,
        "extract": AUSTIN_EXTRACT,
    }))
}

async fn instant_answer(
    State(up): State<Upstream>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Json<Value> {
    up.searches
        .lock()
        .unwrap()
        .push(params.get("q").cloned().unwrap_or_default());
    Json(json!({"AbstractText": "Austin, Texas.", "AbstractSource": "Wikipedia"}))
}

async fn spawn_upstream() -> (Upstream, String) {
    let upstream = Upstream::default();
    let app = Router::new()
        .route("/llm/chat/completions", post(rate_limited))
        .route("/wiki/page/summary/{title}", get(summary))
        .route("/ddg/", get(instant_answer))
        .with_state(upstream.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (upstream, format!("http://{addr}"))
}

fn quick(config: TransportConfig) -> TransportClient {
    TransportClient::new(config.with_retry_delay(Duration::from_millis(10))).unwrap()
}

#[tokio::test]
async fn rate_limited_completion_falls_through_to_encyclopedia() {
    let (upstream, base) = spawn_upstream().await;

    let completion = CompletionProvider::with_client(
        CompletionSettings {
            base_url: format!("{base}/llm"),
            ..Default::default()
        },
        quick(TransportConfig::for_completion()),
        "sk-test".to_string(),
    );
    let encyclopedia = EncyclopediaProvider::with_client(format!("{base}/wiki"), quick(TransportConfig::default()));

    let orchestrator = FallbackOrchestrator::builder()
        .register_provider(completion, None)
        .register_provider(encyclopedia, None)
        .with_observer(LoggingObserver)
        .build();

    let result = orchestrator.resolve("live music in Austin tonight").await;

    assert_eq!(result.winner, "encyclopedia");
    assert_eq!(result.text, AUSTIN_EXTRACT);
    assert_eq!(result.attempted, 2);
    assert_eq!(
        result.attempts[0].outcome,
        AttemptOutcome::Failed {
            error: ProviderError::RateLimited
        }
    );
    assert!(matches!(result.attempts[1].outcome, AttemptOutcome::Accepted { .. }));

    // Completion transport: 2 retries, so 3 calls, each authenticated.
    let calls = upstream.completion_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|a| a.as_deref() == Some("Bearer sk-test")));
    assert_eq!(*upstream.titles.lock().unwrap(), vec!["Austin".to_string()]);
}

#[tokio::test]
async fn config_driven_cascade_skips_short_answers() {
    let (upstream, base) = spawn_upstream().await;
    let config = CascadeConfig::from_json(&format!(
        r#"{{
            "transport": {{ "retry_delay_ms": 10 }},
            "providers": [
                {{ "type": "completion", "base_url": "{base}/llm", "api_key_env": "CASCADE_TEST_KEY" }},
                {{ "type": "search", "base_url": "{base}/ddg" }},
                {{ "type": "encyclopedia", "base_url": "{base}/wiki" }}
            ]
        }}"#
    ))
    .unwrap();

    let orchestrator = config.build_orchestrator(|_| None).unwrap();
    let result = orchestrator.resolve("museums near Austin").await;

    assert_eq!(result.winner, "encyclopedia");
    assert!(matches!(
        &result.attempts[0].outcome,
        AttemptOutcome::Failed {
            error: ProviderError::NotConfigured(_)
        }
    ));
    assert!(matches!(result.attempts[1].outcome, AttemptOutcome::Rejected { .. }));

    // Unconfigured completion never touches the network.
    assert!(upstream.completion_calls.lock().unwrap().is_empty());
    assert_eq!(*upstream.searches.lock().unwrap(), vec!["museums near Austin".to_string()]);
}

#[tokio::test]
async fn unreachable_upstreams_end_in_deterministic_fallback() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let encyclopedia = EncyclopediaProvider::with_client(
        format!("{dead}/wiki"),
        quick(TransportConfig::default().with_retries(1)),
    );
    let search = SearchProvider::with_client(format!("{dead}/ddg"), quick(TransportConfig::default().with_retries(1)));

    let orchestrator = FallbackOrchestrator::builder()
        .register_provider(encyclopedia, None)
        .register_provider(search, None)
        .build();

    let first = orchestrator.resolve("jazz bars in Chicago").await;
    let second = orchestrator.resolve("jazz bars in Chicago").await;

    assert!(first.is_fallback());
    assert_eq!(first.attempted, 2);
    assert!(first.text.contains("Chicago"));
    assert_eq!(first.text, second.text);
    assert!(first.attempts.iter().all(|a| matches!(
        &a.outcome,
        AttemptOutcome::Failed {
            error: ProviderError::Unavailable(_)
        }
    )));
}
