//! Retrying HTTP transport client.
//!
//! [`TransportClient::execute`] issues one logical call. Each attempt is
//! bounded by its own timeout and threaded through the
//! [`InterceptorPipeline`]. Retryable failures (network errors, timeouts,
//! 408/429/5xx) are retried with exponential backoff up to the policy bound;
//! anything else is returned immediately.
//!
//! The wire is abstracted behind the [`Transport`] trait so callers (and
//! tests) can substitute a backend. [`ReqwestTransport`] is the default.

use super::interceptor::{Interceptor, InterceptorPipeline};
use super::outcome::{FailureKind, TransportFailure, TransportOutcome, TransportResponse};
use super::request::{Method, RequestOptions, RequestSpec};
use super::retry::{
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT, RetryPolicy, StatusClass,
    classify_status,
};
use crate::config::ConfigError;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Default per-attempt timeout for AI-completion transport.
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default retry count for AI-completion transport.
pub const COMPLETION_MAX_RETRIES: u32 = 2;

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("cascade-rs/", env!("CARGO_PKG_VERSION"));

// ── Backend ────────────────────────────────────────────────────────

/// A raw response from the wire, before classification.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }
}

/// A failure below the HTTP layer (no status code was received).
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
#[error("{kind}: {message}")]
pub struct SendError {
    pub kind: FailureKind,
    pub message: String,
}

impl SendError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Network,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: message.into(),
        }
    }
}

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<RawResponse, SendError>> + Send + 'a>>;

/// Sends a single, fully prepared request over the wire.
///
/// Implementations perform exactly one attempt: no retries, no timeouts
/// (the client enforces both). Uses a boxed future so that the trait is
/// dyn-compatible.
pub trait Transport: Send + Sync {
    fn send(&self, request: RequestSpec) -> TransportFuture<'_>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (connection pool reuse).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: RequestSpec) -> TransportFuture<'_> {
        let mut builder = self.client.request(request.method.into(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Box::pin(async move {
            let resp = builder.send().await.map_err(classify_reqwest_error)?;
            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .filter_map(|(k, v)| {
                    v.to_str()
                        .ok()
                        .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
                })
                .collect();
            let body = resp.text().await.map_err(classify_reqwest_error)?;
            Ok(RawResponse {
                status,
                body,
                headers,
            })
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> SendError {
    if e.is_timeout() {
        SendError::timeout(format!("request timed out: {e}"))
    } else {
        SendError::network(format!("request failed: {e}"))
    }
}

// ── Configuration ──────────────────────────────────────────────────

/// Construction-time configuration for a [`TransportClient`].
///
/// # Example
///
/// ```ignore
/// let config = TransportConfig::default()
///     .with_base_address("https://api.example.com/v1")
///     .with_retries(2)
///     .with_header("Accept", "application/json");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct TransportConfig {
    /// Prefix for relative request URLs.
    pub base_address: Option<String>,
    /// Default per-attempt timeout. Default: 30s.
    pub timeout: Duration,
    /// Default retry count. Default: 3.
    pub max_retries: u32,
    /// Default base backoff delay. Default: 1s.
    pub retry_delay: Duration,
    /// Cap on any single backoff delay. Default: none.
    pub max_delay: Option<Duration>,
    /// Apply deterministic jitter to backoff delays. Default: off.
    pub jitter: bool,
    /// Headers sent with every request. Per-request headers win.
    pub default_headers: BTreeMap<String, String>,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_address: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_delay: None,
            jitter: false,
            default_headers: BTreeMap::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl TransportConfig {
    /// Defaults tuned for AI-completion endpoints: 60s timeout, 2 retries.
    pub fn for_completion() -> Self {
        Self {
            timeout: COMPLETION_TIMEOUT,
            max_retries: COMPLETION_MAX_RETRIES,
            ..Default::default()
        }
    }

    pub fn with_base_address(mut self, base: impl Into<String>) -> Self {
        self.base_address = Some(base.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// The retry policy for a request, with the request's overrides applied.
    pub fn retry_policy_for(&self, spec: &RequestSpec) -> RetryPolicy {
        RetryPolicy {
            max_retries: spec.max_retries.unwrap_or(self.max_retries),
            base_delay: spec.retry_delay.unwrap_or(self.retry_delay),
            timeout: spec.timeout.unwrap_or(self.timeout),
            max_delay: self.max_delay,
            jitter: self.jitter,
        }
    }

    /// Resolve a request URL against the base address.
    pub fn resolve_url(&self, target: &str) -> String {
        match &self.base_address {
            Some(base) if !target.contains("://") => {
                if target.is_empty() {
                    base.clone()
                } else {
                    format!(
                        "{}/{}",
                        base.trim_end_matches('/'),
                        target.trim_start_matches('/')
                    )
                }
            }
            _ => target.to_string(),
        }
    }
}

// ── Client ─────────────────────────────────────────────────────────

/// Result of a single attempt.
enum Attempt {
    Response(TransportResponse),
    /// Failure eligible for the retry loop (if its kind is retryable).
    Failed(TransportFailure),
    /// A request interceptor rejected the call. Never retried.
    Aborted(TransportFailure),
}

/// Async HTTP client with per-attempt timeout, bounded retry, and interceptors.
///
/// Configuration and interceptors are fixed at construction; the client is
/// cheap to clone and safe to share across concurrent callers.
#[derive(Clone)]
pub struct TransportClient {
    config: TransportConfig,
    pipeline: InterceptorPipeline,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportClient")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl TransportClient {
    /// Create a client backed by [`ReqwestTransport`].
    pub fn new(config: TransportConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(&config.user_agent)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a client over a custom [`Transport`].
    pub fn with_transport(config: TransportConfig, transport: impl Transport + 'static) -> Self {
        Self {
            config,
            pipeline: InterceptorPipeline::new(),
            transport: Arc::new(transport),
        }
    }

    /// Append an interceptor (builder pattern).
    pub fn with_interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.pipeline.register(Arc::new(interceptor));
        self
    }

    /// Replace the interceptor pipeline.
    pub fn with_pipeline(mut self, pipeline: InterceptorPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn interceptors(&self) -> &InterceptorPipeline {
        &self.pipeline
    }

    /// Issue one logical call, retrying transient failures.
    pub async fn execute(&self, spec: RequestSpec) -> TransportOutcome {
        let policy = self.config.retry_policy_for(&spec);
        let base = self.effective_spec(spec);
        debug!(
            "{} {} (max_retries={}, timeout={:?})",
            base.method, base.url, policy.max_retries, policy.timeout
        );

        let mut attempts: u32 = 0;
        let result = loop {
            attempts += 1;
            match self.attempt_once(&base, policy.timeout).await {
                Attempt::Response(mut response) => {
                    response.attempt_count = attempts;
                    break Ok(response);
                }
                Attempt::Aborted(failure) => break Err(failure.with_attempts(attempts)),
                Attempt::Failed(failure) => {
                    let failure = failure.with_attempts(attempts);
                    if failure.is_retryable() && policy.allows_another(attempts) {
                        let delay = policy.delay_for_attempt(attempts - 1);
                        debug!(
                            "Attempt {attempts}/{} failed ({}); retrying in {:.1}s",
                            policy.max_attempts(),
                            failure.message,
                            delay.as_secs_f64()
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    break Err(failure);
                }
            }
        };

        match result {
            Ok(response) => match self.pipeline.apply_response(response) {
                Ok(response) => TransportOutcome::Success(response),
                Err(failure) => TransportOutcome::Failure(self.pipeline.apply_error(failure)),
            },
            Err(failure) => {
                warn!(
                    "{} {} failed after {} attempt(s): {}",
                    base.method, base.url, failure.attempt_count, failure.message
                );
                TransportOutcome::Failure(self.pipeline.apply_error(failure))
            }
        }
    }

    /// Apply client defaults: resolved URL, then default headers under the
    /// request's own headers.
    fn effective_spec(&self, spec: RequestSpec) -> RequestSpec {
        let mut headers = self.config.default_headers.clone();
        headers.extend(spec.headers);
        RequestSpec {
            url: self.config.resolve_url(&spec.url),
            headers,
            ..spec
        }
    }

    async fn attempt_once(&self, base: &RequestSpec, default_timeout: Duration) -> Attempt {
        let prepared = match self.pipeline.apply_request(base.clone()) {
            Ok(spec) => spec,
            Err(failure) => return Attempt::Aborted(failure),
        };
        let timeout = prepared.timeout.unwrap_or(default_timeout);

        let start = Instant::now();
        let sent = tokio::time::timeout(timeout, self.transport.send(prepared)).await;
        let elapsed = start.elapsed();

        match sent {
            Err(_) => {
                trace!("Attempt timed out after {:.1}s", elapsed.as_secs_f64());
                Attempt::Failed(TransportFailure::new(
                    FailureKind::Timeout,
                    format!("no response within {:.1}s", timeout.as_secs_f64()),
                ))
            }
            Ok(Err(e)) => {
                trace!("Attempt failed after {:.1}s: {e}", elapsed.as_secs_f64());
                Attempt::Failed(TransportFailure::new(e.kind, e.message))
            }
            Ok(Ok(raw)) => {
                debug!(
                    "HTTP {} in {:.1}s ({} bytes)",
                    raw.status,
                    elapsed.as_secs_f64(),
                    raw.body.len()
                );
                match classify_status(raw.status) {
                    StatusClass::Success => Attempt::Response(TransportResponse {
                        status: raw.status,
                        body: raw.body,
                        headers: raw.headers,
                        attempt_count: 0,
                    }),
                    StatusClass::Retryable | StatusClass::Fatal => {
                        Attempt::Failed(TransportFailure::from_status(raw.status, &raw.body))
                    }
                }
            }
        }
    }

    // ── Verb helpers ───────────────────────────────────────────────

    async fn call(
        &self,
        method: Method,
        url: impl Into<String>,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> TransportOutcome {
        let mut spec = RequestSpec::new(method, url).with_options(options);
        spec.body = body;
        self.execute(spec).await
    }

    pub async fn get(&self, url: impl Into<String>, options: RequestOptions) -> TransportOutcome {
        self.call(Method::Get, url, None, options).await
    }

    pub async fn post(
        &self,
        url: impl Into<String>,
        body: serde_json::Value,
        options: RequestOptions,
    ) -> TransportOutcome {
        self.call(Method::Post, url, Some(body), options).await
    }

    pub async fn put(
        &self,
        url: impl Into<String>,
        body: serde_json::Value,
        options: RequestOptions,
    ) -> TransportOutcome {
        self.call(Method::Put, url, Some(body), options).await
    }

    pub async fn delete(&self, url: impl Into<String>, options: RequestOptions) -> TransportOutcome {
        self.call(Method::Delete, url, None, options).await
    }

    pub async fn patch(
        &self,
        url: impl Into<String>,
        body: serde_json::Value,
        options: RequestOptions,
    ) -> TransportOutcome {
        self.call(Method::Patch, url, Some(body), options).await
    }

    /// `GET` and decode the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> Result<T, TransportFailure> {
        self.get(url, options).await.into_result()?.json()
    }

    /// `POST` and decode the body as JSON.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: impl Into<String>,
        body: serde_json::Value,
        options: RequestOptions,
    ) -> Result<T, TransportFailure> {
        self.post(url, body, options).await.into_result()?.json()
    }
}
