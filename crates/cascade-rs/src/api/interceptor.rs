//! Request/response/error interceptors for the transport client.
//!
//! An [`Interceptor`] can rewrite the outgoing [`RequestSpec`], rewrite a
//! successful [`TransportResponse`], or observe and rewrite a terminal
//! [`TransportFailure`]. All three hooks default to pass-through, so an
//! implementor only overrides what it needs.
//!
//! Interceptors run in registration order on the way in *and* on the way
//! out (the outbound chain is not reversed). Each interceptor sees the
//! output of the previous one.
//!
//! Nothing escapes the pipeline: a hook that returns an error or panics
//! turns the call into a [`FailureKind::Network`] failure with the original
//! error kept in [`TransportFailure::context`].

use super::outcome::{FailureKind, TransportFailure, TransportResponse};
use super::request::RequestSpec;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Error returned by an interceptor hook to abort the call.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
#[error("interceptor '{interceptor}' failed: {message}")]
pub struct InterceptorError {
    pub interceptor: String,
    pub message: String,
}

impl InterceptorError {
    pub fn new(interceptor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            interceptor: interceptor.into(),
            message: message.into(),
        }
    }
}

/// A hook that observes or rewrites calls passing through the transport client.
///
/// # Example
///
/// ```ignore
/// struct TagVenueApi;
///
/// impl Interceptor for TagVenueApi {
///     fn name(&self) -> &str {
///         "tag-venue-api"
///     }
///
///     fn on_request(&self, spec: RequestSpec) -> Result<RequestSpec, InterceptorError> {
///         Ok(spec.with_header("X-Client", "venue-map"))
///     }
/// }
/// ```
pub trait Interceptor: Send + Sync {
    /// Name used for diagnostics and [`InterceptorPipeline::unregister`].
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called before every attempt with a fresh copy of the caller's spec.
    fn on_request(&self, spec: RequestSpec) -> Result<RequestSpec, InterceptorError> {
        Ok(spec)
    }

    /// Called once with the final successful response.
    fn on_response(&self, response: TransportResponse) -> Result<TransportResponse, InterceptorError> {
        Ok(response)
    }

    /// Called once with the terminal failure.
    fn on_error(&self, failure: TransportFailure) -> TransportFailure {
        failure
    }
}

/// Ordered collection of interceptors.
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl std::fmt::Debug for InterceptorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorPipeline")
            .field("interceptors", &self.names())
            .finish()
    }
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interceptor at the end of the chain (builder pattern).
    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.register(Arc::new(interceptor));
        self
    }

    /// Add an interceptor at the end of the chain.
    pub fn register(&mut self, interceptor: Arc<dyn Interceptor>) {
        debug!("Registered interceptor: {}", interceptor.name());
        self.interceptors.push(interceptor);
    }

    /// Remove every interceptor with the given name. Returns whether any was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.interceptors.len();
        self.interceptors.retain(|i| i.name() != name);
        self.interceptors.len() != before
    }

    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run request hooks in order.
    pub(crate) fn apply_request(&self, mut spec: RequestSpec) -> Result<RequestSpec, TransportFailure> {
        for interceptor in &self.interceptors {
            let name = interceptor.name();
            trace!("on_request: {name}");
            spec = match catch_unwind(AssertUnwindSafe(|| interceptor.on_request(spec))) {
                Ok(Ok(next)) => next,
                Ok(Err(e)) => return Err(interceptor_failure(name, e.to_string())),
                Err(payload) => return Err(interceptor_failure(name, panic_message(payload.as_ref()))),
            };
        }
        Ok(spec)
    }

    /// Run response hooks in order.
    pub(crate) fn apply_response(
        &self,
        mut response: TransportResponse,
    ) -> Result<TransportResponse, TransportFailure> {
        let attempts = response.attempt_count;
        let status = response.status;
        for interceptor in &self.interceptors {
            let name = interceptor.name();
            trace!("on_response: {name}");
            response = match catch_unwind(AssertUnwindSafe(|| interceptor.on_response(response))) {
                Ok(Ok(next)) => next,
                Ok(Err(e)) => {
                    let mut failure = interceptor_failure(name, e.to_string()).with_attempts(attempts);
                    failure.status = Some(status);
                    return Err(failure);
                }
                Err(payload) => {
                    let mut failure = interceptor_failure(name, panic_message(payload.as_ref()))
                        .with_attempts(attempts);
                    failure.status = Some(status);
                    return Err(failure);
                }
            };
        }
        Ok(response)
    }

    /// Run error hooks in order. A panicking hook turns the failure into a
    /// `Network` failure with the panic as context.
    pub(crate) fn apply_error(&self, mut failure: TransportFailure) -> TransportFailure {
        for interceptor in &self.interceptors {
            let name = interceptor.name();
            trace!("on_error: {name}");
            let attempts = failure.attempt_count;
            let status = failure.status;
            failure = match catch_unwind(AssertUnwindSafe(|| interceptor.on_error(failure))) {
                Ok(next) => next,
                Err(payload) => {
                    let mut contained =
                        interceptor_failure(name, panic_message(payload.as_ref())).with_attempts(attempts);
                    contained.status = status;
                    contained
                }
            };
        }
        failure
    }
}

fn interceptor_failure(name: &str, original: String) -> TransportFailure {
    warn!("Interceptor '{name}' aborted the call: {original}");
    TransportFailure {
        kind: FailureKind::Network,
        message: format!("interceptor '{name}' failed"),
        attempt_count: 0,
        status: None,
        context: Some(original),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

// ── Built-in interceptors ──────────────────────────────────────────

/// Logs requests, responses and failures via `tracing`. Never logs headers
/// or bodies.
#[derive(Clone, Debug, Default)]
pub struct LoggingInterceptor;

impl Interceptor for LoggingInterceptor {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_request(&self, spec: RequestSpec) -> Result<RequestSpec, InterceptorError> {
        debug!(target: "cascade::http", method = %spec.method, url = %spec.url, "sending request");
        Ok(spec)
    }

    fn on_response(&self, response: TransportResponse) -> Result<TransportResponse, InterceptorError> {
        debug!(
            target: "cascade::http",
            status = response.status,
            attempts = response.attempt_count,
            bytes = response.body.len(),
            "response received"
        );
        Ok(response)
    }

    fn on_error(&self, failure: TransportFailure) -> TransportFailure {
        debug!(
            target: "cascade::http",
            kind = %failure.kind,
            attempts = failure.attempt_count,
            "request failed: {}",
            failure.message
        );
        failure
    }
}

/// Injects a fixed set of headers into every request.
///
/// This is how credentials reach network-backed providers: the adapter is
/// constructed with a bearer token and installs it here.
#[derive(Clone, Debug)]
pub struct HeaderInterceptor {
    name: String,
    headers: BTreeMap<String, String>,
}

impl HeaderInterceptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            headers: BTreeMap::new(),
        }
    }

    /// An interceptor that sets `Authorization: Bearer <token>`.
    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self::new("bearer-auth").header("Authorization", format!("Bearer {}", token.as_ref()))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl Interceptor for HeaderInterceptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_request(&self, mut spec: RequestSpec) -> Result<RequestSpec, InterceptorError> {
        for (name, value) in &self.headers {
            spec.headers.insert(name.clone(), value.clone());
        }
        Ok(spec)
    }
}

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Attaches an `X-Request-Id` correlation header unless the caller set one.
#[derive(Clone, Debug, Default)]
pub struct RequestIdInterceptor;

impl Interceptor for RequestIdInterceptor {
    fn name(&self) -> &str {
        "request-id"
    }

    fn on_request(&self, spec: RequestSpec) -> Result<RequestSpec, InterceptorError> {
        if spec.header(REQUEST_ID_HEADER).is_some() {
            return Ok(spec);
        }
        Ok(spec.with_header(REQUEST_ID_HEADER, super::tracing::generate_request_id()))
    }
}
