//! HTTP transport layer: retrying client, request/response types, and interceptors.
//!
//! Every network-backed provider goes through a [`TransportClient`]:
//!
//! - [`retry`] decides which failures are transient (network errors,
//!   timeouts, 408/429/5xx) and computes the exponential backoff schedule.
//!   Never retries other 4xx statuses.
//! - [`client`] runs the attempt loop with a per-attempt timeout over a
//!   pluggable [`Transport`] backend.
//! - [`interceptor`] hooks let callers rewrite requests, responses, and
//!   failures. Authentication, request ids, and logging are built in.
//! - [`tracing`] generates correlation ids for cascades and requests.

pub mod client;
pub mod interceptor;
pub mod outcome;
pub mod request;
pub mod retry;
pub mod tracing;

pub use client::{
    RawResponse, ReqwestTransport, SendError, Transport, TransportClient, TransportConfig,
    TransportFuture,
};
pub use interceptor::{
    HeaderInterceptor, Interceptor, InterceptorError, InterceptorPipeline, LoggingInterceptor,
    RequestIdInterceptor,
};
pub use outcome::{FailureKind, TransportFailure, TransportOutcome, TransportResponse};
pub use request::{Method, RequestOptions, RequestSpec};
pub use retry::RetryPolicy;
pub use tracing::{generate_request_id, generate_trace_id};
