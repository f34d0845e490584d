//! Correlation IDs for cascades and outbound requests.
//!
//! Each [`resolve`](crate::cascade::FallbackOrchestrator::resolve) call gets a
//! `trace_id`; each provider attempt within it gets a span id derived from
//! that trace. Outbound HTTP requests carry their own `rq-` id via
//! [`RequestIdInterceptor`](super::interceptor::RequestIdInterceptor).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique_suffix() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Counter disambiguates calls within the same clock tick.
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{ts:x}-{count:04x}")
}

/// Generate a unique trace ID for one cascade.
pub fn generate_trace_id() -> String {
    format!("cs-{}", unique_suffix())
}

/// Generate a unique ID for one outbound request.
pub fn generate_request_id() -> String {
    format!("rq-{}", unique_suffix())
}

/// Span ID for the provider tried at `position` (0-based) within a cascade.
pub fn generate_span_id(trace_id: &str, position: usize) -> String {
    format!("{trace_id}:p{position}")
}
