//! Provider adapters: pluggable sources of candidate answers.
//!
//! A [`ProviderAdapter`] exposes one capability, `attempt(query)`, and
//! normalizes whatever its upstream returns into a [`ProviderResult`]. The
//! orchestrator knows nothing about what happens inside `attempt`.
//!
//! Built-in adapters:
//!
//! - [`completion`]: OpenAI-compatible chat completion endpoint.
//! - [`encyclopedia`]: Wikipedia-style REST page summaries.
//! - [`search`]: keyless instant-answer web search.
//! - [`local`]: offline keyword corpus.
//! - [`cache`]: [`CachingProvider`] wrapper that memoizes another adapter.
//!
//! For one-off sources, [`FnProvider`] wraps an async closure.

pub mod cache;
pub mod completion;
pub mod encyclopedia;
pub mod local;
pub mod search;

pub use cache::{CachingProvider, ResponseCache};
pub use completion::{CompletionProvider, CompletionSettings};
pub use encyclopedia::EncyclopediaProvider;
pub use local::LocalProvider;
pub use search::SearchProvider;

use crate::api::{FailureKind, TransportFailure};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Why a provider could not produce an answer.
#[derive(thiserror::Error, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider timed out")]
    Timeout,
    #[error("provider rate limited")]
    RateLimited,
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl From<TransportFailure> for ProviderError {
    fn from(failure: TransportFailure) -> Self {
        match (failure.kind, failure.status) {
            (FailureKind::Timeout, _) => ProviderError::Timeout,
            (_, Some(429)) => ProviderError::RateLimited,
            (_, Some(401 | 403)) => ProviderError::NotConfigured(failure.message),
            (FailureKind::ParseError, _) => ProviderError::InvalidResponse(failure.message),
            _ => ProviderError::Unavailable(failure.to_string()),
        }
    }
}

/// Outcome of a single provider attempt.
pub type ProviderResult = Result<String, ProviderError>;

/// Boxed future returned by [`ProviderAdapter::attempt`].
pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = ProviderResult> + Send + 'a>>;

/// A source of candidate answers.
///
/// Implementations must not panic; failures are reported as
/// [`ProviderError`]. (The orchestrator contains panics anyway and treats
/// them as [`ProviderError::Unavailable`].)
///
/// # Example
///
/// ```ignore
/// struct Static;
///
/// impl ProviderAdapter for Static {
///     fn name(&self) -> &str {
///         "static"
///     }
///
///     fn attempt<'a>(&'a self, query: &'a str) -> ProviderFuture<'a> {
///         Box::pin(async move { Ok(format!("You asked about {query}.")) })
///     }
/// }
/// ```
pub trait ProviderAdapter: Send + Sync {
    /// Human-readable name, reported as the cascade winner.
    fn name(&self) -> &str;

    /// Try to answer `query`.
    fn attempt<'a>(&'a self, query: &'a str) -> ProviderFuture<'a>;
}

// ── FnProvider ─────────────────────────────────────────────────────

type ErasedProviderHandler =
    Box<dyn Fn(String) -> Pin<Box<dyn Future<Output = ProviderResult> + Send>> + Send + Sync>;

/// A closure-based provider.
///
/// Use for stateless sources. Adapters that hold a client or configuration
/// should implement [`ProviderAdapter`] on a struct instead.
///
/// ```ignore
/// let provider = FnProvider::new("echo", |query: String| async move {
///     Ok(format!("echo: {query}"))
/// });
/// ```
pub struct FnProvider {
    name: String,
    handler: ErasedProviderHandler,
}

impl FnProvider {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProviderResult> + Send + 'static,
    {
        let erased = move |query: String| -> Pin<Box<dyn Future<Output = ProviderResult> + Send>> {
            Box::pin(handler(query))
        };
        Self {
            name: name.into(),
            handler: Box::new(erased),
        }
    }
}

impl ProviderAdapter for FnProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt<'a>(&'a self, query: &'a str) -> ProviderFuture<'a> {
        (self.handler)(query.to_string())
    }
}

impl fmt::Debug for FnProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProvider").field("name", &self.name).finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Minimal percent-encoding for URL query parameters.
pub(crate) fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 3);
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Collapse runs of whitespace and trim. Empty input yields `None`.
pub(crate) fn normalize_text(text: &str) -> Option<String> {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() { None } else { Some(joined) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(kind: FailureKind, status: Option<u16>) -> TransportFailure {
        TransportFailure {
            kind,
            message: "m".into(),
            attempt_count: 1,
            status,
            context: None,
        }
    }

    #[test]
    fn transport_failures_map_to_provider_errors() {
        assert_eq!(
            ProviderError::from(failure(FailureKind::Timeout, None)),
            ProviderError::Timeout
        );
        assert_eq!(
            ProviderError::from(failure(FailureKind::RetryableStatus, Some(429))),
            ProviderError::RateLimited
        );
        assert!(matches!(
            ProviderError::from(failure(FailureKind::NonRetryableStatus, Some(401))),
            ProviderError::NotConfigured(_)
        ));
        assert!(matches!(
            ProviderError::from(failure(FailureKind::ParseError, Some(200))),
            ProviderError::InvalidResponse(_)
        ));
        assert!(matches!(
            ProviderError::from(failure(FailureKind::RetryableStatus, Some(503))),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            ProviderError::from(failure(FailureKind::Network, None)),
            ProviderError::Unavailable(_)
        ));
    }

    #[test]
    fn provider_error_serializes_tagged() {
        let json = serde_json::to_value(ProviderError::RateLimited).unwrap();
        assert_eq!(json["kind"], "rate_limited");
        let json = serde_json::to_value(ProviderError::NotConfigured("key".into())).unwrap();
        assert_eq!(json["detail"], "key");
    }

    #[tokio::test]
    async fn fn_provider_delegates() {
        let provider = FnProvider::new("echo", |q: String| async move { Ok(format!("echo: {q}")) });
        assert_eq!(provider.name(), "echo");
        assert_eq!(provider.attempt("jazz").await.unwrap(), "echo: jazz");
    }

    #[test]
    fn urlencoded_escapes_reserved() {
        assert_eq!(urlencoded("live music & tacos"), "live+music+%26+tacos");
        assert_eq!(urlencoded("café"), "caf%C3%A9");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  a \n b\t c "), Some("a b c".into()));
        assert_eq!(normalize_text(" \n "), None);
    }
}
