//! Convenience re-exports for common `cascade-rs` types.
//!
//! ```ignore
//! use cascade_rs::prelude::*;
//! ```
//!
//! Covers building an orchestrator by hand or from config, the built-in
//! adapters, and the transport client. Low-level pieces (retry
//! classification, correlation-id helpers, the cache itself) stay in their
//! modules.

// ── Transport ───────────────────────────────────────────────────────
pub use crate::api::{
    FailureKind, HeaderInterceptor, Interceptor, LoggingInterceptor, Method, RequestIdInterceptor,
    RequestOptions, RequestSpec, RetryPolicy, TransportClient, TransportConfig, TransportFailure,
    TransportOutcome, TransportResponse,
};

// ── Providers ───────────────────────────────────────────────────────
pub use crate::providers::local::LocalEntry;
pub use crate::providers::search::DEFAULT_SEARCH_BASE_URL;
pub use crate::providers::{
    CachingProvider, CompletionProvider, CompletionSettings, EncyclopediaProvider, FnProvider,
    LocalProvider, ProviderAdapter, ProviderError, ProviderFuture, ProviderResult, SearchProvider,
};

// ── Cascade ─────────────────────────────────────────────────────────
pub use crate::cascade::{
    CascadeEvent, CascadeObserver, CascadeResult, CompositeObserver, DeterministicFallback,
    FallbackOrchestrator, FallbackStrategy, FnGate, FnObserver, LoggingObserver, MinLengthGate,
    QualityGate,
};

// ── Config ──────────────────────────────────────────────────────────
pub use crate::config::{CascadeConfig, ConfigError};
