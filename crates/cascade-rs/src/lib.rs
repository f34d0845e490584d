//! Resilient request layer for information-seeking queries.
//!
//! `cascade-rs` answers a free-text question ("live music in Austin tonight?")
//! by trying an ordered list of heterogeneous sources until one produces an
//! answer good enough to show. If every source fails, a deterministic,
//! offline fallback answers instead, so [`FallbackOrchestrator::resolve`]
//! always returns usable text.
//!
//! Two layers do the work:
//!
//! - A **transport client** ([`api::TransportClient`]) wraps each outbound
//!   HTTP call with a per-attempt timeout, bounded retry with exponential
//!   backoff, and an interceptor pipeline.
//! - A **fallback orchestrator** ([`FallbackOrchestrator`]) drives
//!   [`ProviderAdapter`]s in rank order through a [`QualityGate`] and stops at
//!   the first answer that passes.
//!
//! # Getting started
//!
//! ```ignore
//! use cascade_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ConfigError> {
//!     let completion = CompletionProvider::new(
//!         CompletionSettings::default(),
//!         std::env::var("OPENROUTER_KEY").ok(),
//!     )?;
//!
//!     let orchestrator = FallbackOrchestrator::builder()
//!         .register_provider(completion, None)
//!         .register_provider(EncyclopediaProvider::for_language("en")?, None)
//!         .register_provider(SearchProvider::new(DEFAULT_SEARCH_BASE_URL)?, None)
//!         .with_observer(LoggingObserver)
//!         .build();
//!
//!     let result = orchestrator.resolve("best tacos in Austin").await;
//!     println!("[{}] {}", result.winner, result.text);
//!     Ok(())
//! }
//! ```
//!
//! Or load the provider list from a JSON file with
//! [`CascadeConfig::load`](config::CascadeConfig::load) and
//! [`build_orchestrator`](config::CascadeConfig::build_orchestrator).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Transport client, retry policy, request/outcome types, interceptors, correlation ids |
//! | [`providers`] | [`ProviderAdapter`] trait, [`ProviderError`], built-in adapters, response caching |
//! | [`cascade`] | [`FallbackOrchestrator`], quality gates, deterministic fallback, observers |
//! | [`config`] | JSON configuration file and orchestrator assembly |
//!
//! # Guarantees
//!
//! 1. **`resolve` never fails.** Provider errors, panics, and rejected
//!    answers all mean "try the next one". The last resort is pure and total.
//!
//! 2. **Retries are bounded.** A client with `max_retries = N` makes at most
//!    `N + 1` attempts. Non-retryable 4xx statuses are attempted once.
//!
//! 3. **Providers are tried sequentially.** The first accepted answer
//!    short-circuits the cascade; later providers are never invoked.

pub mod api;
pub mod cascade;
pub mod config;
pub mod prelude;
pub mod providers;

pub use cascade::{CascadeResult, DeterministicFallback, FallbackOrchestrator, QualityGate};
pub use config::{CascadeConfig, ConfigError};
pub use providers::{ProviderAdapter, ProviderError, ProviderResult};
