//! The fallback orchestrator: tries providers in priority order until one
//! answer clears the quality gate, and falls back to the deterministic
//! generator otherwise.
//!
//! `resolve` never fails and never returns empty text. Providers run strictly
//! one at a time; a provider that errors, panics, or returns text the gate
//! rejects simply hands over to the next one.

use super::events::{CascadeEvent, CascadeObserver, NoopObserver};
use super::fallback::DeterministicFallback;
use super::gate::{MinLengthGate, QualityGate};
use crate::api::interceptor::panic_message;
use crate::api::tracing::{generate_span_id, generate_trace_id};
use crate::providers::{ProviderAdapter, ProviderError};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info_span, warn};

/// Winner name reported when the deterministic fallback answered.
pub const FALLBACK_WINNER: &str = "fallback";

/// How one provider attempt ended.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Passed the gate; this provider won.
    Accepted { length: usize },
    /// Answered, but the gate rejected the text.
    Rejected { length: usize },
    Failed { error: ProviderError },
}

/// One provider attempt within a cascade.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct AttemptRecord {
    pub provider: String,
    pub rank: usize,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

/// Result of [`FallbackOrchestrator::resolve`].
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CascadeResult {
    /// Winning provider's name, or [`FALLBACK_WINNER`].
    pub winner: String,
    /// The answer. Never empty.
    pub text: String,
    /// Number of providers tried.
    pub attempted: usize,
    pub trace_id: String,
    pub attempts: Vec<AttemptRecord>,
}

impl CascadeResult {
    pub fn is_fallback(&self) -> bool {
        self.winner == FALLBACK_WINNER
    }
}

struct RankedProvider {
    rank: usize,
    explicit: bool,
    adapter: Arc<dyn ProviderAdapter>,
}

/// Builder for [`FallbackOrchestrator`].
///
/// ```ignore
/// let orchestrator = FallbackOrchestrator::builder()
///     .register_provider(completion, None)
///     .register_provider(encyclopedia, None)
///     .register_provider(local, Some(0)) // try first
///     .with_threshold(100)
///     .with_observer(LoggingObserver)
///     .build();
/// ```
pub struct OrchestratorBuilder {
    providers: Vec<(Option<usize>, Arc<dyn ProviderAdapter>)>,
    gate: Box<dyn QualityGate>,
    fallback: DeterministicFallback,
    observer: Box<dyn CascadeObserver>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            gate: Box::new(MinLengthGate::default()),
            fallback: DeterministicFallback::default(),
            observer: Box::new(NoopObserver),
        }
    }
}

impl OrchestratorBuilder {
    /// Register a provider. Without an explicit rank, the provider's rank is
    /// its registration index. Lower ranks are tried first. On equal ranks an
    /// explicit rank goes before an implicit one; otherwise registration order
    /// is kept.
    pub fn register_provider(self, adapter: impl ProviderAdapter + 'static, rank: Option<usize>) -> Self {
        self.register_shared(Arc::new(adapter), rank)
    }

    /// Register a provider that is shared with other owners.
    pub fn register_shared(mut self, adapter: Arc<dyn ProviderAdapter>, rank: Option<usize>) -> Self {
        self.providers.push((rank, adapter));
        self
    }

    /// Replace the default gate ([`MinLengthGate`] at 100 chars).
    pub fn with_gate(mut self, gate: impl QualityGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    /// Use a [`MinLengthGate`] with the given threshold.
    pub fn with_threshold(self, threshold: usize) -> Self {
        self.with_gate(MinLengthGate::new(threshold))
    }

    pub fn with_fallback(mut self, fallback: DeterministicFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_observer(mut self, observer: impl CascadeObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn build(self) -> FallbackOrchestrator {
        let mut providers: Vec<RankedProvider> = self
            .providers
            .into_iter()
            .enumerate()
            .map(|(index, (rank, adapter))| RankedProvider {
                rank: rank.unwrap_or(index),
                explicit: rank.is_some(),
                adapter,
            })
            .collect();
        providers.sort_by_key(|p| (p.rank, !p.explicit));
        debug!(
            "Orchestrator built with {} provider(s): {}",
            providers.len(),
            providers
                .iter()
                .map(|p| p.adapter.name())
                .collect::<Vec<_>>()
                .join(" → ")
        );

        FallbackOrchestrator {
            providers,
            gate: self.gate,
            fallback: self.fallback,
            observer: self.observer,
        }
    }
}

/// Resolves queries through an ordered provider cascade.
///
/// Configuration is fixed at construction. Concurrent `resolve` calls are
/// independent and share no mutable state.
pub struct FallbackOrchestrator {
    providers: Vec<RankedProvider>,
    gate: Box<dyn QualityGate>,
    fallback: DeterministicFallback,
    observer: Box<dyn CascadeObserver>,
}

impl std::fmt::Debug for FallbackOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackOrchestrator")
            .field("providers", &self.provider_names())
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl FallbackOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Provider names in the order they are tried.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.adapter.name()).collect()
    }

    pub fn fallback(&self) -> &DeterministicFallback {
        &self.fallback
    }

    /// Resolve `query`. Always returns usable text.
    pub async fn resolve(&self, query: &str) -> CascadeResult {
        let trace_id = generate_trace_id();
        let span = info_span!("resolve", trace_id = %trace_id);
        self.run(query, trace_id).instrument(span).await
    }

    /// Resolve `query`, returning only the text.
    pub async fn resolve_text(&self, query: &str) -> String {
        self.resolve(query).await.text
    }

    async fn run(&self, query: &str, trace_id: String) -> CascadeResult {
        self.emit(&CascadeEvent::Started {
            trace_id: &trace_id,
            query,
            providers: self.providers.len(),
        });

        let mut attempts = Vec::with_capacity(self.providers.len());
        for (position, provider) in self.providers.iter().enumerate() {
            let name = provider.adapter.name();
            let span_id = generate_span_id(&trace_id, position);
            self.emit(&CascadeEvent::ProviderStarting {
                name,
                rank: provider.rank,
                span_id: &span_id,
            });

            let start = Instant::now();
            let result = match catch_unwind(AssertUnwindSafe(|| provider.adapter.attempt(query))) {
                Ok(future) => AssertUnwindSafe(future)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(panicked(payload))),
                Err(payload) => Err(panicked(payload)),
            };
            let elapsed = start.elapsed();

            let outcome = match result {
                Ok(text) if self.accepts(&text) => {
                    let length = text.chars().count();
                    self.emit(&CascadeEvent::ProviderAccepted {
                        name,
                        length,
                        elapsed,
                    });
                    attempts.push(record(name, provider.rank, AttemptOutcome::Accepted { length }, start));
                    return CascadeResult {
                        winner: name.to_string(),
                        text,
                        attempted: position + 1,
                        trace_id,
                        attempts,
                    };
                }
                Ok(text) => {
                    let length = text.chars().count();
                    self.emit(&CascadeEvent::ProviderRejected {
                        name,
                        length,
                        elapsed,
                    });
                    AttemptOutcome::Rejected { length }
                }
                Err(error) => {
                    self.emit(&CascadeEvent::ProviderFailed {
                        name,
                        error: &error,
                        elapsed,
                    });
                    AttemptOutcome::Failed { error }
                }
            };
            attempts.push(record(name, provider.rank, outcome, start));
        }

        let attempted = attempts.len();
        self.emit(&CascadeEvent::FallbackUsed { attempted });
        CascadeResult {
            winner: FALLBACK_WINNER.to_string(),
            text: self.fallback.generate(query),
            attempted,
            trace_id,
            attempts,
        }
    }

    /// Gate check. Blank text is never accepted, and a panicking gate rejects.
    fn accepts(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        catch_unwind(AssertUnwindSafe(|| self.gate.passes(text))).unwrap_or_else(|payload| {
            warn!("Quality gate panicked: {}", panic_message(payload.as_ref()));
            false
        })
    }

    fn emit(&self, event: &CascadeEvent<'_>) {
        if catch_unwind(AssertUnwindSafe(|| self.observer.on_event(event))).is_err() {
            warn!("Cascade observer panicked on {event:?}");
        }
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> ProviderError {
    ProviderError::Unavailable(panic_message(payload.as_ref()))
}

fn record(name: &str, rank: usize, outcome: AttemptOutcome, start: Instant) -> AttemptRecord {
    AttemptRecord {
        provider: name.to_string(),
        rank,
        outcome,
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    }
}
