//! Provider cascade: quality gate, deterministic fallback, and the
//! orchestrator that ties them together.
//!
//! - [`orchestrator`]: [`FallbackOrchestrator`] tries providers in rank
//!   order and stops at the first answer the gate accepts.
//! - [`gate`]: [`QualityGate`] predicates. Default: longer than 100 chars.
//! - [`fallback`]: [`DeterministicFallback`], the offline answer of last
//!   resort. Pure and total.
//! - [`events`]: [`CascadeEvent`] / [`CascadeObserver`] observability hooks.

pub mod events;
pub mod fallback;
pub mod gate;
pub mod orchestrator;

pub use events::{CascadeEvent, CascadeObserver, CompositeObserver, FnObserver, LoggingObserver, NoopObserver};
pub use fallback::{DeterministicFallback, FallbackStrategy, QueryContext, TemplateStrategy, extract_place};
pub use gate::{DEFAULT_QUALITY_THRESHOLD, FnGate, MinLengthGate, QualityGate};
pub use orchestrator::{
    AttemptOutcome, AttemptRecord, CascadeResult, FALLBACK_WINNER, FallbackOrchestrator, OrchestratorBuilder,
};
