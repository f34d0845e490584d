//! Cascade lifecycle events and observers.
//!
//! The orchestrator reports every step of a `resolve` call through
//! [`CascadeEvent`]. Observers are purely informational: they cannot change
//! the outcome, and a panicking observer is contained.
//!
//! | Observer | Use case |
//! |----------|----------|
//! | [`NoopObserver`] | Default, tests |
//! | [`LoggingObserver`] | Structured logging via `tracing` |
//! | [`FnObserver`] | Quick closures (counters, assertions) |
//! | [`CompositeObserver`] | Fan out to several observers in order |

use crate::providers::ProviderError;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Events emitted by the orchestrator during one `resolve` call.
#[derive(Debug)]
pub enum CascadeEvent<'a> {
    /// A cascade is starting.
    Started {
        trace_id: &'a str,
        query: &'a str,
        providers: usize,
    },
    /// A provider is about to be tried.
    ProviderStarting {
        name: &'a str,
        rank: usize,
        span_id: &'a str,
    },
    /// A provider returned an error (or panicked).
    ProviderFailed {
        name: &'a str,
        error: &'a ProviderError,
        elapsed: Duration,
    },
    /// A provider answered, but the quality gate rejected the text.
    ProviderRejected {
        name: &'a str,
        length: usize,
        elapsed: Duration,
    },
    /// A provider's answer passed the gate. The cascade ends here.
    ProviderAccepted {
        name: &'a str,
        length: usize,
        elapsed: Duration,
    },
    /// No provider passed; the deterministic fallback answered.
    FallbackUsed { attempted: usize },
}

/// Observer of cascade events.
pub trait CascadeObserver: Send + Sync {
    fn on_event(&self, event: &CascadeEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;
impl CascadeObserver for NoopObserver {}

/// Observer backed by a closure.
///
/// ```ignore
/// let observer = FnObserver::new(|event| {
///     if let CascadeEvent::ProviderFailed { name, error, .. } = event {
///         eprintln!("{name}: {error}");
///     }
/// });
/// ```
pub struct FnObserver<F>(F)
where
    F: Fn(&CascadeEvent<'_>) + Send + Sync;

impl<F> FnObserver<F>
where
    F: Fn(&CascadeEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> CascadeObserver for FnObserver<F>
where
    F: Fn(&CascadeEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &CascadeEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches each event to several observers in registration order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Box<dyn CascadeObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: impl CascadeObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }
}

impl CascadeObserver for CompositeObserver {
    fn on_event(&self, event: &CascadeEvent<'_>) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

/// Logs cascade events via `tracing`. Never logs answer text.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingObserver;

impl CascadeObserver for LoggingObserver {
    fn on_event(&self, event: &CascadeEvent<'_>) {
        match event {
            CascadeEvent::Started {
                trace_id,
                providers,
                ..
            } => {
                debug!("[{trace_id}] Cascade starting over {providers} provider(s)");
            }
            CascadeEvent::ProviderStarting { name, rank, span_id } => {
                debug!("[{span_id}] Trying provider #{rank}: {name}");
            }
            CascadeEvent::ProviderFailed {
                name,
                error,
                elapsed,
            } => {
                warn!("Provider {name} failed in {:.1}s: {error}", elapsed.as_secs_f64());
            }
            CascadeEvent::ProviderRejected {
                name,
                length,
                elapsed,
            } => {
                debug!(
                    "Provider {name} answered in {:.1}s but {length} chars did not pass the gate",
                    elapsed.as_secs_f64()
                );
            }
            CascadeEvent::ProviderAccepted {
                name,
                length,
                elapsed,
            } => {
                info!(
                    "Provider {name} accepted ({length} chars, {:.1}s)",
                    elapsed.as_secs_f64()
                );
            }
            CascadeEvent::FallbackUsed { attempted } => {
                info!("All {attempted} provider(s) exhausted; using deterministic fallback");
            }
        }
    }
}
