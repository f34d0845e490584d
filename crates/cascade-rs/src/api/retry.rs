//! Retry policy and exponential backoff.
//!
//! Retries transient HTTP failures (408, 429, any 5xx, network errors,
//! per-attempt timeouts). Every other non-2xx status is fatal on the first
//! attempt: the request itself is presumed invalid, so sending it again
//! cannot help.

use std::time::Duration;

/// Default maximum number of retries for the generic transport.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default per-attempt timeout for the generic transport.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for retry behavior.
///
/// Total attempts for one logical call never exceed `max_retries + 1`.
/// The delay before retry `i` (0-indexed) is `base_delay * 2^i`, optionally
/// capped by `max_delay` and scaled by a jitter factor when `jitter` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries (0 = a single attempt, no retries).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Timeout applied to each attempt individually.
    pub timeout: Duration,
    /// Upper bound on any single backoff delay. `None` leaves it unbounded.
    pub max_delay: Option<Duration>,
    /// Scale delays down by a deterministic jitter factor.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_DELAY,
            timeout: DEFAULT_TIMEOUT,
            max_delay: None,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given number of retries. Uses default delays.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// A policy that never retries.
    pub fn no_retries() -> Self {
        Self::with_retries(0)
    }

    /// Upper bound on attempts for one logical call.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to sleep before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponential = 1u32
            .checked_shl(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX);

        let capped = match self.max_delay {
            Some(max) => exponential.min(max),
            None => exponential,
        };

        if self.jitter {
            // Deterministic factor table; no RNG on the request path.
            let jitter_factor = match attempt % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                _ => 0.85,
            };
            capped.mul_f64(jitter_factor)
        } else {
            capped
        }
    }

    /// Whether another attempt is allowed after `attempts_made` attempts.
    pub fn allows_another(&self, attempts_made: u32) -> bool {
        attempts_made <= self.max_retries
    }
}

/// Coarse classification of an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx.
    Success,
    /// 408, 429, or any 5xx.
    Retryable,
    /// Every other status.
    Fatal,
}

/// Classify an HTTP status code for the retry loop.
pub fn classify_status(status: u16) -> StatusClass {
    if (200..300).contains(&status) {
        StatusClass::Success
    } else if is_retryable_status(status) {
        StatusClass::Retryable
    } else {
        StatusClass::Fatal
    }
}

/// Whether a status code is worth retrying: 408, 429, or >= 500.
pub fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}
