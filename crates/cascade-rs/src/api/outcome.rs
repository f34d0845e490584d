//! Result types produced by the [`TransportClient`](super::client::TransportClient).

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Why a transport call failed.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection or transport-level failure. Retryable.
    Network,
    /// The per-attempt timeout fired. Retryable.
    Timeout,
    /// A non-2xx status outside the retryable set. Never retried.
    NonRetryableStatus,
    /// 408, 429, or 5xx. Retryable.
    RetryableStatus,
    /// The body could not be decoded. Never retried.
    ParseError,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::Network | FailureKind::Timeout | FailureKind::RetryableStatus
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureKind::Network => "network",
            FailureKind::Timeout => "timeout",
            FailureKind::NonRetryableStatus => "non-retryable status",
            FailureKind::RetryableStatus => "retryable status",
            FailureKind::ParseError => "parse error",
        };
        f.write_str(label)
    }
}

/// A successful (2xx) response.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    /// Response headers, names lowercased.
    pub headers: BTreeMap<String, String>,
    /// Attempts it took to get this response (1 = first try).
    pub attempt_count: u32,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: BTreeMap::new(),
            attempt_count: 1,
        }
    }

    /// Decode the body as JSON. A decode failure is a [`FailureKind::ParseError`].
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportFailure> {
        serde_json::from_str(&self.body).map_err(|e| TransportFailure {
            kind: FailureKind::ParseError,
            message: format!("failed to parse response: {e}"),
            attempt_count: self.attempt_count,
            status: Some(self.status),
            context: None,
        })
    }
}

/// A terminal failure, surfaced after the retry loop gave up.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
#[error("{kind} failure after {attempt_count} attempt(s): {message}")]
pub struct TransportFailure {
    pub kind: FailureKind,
    pub message: String,
    pub attempt_count: u32,
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    /// The original error when the failure was produced by an interceptor.
    pub context: Option<String>,
}

impl TransportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempt_count: 0,
            status: None,
            context: None,
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = if crate::api::retry::is_retryable_status(status) {
            FailureKind::RetryableStatus
        } else {
            FailureKind::NonRetryableStatus
        };
        let preview: String = body.chars().take(200).collect();
        Self {
            kind,
            message: format!("HTTP {status}: {preview}"),
            attempt_count: 0,
            status: Some(status),
            context: None,
        }
    }

    pub fn with_attempts(mut self, attempt_count: u32) -> Self {
        self.attempt_count = attempt_count;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Discriminated result of [`TransportClient::execute`](super::client::TransportClient::execute).
#[derive(Clone, Debug, PartialEq)]
pub enum TransportOutcome {
    Success(TransportResponse),
    Failure(TransportFailure),
}

impl TransportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransportOutcome::Success(_))
    }

    pub fn attempt_count(&self) -> u32 {
        match self {
            TransportOutcome::Success(r) => r.attempt_count,
            TransportOutcome::Failure(f) => f.attempt_count,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportOutcome::Success(r) => Some(r.status),
            TransportOutcome::Failure(f) => f.status,
        }
    }

    pub fn into_result(self) -> Result<TransportResponse, TransportFailure> {
        match self {
            TransportOutcome::Success(r) => Ok(r),
            TransportOutcome::Failure(f) => Err(f),
        }
    }
}

impl From<Result<TransportResponse, TransportFailure>> for TransportOutcome {
    fn from(result: Result<TransportResponse, TransportFailure>) -> Self {
        match result {
            Ok(r) => TransportOutcome::Success(r),
            Err(f) => TransportOutcome::Failure(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_failures_are_classified() {
        assert_eq!(
            TransportFailure::from_status(503, "busy").kind,
            FailureKind::RetryableStatus
        );
        assert_eq!(
            TransportFailure::from_status(429, "").kind,
            FailureKind::RetryableStatus
        );
        assert_eq!(
            TransportFailure::from_status(404, "missing").kind,
            FailureKind::NonRetryableStatus
        );
    }

    #[test]
    fn json_decode_failure_is_parse_error() {
        let response = TransportResponse::new(200, "not json");
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert_eq!(err.kind, FailureKind::ParseError);
        assert!(!err.is_retryable());
        assert_eq!(err.status, Some(200));
    }

    #[test]
    fn failure_display_mentions_kind_and_attempts() {
        let failure = TransportFailure::new(FailureKind::Timeout, "deadline elapsed").with_attempts(3);
        let text = failure.to_string();
        assert!(text.contains("timeout"));
        assert!(text.contains("3 attempt"));
    }

    #[test]
    fn outcome_accessors() {
        let ok = TransportOutcome::Success(TransportResponse::new(201, "{}"));
        assert!(ok.is_success());
        assert_eq!(ok.status(), Some(201));
        assert_eq!(ok.attempt_count(), 1);
        assert!(ok.into_result().is_ok());
    }
}
