/// Structured error types for the upstream boundary and the two
/// caller-facing surfaces (aggregator fetches, job enqueue).
///
/// Transient upstream failures are retried at the call site with
/// backoff; fatal ones surface immediately. Nothing in the cache or
/// scaling paths can fail.
use std::time::Duration;

use thiserror::Error;

/// Error raised by the upstream test-management API client.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Network timeout, rate limiting or a 5xx response. Retryable.
    #[error("transient upstream error{}: {message}", fmt_status(.status))]
    Transient { status: Option<u16>, message: String },

    /// A 4xx other than rate limiting. Not retryable.
    #[error("fatal upstream error{}: {message}", fmt_status(.status))]
    Fatal { status: Option<u16>, message: String },
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {})", code),
        None => String::new(),
    }
}

impl UpstreamError {
    pub fn transient(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transient {
            status,
            message: message.into(),
        }
    }

    pub fn fatal(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Fatal {
            status,
            message: message.into(),
        }
    }

    /// Classify an HTTP status code. 429 and 5xx are transient
    /// (rate limiting / server trouble), every other 4xx is fatal.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == 429 || status >= 500 {
            Self::transient(Some(status), message)
        } else {
            Self::fatal(Some(status), message)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } | Self::Fatal { status, .. } => *status,
        }
    }
}

/// Error surface of the paginated aggregator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("upstream batch fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: UpstreamError },
}

/// Error surface of the job engine's enqueue boundary.
///
/// The in-memory engine never rejects work under load (overload
/// degrades to queuing delay); the only refusal is during shutdown.
#[derive(Debug, Clone, Error)]
pub enum EnqueueError {
    #[error("job engine is shutting down")]
    ShuttingDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(UpstreamError::from_status(429, "rate limited").is_transient());
        assert!(UpstreamError::from_status(500, "boom").is_transient());
        assert!(UpstreamError::from_status(503, "unavailable").is_transient());
        assert!(!UpstreamError::from_status(400, "bad request").is_transient());
        assert!(!UpstreamError::from_status(404, "missing").is_transient());
        assert!(!UpstreamError::from_status(403, "forbidden").is_transient());
    }

    #[test]
    fn test_error_display_includes_status() {
        let err = UpstreamError::from_status(502, "bad gateway");
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("transient"));

        let err = UpstreamError::transient(None, "connect timeout");
        assert!(!err.to_string().contains("status"));
    }
}
