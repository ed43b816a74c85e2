//! Error types for metrics acquisition.

use shaper_core::Interrupted;
use thiserror::Error;

/// Longest backend response body carried inside an error, in bytes.
pub const MAX_BODY_BYTES: usize = 512;

/// Result type alias for metrics operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors produced by a [`crate::MetricsSource`].
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The backend was reached but holds no points for the window.
    #[error("no metrics data for the requested window")]
    NoData,

    #[error("metrics client not initialized")]
    NotInitialized,

    #[error("invalid metrics endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("metrics transport error: {0}")]
    Transport(String),

    #[error("metrics backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("decode payload: {0}")]
    Decode(String),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl MetricsError {
    /// Build a backend error, keeping at most [`MAX_BODY_BYTES`] of the body.
    pub fn backend(status: u16, body: &str) -> Self {
        Self::Backend {
            status,
            body: truncate_body(body.trim()),
        }
    }

    /// Whether this is the benign "nothing to report yet" case.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_BODY_BYTES {
        return body.to_string();
    }
    let mut end = MAX_BODY_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}… ({} bytes total)", &body[..end], body.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_keeps_short_body() {
        let err = MetricsError::backend(503, "backend unavailable\n");
        assert_eq!(err.to_string(), "metrics backend returned 503: backend unavailable");
    }

    #[test]
    fn backend_error_truncates_long_body() {
        let body = "x".repeat(4 * MAX_BODY_BYTES);
        let err = MetricsError::backend(500, &body);
        let MetricsError::Backend { body: kept, .. } = &err else {
            panic!("expected backend error");
        };
        assert!(kept.starts_with(&"x".repeat(MAX_BODY_BYTES)));
        assert!(kept.ends_with("(2048 bytes total)"));
        assert!(kept.len() < body.len());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 'é' is two bytes; after the leading 'a' the cut lands mid-char.
        let body = format!("a{}", "é".repeat(MAX_BODY_BYTES));
        let kept = truncate_body(&body);
        let (prefix, _) = kept.split_once('…').unwrap();
        assert_eq!(prefix.len(), MAX_BODY_BYTES - 1);
    }

    #[test]
    fn no_data_is_distinct() {
        assert!(MetricsError::NoData.is_no_data());
        assert!(!MetricsError::NotInitialized.is_no_data());
        assert!(!MetricsError::Transport("refused".into()).is_no_data());
    }

    #[test]
    fn interruption_message_passes_through() {
        let err = MetricsError::from(Interrupted::DeadlineExceeded);
        assert_eq!(err.to_string(), "context deadline exceeded");
    }
}
