//! Deadline error types.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Machine-readable code carried by every [`ResponseTimeout`].
pub const ETIMEDOUT: &str = "ETIMEDOUT";

/// Raised when a request deadline elapses before any response activity.
///
/// Handed to the timeout handler of the [`DeadlineLayer`](super::DeadlineLayer),
/// which decides how it is rendered. The default rendering is a plain-text
/// `503 Service Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Response timeout")]
pub struct ResponseTimeout {
    timeout: Duration,
}

impl ResponseTimeout {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The timeout that elapsed, including any extensions added while armed.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn message(&self) -> &'static str {
        "Response timeout"
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }

    pub fn code(&self) -> &'static str {
        ETIMEDOUT
    }
}

impl IntoResponse for ResponseTimeout {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDurationError {
    #[error("duration is empty")]
    Empty,

    #[error("invalid duration value: {0:?}")]
    InvalidNumber(String),

    #[error("unknown duration unit: {0:?}")]
    UnknownUnit(String),

    #[error("duration out of range: {0:?}")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_timeout_fields() {
        let err = ResponseTimeout::new(Duration::from_millis(300));
        assert_eq!(err.to_string(), "Response timeout");
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "ETIMEDOUT");
        assert_eq!(err.timeout(), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn response_timeout_renders_503() {
        let response = ResponseTimeout::new(Duration::from_secs(1)).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Response timeout");
    }
}
