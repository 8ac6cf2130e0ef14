//! Access to the request deadline from handlers.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Request, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::deadline::timer::RequestDeadline;

/// Rejection used when a handler asks for a deadline the layer never attached.
#[derive(Debug, Clone, Copy, Error)]
#[error("request deadline layer is not installed")]
pub struct DeadlineMissing;

impl IntoResponse for DeadlineMissing {
    fn into_response(self) -> Response {
        tracing::error!("Handler requested a RequestDeadline but DeadlineLayer is not installed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

impl<S> FromRequestParts<S> for RequestDeadline
where
    S: Send + Sync,
{
    type Rejection = DeadlineMissing;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestDeadline>()
            .cloned()
            .ok_or(DeadlineMissing)
    }
}

/// Extension trait for reading the deadline off a request.
pub trait RequestDeadlineExt {
    fn deadline(&self) -> Option<&RequestDeadline>;

    /// Whether the request's deadline has fired; false without a deadline.
    fn timed_out(&self) -> bool {
        self.deadline().is_some_and(RequestDeadline::timed_out)
    }
}

impl<B> RequestDeadlineExt for Request<B> {
    fn deadline(&self) -> Option<&RequestDeadline> {
        self.extensions().get::<RequestDeadline>()
    }
}

impl RequestDeadlineExt for Parts {
    fn deadline(&self) -> Option<&RequestDeadline> {
        self.extensions.get::<RequestDeadline>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn missing_layer_rejects_with_500() {
        let app = Router::new().route("/", get(|_deadline: RequestDeadline| async { "Hello" }));

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test(start_paused = true)]
    async fn extension_trait_reads_deadline() {
        let mut request = Request::new(());
        assert!(request.deadline().is_none());
        assert!(!request.timed_out());

        let (deadline, _fired) = RequestDeadline::attach(Duration::from_millis(100), false);
        request.extensions_mut().insert(deadline);
        assert_eq!(
            request.deadline().map(RequestDeadline::timeout),
            Some(Duration::from_millis(100))
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(request.timed_out());

        let (parts, _) = request.into_parts();
        assert!(parts.timed_out());
    }
}
