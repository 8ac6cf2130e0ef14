//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, request deadline)
//! - Serve on a listener until shutdown is signalled

use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, Query},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::deadline::{DeadlineLayer, ParseDurationError, RequestDeadline};
use crate::http::request::MakeRequestUuidV4;
use crate::observability::tracing::request_span;

/// HTTP server guarding every route with a request deadline.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a server with the built-in routes.
    pub fn new(config: ServerConfig) -> Result<Self, ParseDurationError> {
        Self::with_routes(config, default_routes())
    }

    /// Create a server for the given routes.
    pub fn with_routes(config: ServerConfig, routes: Router) -> Result<Self, ParseDurationError> {
        let deadline = DeadlineLayer::from_config(&config.deadline)?;
        tracing::debug!(deadline = ?deadline, "Deadline layer configured");

        let router = Self::build_router(routes, deadline);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(routes: Router, deadline: DeadlineLayer) -> Router {
        routes
            .layer(deadline)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(request_span::<Body>))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            timeout = %self.config.deadline.timeout,
            respond = self.config.deadline.respond,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn default_routes() -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/delay/{ms}", get(delay))
}

async fn hello() -> &'static str {
    "Hello"
}

#[derive(Debug, Deserialize)]
struct DelayParams {
    /// Milliseconds to add to the deadline before waiting.
    extend: Option<u64>,
}

/// Wait `ms` milliseconds before answering, optionally extending the deadline first.
async fn delay(
    deadline: RequestDeadline,
    Path(ms): Path<u64>,
    Query(params): Query<DelayParams>,
) -> String {
    if let Some(extra) = params.extend {
        deadline.add_timeout(Duration::from_millis(extra));
    }

    tokio::time::sleep(Duration::from_millis(ms)).await;

    if deadline.timed_out() {
        tracing::debug!(delay_ms = ms, "Deadline passed while waiting");
    }

    format!(
        "Hello after {}ms, {}ms left",
        ms,
        deadline.timeout_left().as_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::http::request::X_REQUEST_ID;

    fn server(timeout: &str) -> HttpServer {
        let mut config = ServerConfig::default();
        config.deadline.timeout = timeout.to_string();
        HttpServer::new(config).unwrap()
    }

    async fn send(router: Router, uri: &str) -> axum::response::Response {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        router.oneshot(request).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn hello_has_request_id() {
        let response = send(server("300ms").router(), "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_past_deadline_times_out() {
        let response = send(server("300ms").router(), "/delay/400").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test(start_paused = true)]
    async fn extended_delay_succeeds() {
        let response = send(server("300ms").router(), "/delay/400?extend=200").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Hello after 400ms, 100ms left");
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let mut config = ServerConfig::default();
        config.deadline.timeout = "whenever".to_string();
        assert!(HttpServer::new(config).is_err());
    }
}
