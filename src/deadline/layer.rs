//! Tower middleware that attaches a [`RequestDeadline`] to every request.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response},
    response::IntoResponse,
    BoxError,
};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body::Body as HttpBody;
use tower::{Layer, Service};

use crate::config::DeadlineConfig;
use crate::deadline::body::{DeadlineBody, TeardownGuard};
use crate::deadline::duration::{parse_duration, TimeoutSpec};
use crate::deadline::error::{ParseDurationError, ResponseTimeout};
use crate::deadline::timer::{RequestDeadline, ResponseEvent};
use crate::observability::metrics;

/// Renders a [`ResponseTimeout`] into the response sent to the client.
pub type TimeoutHandler = Arc<dyn Fn(ResponseTimeout) -> Response<Body> + Send + Sync>;

/// Layer applying a response deadline to each request.
///
/// ```ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(DeadlineLayer::parse("45ms")?.respond(true));
/// ```
#[derive(Clone)]
pub struct DeadlineLayer {
    timeout: TimeoutSpec,
    respond: bool,
    on_timeout: TimeoutHandler,
}

impl DeadlineLayer {
    /// Fixed timeout for every request.
    pub fn new(timeout: Duration) -> Self {
        Self::from_spec(TimeoutSpec::Fixed(timeout))
    }

    /// Fixed timeout parsed from a string such as `"45ms"` or `"1s"`.
    pub fn parse(timeout: &str) -> Result<Self, ParseDurationError> {
        parse_duration(timeout).map(Self::new)
    }

    /// Timeout computed once from each request as it enters the pipeline.
    pub fn per_request<F>(f: F) -> Self
    where
        F: Fn(&axum::http::request::Parts) -> Duration + Send + Sync + 'static,
    {
        Self::from_spec(TimeoutSpec::per_request(f))
    }

    pub fn from_spec(timeout: TimeoutSpec) -> Self {
        Self {
            timeout,
            respond: true,
            on_timeout: Arc::new(|err: ResponseTimeout| err.into_response()),
        }
    }

    /// Build the layer described by the `[deadline]` config section.
    ///
    /// With an override header configured, a request carrying a parsable
    /// duration in that header may shorten its deadline. Zero and values
    /// above the configured timeout are ignored.
    pub fn from_config(config: &DeadlineConfig) -> Result<Self, ParseDurationError> {
        let timeout = config.timeout()?;

        let layer = match config.override_header.clone() {
            Some(header) => Self::per_request(move |parts| {
                parts
                    .headers
                    .get(header.as_str())
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| parse_duration(value).ok())
                    .and_then(|requested| clamp_override(requested, timeout))
                    .unwrap_or(timeout)
            }),
            None => Self::new(timeout),
        };

        Ok(layer.respond(config.respond))
    }

    /// Whether an elapsed deadline produces the timeout response (default)
    /// or only marks the request as timed out.
    pub fn respond(mut self, respond: bool) -> Self {
        self.respond = respond;
        self
    }

    /// Replace the default `503 Response timeout` rendering.
    pub fn on_timeout<F>(mut self, handler: F) -> Self
    where
        F: Fn(ResponseTimeout) -> Response<Body> + Send + Sync + 'static,
    {
        self.on_timeout = Arc::new(handler);
        self
    }
}

impl Default for DeadlineLayer {
    fn default() -> Self {
        Self::from_spec(TimeoutSpec::default())
    }
}

impl fmt::Debug for DeadlineLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadlineLayer")
            .field("timeout", &self.timeout)
            .field("respond", &self.respond)
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for DeadlineLayer {
    type Service = DeadlineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DeadlineService {
            inner,
            timeout: self.timeout.clone(),
            respond: self.respond,
            on_timeout: self.on_timeout.clone(),
        }
    }
}

/// Service produced by [`DeadlineLayer`].
#[derive(Clone)]
pub struct DeadlineService<S> {
    inner: S,
    timeout: TimeoutSpec,
    respond: bool,
    on_timeout: TimeoutHandler,
}

impl<S: fmt::Debug> fmt::Debug for DeadlineService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadlineService")
            .field("inner", &self.inner)
            .field("timeout", &self.timeout)
            .field("respond", &self.respond)
            .finish_non_exhaustive()
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for DeadlineService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: HttpBody<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // The clone may not be ready; keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let (mut parts, body) = request.into_parts();
        let timeout = self.timeout.resolve(&parts);
        let (deadline, fired) = RequestDeadline::attach(timeout, self.respond);
        parts.extensions.insert(deadline.clone());

        let on_timeout = self.on_timeout.clone();
        let guard = TeardownGuard::new(deadline.clone());
        let handler = inner.call(Request::from_parts(parts, body));

        Box::pin(async move {
            let mut handler = Box::pin(handler);

            let outcome = match fired {
                Some(fired) => tokio::select! {
                    biased;
                    result = &mut handler => result.map(|response| response.map(Body::new)),
                    Ok(err) = fired => {
                        drain_late_response(handler);
                        Ok(on_timeout(err))
                    }
                },
                None => handler.await.map(|response| response.map(Body::new)),
            };

            guard.defuse();
            deadline.observe(ResponseEvent::HeadersSent);

            let response = outcome?;
            Ok(response.map(|body| Body::new(DeadlineBody::new(body, deadline))))
        })
    }
}

/// A client-requested timeout, accepted only if it shortens the deadline.
fn clamp_override(requested: Duration, configured: Duration) -> Option<Duration> {
    if requested.is_zero() {
        tracing::debug!("Zero timeout override ignored");
        return None;
    }
    Some(requested.min(configured))
}

/// Let a handler that missed its deadline run to completion in the
/// background; its response is discarded.
fn drain_late_response<F, T, E>(handler: F)
where
    F: std::future::Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    tokio::spawn(async move {
        let result = handler.await;
        let outcome = late_outcome(&result);
        metrics::record_late_response(outcome);

        match result {
            Ok(_) => tracing::debug!("Handler finished after its deadline, response discarded"),
            Err(_) => tracing::warn!("Handler failed after its deadline"),
        }
    });
}

fn late_outcome<T, E>(result: &Result<T, E>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(_) => "error",
    }
}
