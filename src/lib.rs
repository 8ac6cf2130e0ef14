//! Request deadline middleware for axum/tower HTTP services.
//!
//! Every request gets a deadline when it enters the pipeline. The deadline is
//! cancelled once the response starts, finishes, or the connection goes away.
//! If it elapses first, the request is flagged as timed out and, unless
//! disabled, answered with `503 Service Unavailable`.

pub mod config;
pub mod deadline;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use deadline::{DeadlineLayer, RequestDeadline, RequestDeadlineExt, ResponseTimeout};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
