//! Metrics collection and exposition.
//!
//! # Metrics
//! - `request_deadline_timeouts_total` (counter): deadlines that elapsed
//! - `request_deadline_settled_total` (counter): deadlines settled, by lifecycle event
//! - `request_deadline_late_responses_total` (counter): handler results discarded after a timeout, by outcome
//!
//! # Design Decisions
//! - Without an installed recorder every update is a no-op
//! - Prometheus exposition is optional and off by default

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::deadline::ResponseEvent;

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_timeout() {
    ::metrics::counter!("request_deadline_timeouts_total").increment(1);
}

pub fn record_settled(event: ResponseEvent) {
    ::metrics::counter!("request_deadline_settled_total", "event" => event.as_str()).increment(1);
}

/// `outcome` is "ok" or "error", depending on how the late handler finished.
pub fn record_late_response(outcome: &'static str) {
    ::metrics::counter!("request_deadline_late_responses_total", "outcome" => outcome).increment(1);
}
