//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deadline::{parse_duration, ParseDurationError};

/// Root configuration for the deadline server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request deadline settings.
    pub deadline: DeadlineConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Request deadline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeadlineConfig {
    /// Timeout per request (e.g., "45ms", "1s", "5000").
    pub timeout: String,

    /// Answer with 503 when the deadline elapses. When false, the request is
    /// only flagged as timed out and handlers decide what to do.
    pub respond: bool,

    /// Request header that may shorten the timeout per request (e.g., "x-request-timeout").
    /// Values of zero or above `timeout` are ignored.
    pub override_header: Option<String>,
}

impl DeadlineConfig {
    /// The configured timeout as a duration.
    pub fn timeout(&self) -> Result<Duration, ParseDurationError> {
        parse_duration(&self.timeout)
    }
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            timeout: "5s".to_string(),
            respond: true,
            override_header: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.deadline.timeout().unwrap(), Duration::from_millis(5000));
        assert!(config.deadline.respond);
        assert!(config.deadline.override_header.is_none());
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [deadline]
            timeout = "300ms"
            respond = false
            "#,
        )
        .unwrap();

        assert_eq!(config.deadline.timeout().unwrap(), Duration::from_millis(300));
        assert!(!config.deadline.respond);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.observability.log_level, "info");
    }
}
