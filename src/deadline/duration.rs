//! Timeout durations.
//!
//! # Responsibilities
//! - Parse human-readable duration strings ("45ms", "1s", "1.5 hours")
//! - Describe where a request's timeout comes from (fixed or per request)
//!
//! # Design Decisions
//! - A bare number is read as milliseconds
//! - Units are case-insensitive and may be separated from the number by spaces
//! - Per-request timeouts are plain functions evaluated once, at attach time

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::request::Parts;

use crate::deadline::error::ParseDurationError;

/// Timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

const MILLIS_PER_SECOND: f64 = 1_000.0;
const MILLIS_PER_MINUTE: f64 = 60.0 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: f64 = 60.0 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: f64 = 24.0 * MILLIS_PER_HOUR;
const MILLIS_PER_WEEK: f64 = 7.0 * MILLIS_PER_DAY;
const MILLIS_PER_YEAR: f64 = 365.25 * MILLIS_PER_DAY;

/// Parse a duration string such as `"45ms"`, `"1s"`, `"2 minutes"` or `"300"`.
pub fn parse_duration(input: &str) -> Result<Duration, ParseDurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseDurationError::Empty);
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| ParseDurationError::InvalidNumber(number.to_string()))?;

    let unit = unit.trim().to_ascii_lowercase();
    let scale = unit_millis(&unit).ok_or(ParseDurationError::UnknownUnit(unit))?;

    let nanos = (value * scale * 1_000_000.0).round();
    if !nanos.is_finite() || nanos < 0.0 || nanos > u64::MAX as f64 {
        return Err(ParseDurationError::OutOfRange(trimmed.to_string()));
    }

    Ok(Duration::from_nanos(nanos as u64))
}

fn unit_millis(unit: &str) -> Option<f64> {
    let millis = match unit {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => MILLIS_PER_SECOND,
        "m" | "min" | "mins" | "minute" | "minutes" => MILLIS_PER_MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => MILLIS_PER_HOUR,
        "d" | "day" | "days" => MILLIS_PER_DAY,
        "w" | "week" | "weeks" => MILLIS_PER_WEEK,
        "y" | "yr" | "yrs" | "year" | "years" => MILLIS_PER_YEAR,
        _ => return None,
    };
    Some(millis)
}

/// Computes a timeout from the head of an incoming request.
pub type TimeoutFn = Arc<dyn Fn(&Parts) -> Duration + Send + Sync>;

/// Where a request's timeout comes from.
#[derive(Clone)]
pub enum TimeoutSpec {
    /// The same timeout for every request.
    Fixed(Duration),
    /// A timeout computed from each request when it enters the pipeline.
    PerRequest(TimeoutFn),
}

impl TimeoutSpec {
    pub fn per_request<F>(f: F) -> Self
    where
        F: Fn(&Parts) -> Duration + Send + Sync + 'static,
    {
        TimeoutSpec::PerRequest(Arc::new(f))
    }

    /// Resolve the timeout for one request.
    pub fn resolve(&self, parts: &Parts) -> Duration {
        match self {
            TimeoutSpec::Fixed(timeout) => *timeout,
            TimeoutSpec::PerRequest(f) => f(parts),
        }
    }
}

impl Default for TimeoutSpec {
    fn default() -> Self {
        TimeoutSpec::Fixed(DEFAULT_TIMEOUT)
    }
}

impl From<Duration> for TimeoutSpec {
    fn from(timeout: Duration) -> Self {
        TimeoutSpec::Fixed(timeout)
    }
}

impl FromStr for TimeoutSpec {
    type Err = ParseDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_duration(s).map(TimeoutSpec::Fixed)
    }
}

impl fmt::Debug for TimeoutSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutSpec::Fixed(timeout) => f.debug_tuple("Fixed").field(timeout).finish(),
            TimeoutSpec::PerRequest(_) => f.write_str("PerRequest(..)"),
        }
    }
}
