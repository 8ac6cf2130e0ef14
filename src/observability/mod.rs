//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request and deadline events produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!     → tracing.rs (request spans with correlation IDs)
//! ```
//!
//! # Design Decisions
//! - Request ID flows into every span, including deadline timer tasks
//! - Metrics are cheap (no recorder means no-op)

pub mod logging;
pub mod metrics;
pub mod tracing;
