//! Request deadline subsystem.
//!
//! # Data Flow
//! ```text
//! Request enters DeadlineService (layer.rs)
//!     → duration.rs resolves the timeout (fixed or per request)
//!     → timer.rs arms the RequestDeadline, handle stored in extensions
//!     → handler runs; may clear / reset / extend via extract.rs
//!     → response produced: HeadersSent settles the deadline
//!     → body.rs reports Finished at end of stream
//!
//! Deadline elapses first:
//!     → timer.rs sets timed_out
//!     → layer.rs renders ResponseTimeout (error.rs) through the timeout handler
//!     → handler keeps running in the background; its response is discarded
//!
//! Request dropped by the transport:
//!     → body.rs guard reports ConnectionClosed, timer cancelled
//! ```

pub mod body;
pub mod duration;
pub mod error;
pub mod extract;
pub mod layer;
pub mod timer;

pub use body::DeadlineBody;
pub use duration::{parse_duration, TimeoutFn, TimeoutSpec, DEFAULT_TIMEOUT};
pub use error::{ParseDurationError, ResponseTimeout, ETIMEDOUT};
pub use extract::{DeadlineMissing, RequestDeadlineExt};
pub use layer::{DeadlineLayer, DeadlineService, TimeoutHandler};
pub use timer::{RequestDeadline, ResponseEvent};
