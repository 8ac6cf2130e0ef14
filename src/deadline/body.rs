//! Response lifecycle signals.
//!
//! # Responsibilities
//! - Report end of the response body (`Finished`)
//! - Report a request dropped before completion (`ConnectionClosed`)
//!
//! # Design Decisions
//! - Hyper drops the service future and the response body when a connection
//!   goes away; drop is the teardown signal, nothing is intercepted
//! - A body that reports end of stream counts as finished even if it is
//!   dropped without a final poll

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};

use crate::deadline::timer::{RequestDeadline, ResponseEvent};

/// Response body that settles the request deadline when it ends.
pub struct DeadlineBody {
    inner: Body,
    deadline: Option<RequestDeadline>,
}

impl DeadlineBody {
    pub fn new(inner: Body, deadline: RequestDeadline) -> Self {
        Self {
            inner,
            deadline: Some(deadline),
        }
    }

    fn settle(&mut self, event: ResponseEvent) {
        if let Some(deadline) = self.deadline.take() {
            deadline.observe(event);
        }
    }
}

impl fmt::Debug for DeadlineBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadlineBody")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl HttpBody for DeadlineBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(None) => this.settle(ResponseEvent::Finished),
            Poll::Ready(Some(Err(_))) => this.settle(ResponseEvent::ConnectionClosed),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => {
                this.settle(ResponseEvent::Finished)
            }
            _ => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for DeadlineBody {
    fn drop(&mut self) {
        let event = if self.inner.is_end_stream() {
            ResponseEvent::Finished
        } else {
            ResponseEvent::ConnectionClosed
        };
        self.settle(event);
    }
}

/// Settles the deadline with `ConnectionClosed` if dropped while still armed.
///
/// Held by the service future for as long as the handler runs.
#[derive(Debug)]
pub(crate) struct TeardownGuard {
    deadline: Option<RequestDeadline>,
}

impl TeardownGuard {
    pub(crate) fn new(deadline: RequestDeadline) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    /// The response is on its way; nothing to report on drop.
    pub(crate) fn defuse(mut self) {
        self.deadline = None;
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if let Some(deadline) = self.deadline.take() {
            tracing::debug!("Request dropped before a response was produced");
            deadline.observe(ResponseEvent::ConnectionClosed);
        }
    }
}
