//! Per-request deadline state.
//!
//! # States
//! - Armed: a timer task is sleeping until the deadline
//! - Cancelled: disarmed by `clear_timeout` or a response lifecycle event
//! - Fired: the deadline elapsed, `timed_out` is permanently true
//!
//! # State Transitions
//! ```text
//! Armed → Armed: reset_timeout / add_timeout (timer replaced)
//! Armed → Cancelled: clear_timeout, HeadersSent, Finished, ConnectionClosed
//! Armed → Fired: deadline elapsed
//! Cancelled/Fired → Armed: reset_timeout, unless a lifecycle event was observed
//! ```
//!
//! # Design Decisions
//! - Each arm bumps a generation; a timer task from an older generation is ignored
//! - Timer tasks hold a weak reference, so they never keep a finished request alive
//! - At most one timeout notification per request, even across re-arms

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::Instrument;

use crate::deadline::duration::DEFAULT_TIMEOUT;
use crate::deadline::error::ResponseTimeout;
use crate::observability::metrics;

/// Stand-in for deadlines too far out to represent as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Response lifecycle events that settle a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseEvent {
    /// The handler produced a response; its head is about to be written.
    HeadersSent,
    /// The response body reached end of stream.
    Finished,
    /// The transport dropped the request before the response completed.
    ConnectionClosed,
}

impl ResponseEvent {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseEvent::HeadersSent => "headers_sent",
            ResponseEvent::Finished => "finished",
            ResponseEvent::ConnectionClosed => "connection_closed",
        }
    }
}

/// Handle to the deadline of one in-flight request.
///
/// Cloning is cheap; every clone refers to the same deadline. The
/// [`DeadlineLayer`](super::DeadlineLayer) inserts one into the request
/// extensions, where handlers pick it up with the axum extractor or
/// [`RequestDeadlineExt`](super::RequestDeadlineExt).
#[derive(Debug, Clone)]
pub struct RequestDeadline {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    respond: bool,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    /// Timeout reported when the deadline fires.
    timeout: Duration,
    timer: Option<ArmedTimer>,
    generation: u64,
    timed_out: bool,
    settled: Option<ResponseEvent>,
    notify: Option<oneshot::Sender<ResponseTimeout>>,
}

#[derive(Debug)]
struct ArmedTimer {
    deadline: Instant,
    generation: u64,
    task: AbortHandle,
}

impl State {
    fn disarm(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                timer.task.abort();
                true
            }
            None => false,
        }
    }
}

impl RequestDeadline {
    /// Start a deadline of `timeout` from now.
    ///
    /// When `respond` is true, the returned receiver resolves with a
    /// [`ResponseTimeout`] the first time the deadline fires. It resolves
    /// with an error if the deadline settles first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn attach(
        timeout: Duration,
        respond: bool,
    ) -> (Self, Option<oneshot::Receiver<ResponseTimeout>>) {
        let (notify, fired) = if respond {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let deadline = Self {
            shared: Arc::new(Shared {
                respond,
                state: Mutex::new(State {
                    timeout,
                    timer: None,
                    generation: 0,
                    timed_out: false,
                    settled: None,
                    notify,
                }),
            }),
        };

        {
            let mut state = deadline.lock();
            deadline.arm(&mut state, deadline_after(timeout));
        }

        tracing::trace!(timeout = ?timeout, respond, "Request deadline armed");
        (deadline, fired)
    }

    /// Whether the deadline has elapsed at least once.
    pub fn timed_out(&self) -> bool {
        self.lock().timed_out
    }

    /// The current timeout value, including extensions.
    pub fn timeout(&self) -> Duration {
        self.lock().timeout
    }

    /// Whether a firing raises the timeout error or only sets the flag.
    pub fn respond(&self) -> bool {
        self.shared.respond
    }

    /// Whether a timer is currently running.
    pub fn is_armed(&self) -> bool {
        self.lock().timer.is_some()
    }

    /// The first lifecycle event observed, if any; set once and never changed.
    pub fn settled(&self) -> Option<ResponseEvent> {
        self.lock().settled
    }

    /// Time left before the deadline fires; zero when not armed.
    pub fn timeout_left(&self) -> Duration {
        self.lock()
            .timer
            .as_ref()
            .map(|timer| timer.deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Cancel the armed timer. Does nothing if no timer is armed.
    pub fn clear_timeout(&self) {
        if self.lock().disarm() {
            tracing::debug!("Request deadline cleared");
        }
    }

    /// Re-arm the deadline from now, with `timeout` or the 5 second default.
    ///
    /// Has no effect once the response has started or the connection is gone.
    /// A deadline that already fired stays timed out.
    pub fn reset_timeout(&self, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let mut state = self.lock();

        if let Some(event) = state.settled {
            tracing::debug!(event = event.as_str(), "Response settled, deadline not re-armed");
            return;
        }

        state.timeout = timeout;
        self.arm(&mut state, deadline_after(timeout));
        tracing::debug!(timeout = ?timeout, "Request deadline reset");
    }

    /// Push the armed deadline back by `extra`.
    ///
    /// The new deadline is measured from the original arm time, so a
    /// deadline of `D` extended by `X` fires at `D + X` and reports `D + X`.
    /// Does nothing when no timer is armed.
    pub fn add_timeout(&self, extra: Duration) {
        let mut state = self.lock();

        let Some(current) = state.timer.as_ref().map(|timer| timer.deadline) else {
            tracing::debug!(extra = ?extra, "Request deadline not armed, nothing to extend");
            return;
        };
        let Some(deadline) = current.checked_add(extra) else {
            tracing::warn!(extra = ?extra, "Deadline extension out of range, ignored");
            return;
        };

        state.timeout = state.timeout.saturating_add(extra);
        self.arm(&mut state, deadline);
        tracing::debug!(extra = ?extra, timeout = ?state.timeout, "Request deadline extended");
    }

    /// Record a response lifecycle event, cancelling the deadline for good.
    ///
    /// Only the first event is recorded; later ones are no-ops.
    pub fn observe(&self, event: ResponseEvent) {
        let mut state = self.lock();
        let cancelled = state.disarm();

        if state.settled.is_none() {
            state.settled = Some(event);
            state.notify = None;
            metrics::record_settled(event);
            tracing::trace!(event = event.as_str(), cancelled, "Request deadline settled");
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn arm(&self, state: &mut State, deadline: Instant) {
        state.disarm();
        state.generation += 1;

        let generation = state.generation;
        let shared = Arc::downgrade(&self.shared);
        let task = tokio::spawn(
            async move {
                tokio::time::sleep_until(deadline).await;
                if let Some(shared) = shared.upgrade() {
                    RequestDeadline { shared }.fire(generation);
                }
            }
            .in_current_span(),
        );

        state.timer = Some(ArmedTimer {
            deadline,
            generation,
            task: task.abort_handle(),
        });
    }

    fn fire(&self, generation: u64) {
        let pending = {
            let mut state = self.lock();

            match &state.timer {
                Some(timer) if timer.generation == generation => {}
                _ => {
                    tracing::debug!("Stale deadline timer discarded");
                    return;
                }
            }

            state.timer = None;
            state.timed_out = true;
            metrics::record_timeout();
            tracing::warn!(
                timeout = ?state.timeout,
                respond = self.shared.respond,
                "Request deadline elapsed"
            );

            let timeout = state.timeout;
            state.notify.take().map(|tx| (tx, timeout))
        };

        if let Some((tx, timeout)) = pending {
            if tx.send(ResponseTimeout::new(timeout)).is_err() {
                tracing::debug!("Response future gone before timeout was delivered");
            }
        }
    }
}

/// Instant `timeout` from now, capped far in the future instead of overflowing.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}
