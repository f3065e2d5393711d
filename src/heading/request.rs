//! A single heading subscription.

use crate::types::{ErrorReason, HeadingData, HeadingFilter, RequestId, RequestState, Timestamp};
use parking_lot::{Mutex, ReentrantMutex};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::manager::ManagerShared;
use super::observers::{Callback, HeadingStream, Observers};

/// Mutable request state, guarded together so dispatch never sees a torn view.
#[derive(Debug)]
struct RequestInner {
    state: RequestState,
    /// Timestamp of the last reading forwarded to callbacks.
    last_delivered: Option<Timestamp>,
}

/// A subscription to heading updates.
///
/// Created by [`HeadingManager`](super::HeadingManager) in the `Idle` state.
/// Readings only reach callbacks while the request is `Running`; `stop()`
/// ends it for good and removes it from its manager.
///
/// Equality and hashing use the request id only.
pub struct HeadingRequest {
    id: RequestId,
    filter: HeadingFilter,
    inner: Mutex<RequestInner>,
    callbacks: Observers,
    /// Serialises dispatch and stop. Re-entrant so callbacks may call back in.
    delivery: ReentrantMutex<()>,
    manager: Weak<ManagerShared>,
    stream_capacity: usize,
}

impl HeadingRequest {
    pub(crate) fn new(
        filter: HeadingFilter,
        manager: Weak<ManagerShared>,
        stream_capacity: usize,
    ) -> Self {
        Self {
            id: RequestId::next(),
            filter,
            inner: Mutex::new(RequestInner {
                state: RequestState::Idle,
                last_delivered: None,
            }),
            callbacks: Observers::new(),
            delivery: ReentrantMutex::new(()),
            manager,
            stream_capacity,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.inner.lock().state
    }

    pub fn is_expired(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn filter(&self) -> &HeadingFilter {
        &self.filter
    }

    /// Accuracy threshold in degrees, if any.
    pub fn accuracy(&self) -> Option<f64> {
        self.filter.accuracy
    }

    pub fn min_interval(&self) -> Option<Duration> {
        self.filter.min_interval
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    // --- Lifecycle ---

    /// Begin (or resume) delivering readings. No-op once expired.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return;
        }
        inner.state = RequestState::Running;
    }

    /// Stop delivering readings, keeping filters and callbacks. No-op once expired.
    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return;
        }
        inner.state = RequestState::Paused;
    }

    /// Cancel the request.
    ///
    /// Every registered callback receives `Err(ErrorReason::Cancelled)` once,
    /// then the request is removed from its manager. Calling it again does
    /// nothing.
    pub fn stop(&self) {
        self.stop_with_reason(ErrorReason::Cancelled);
    }

    /// Expire the request, deliver `reason` as its final event and drop it
    /// from the manager. Removal happens on every exit path.
    pub(crate) fn stop_with_reason(&self, reason: ErrorReason) {
        let _gate = self.delivery.lock();

        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return;
            }
            inner.state = RequestState::Expired;
        }

        let _removal = RemovalGuard { request: self };

        debug!(request = %self.id, %reason, "heading request expired");
        self.fan_out(&Err(reason), true);
    }

    // --- Callbacks ---

    /// Register an observer. Returns the number of callbacks now registered.
    pub fn register_callback<F>(&self, callback: F) -> usize
    where
        F: Fn(&HeadingData) + Send + Sync + 'static,
    {
        self.callbacks.add(Arc::new(callback))
    }

    /// Register a channel-backed observer with room for `capacity` events.
    pub fn stream(&self, capacity: usize) -> HeadingStream {
        let (stream, callback) = HeadingStream::channel(capacity);
        self.callbacks.add(callback);
        stream
    }

    /// Like [`stream`](Self::stream), using the manager's configured capacity.
    pub fn default_stream(&self) -> HeadingStream {
        self.stream(self.stream_capacity)
    }

    // --- Dispatch ---

    /// Manager-facing entry point for one provider event.
    ///
    /// Returns true if the event was forwarded to callbacks. Only `Running`
    /// requests forward. Readings pass through the accuracy and interval
    /// filters; failures are forwarded unfiltered and never change state.
    pub fn dispatch(&self, data: &HeadingData) -> bool {
        let _gate = self.delivery.lock();

        {
            let mut inner = self.inner.lock();
            if inner.state != RequestState::Running {
                trace!(request = %self.id, state = ?inner.state, "dispatch gated");
                return false;
            }

            if let Ok(heading) = data {
                if !self.filter.accepts_accuracy(heading) {
                    trace!(request = %self.id, accuracy = heading.accuracy, "reading below accuracy threshold");
                    return false;
                }
                if !self.filter.accepts_interval(heading, inner.last_delivered) {
                    trace!(request = %self.id, "reading inside minimum interval");
                    return false;
                }
                inner.last_delivered = Some(heading.timestamp);
            }
        }

        self.fan_out(data, false);
        true
    }

    /// Invoke callbacks in registration order. Non-terminal events stop as
    /// soon as a callback takes the request out of `Running`.
    ///
    /// A panicking callback is logged and skipped; the others still run.
    fn fan_out(&self, data: &HeadingData, terminal: bool) {
        let callbacks: Vec<Callback> = self.callbacks.snapshot();
        for (index, callback) in callbacks.into_iter().enumerate() {
            if !terminal && self.state() != RequestState::Running {
                break;
            }
            if panic::catch_unwind(AssertUnwindSafe(|| callback(data))).is_err() {
                warn!(request = %self.id, callback = index, "heading callback panicked");
            }
        }
    }
}

/// Removes the request from its manager when dropped.
struct RemovalGuard<'a> {
    request: &'a HeadingRequest,
}

impl Drop for RemovalGuard<'_> {
    fn drop(&mut self) {
        if let Some(manager) = self.request.manager.upgrade() {
            manager.remove(self.request.id);
        }
    }
}

impl PartialEq for HeadingRequest {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for HeadingRequest {}

impl Hash for HeadingRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for HeadingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadingRequest")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("filter", &self.filter)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
