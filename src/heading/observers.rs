//! Callback registration and channel-backed streams.

use crate::types::HeadingData;
use crossbeam_channel::{bounded, Receiver, RecvError, RecvTimeoutError, TryRecvError, TrySendError};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A registered observer. Invoked once per delivered event.
pub type Callback = Arc<dyn Fn(&HeadingData) + Send + Sync>;

/// Ordered list of callbacks. Insertion order is kept and duplicates are allowed.
#[derive(Default)]
pub(crate) struct Observers {
    list: RwLock<Vec<Callback>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a callback. Returns the number now registered.
    pub(crate) fn add(&self, callback: Callback) -> usize {
        let mut list = self.list.write();
        list.push(callback);
        list.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.list.read().len()
    }

    /// Copy of the current list, so callbacks run without the lock held.
    pub(crate) fn snapshot(&self) -> Vec<Callback> {
        self.list.read().clone()
    }
}

/// Receiving end of a request's channel subscription.
///
/// Events that arrive while the buffer is full are discarded and counted;
/// the stream itself stays registered until the request stops.
pub struct HeadingStream {
    receiver: Receiver<HeadingData>,
    dropped: Arc<AtomicU64>,
}

impl HeadingStream {
    /// Build the stream and the callback that feeds it.
    pub(crate) fn channel(capacity: usize) -> (Self, Callback) {
        let (sender, receiver) = bounded(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&dropped);
        let callback: Callback = Arc::new(move |data: &HeadingData| {
            match sender.try_send(data.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    counter.fetch_add(1, Ordering::Relaxed);
                    warn!("heading stream buffer full, event dropped");
                }
                // Receiver gone; nothing left to feed
                Err(TrySendError::Disconnected(_)) => {}
            }
        });

        (Self { receiver, dropped }, callback)
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<HeadingData, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<HeadingData, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<HeadingData, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Events discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
