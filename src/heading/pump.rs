//! Dedicated delivery thread between a provider and the manager.

use crate::error::Result;
use crate::types::HeadingData;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use super::manager::HeadingManager;

/// Serialises provider events onto one thread that calls
/// [`HeadingManager::dispatch`] for each, in arrival order.
///
/// Providers push through [`sender`](Self::sender). The thread runs until
/// the pump is shut down or dropped, whether or not senders are still alive;
/// sends after that fail with a disconnected error.
pub struct HeadingPump {
    sender: Sender<HeadingData>,
    /// Dropping this tells the worker to stop.
    shutdown_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl HeadingManager {
    /// Spawn a pump feeding this manager.
    pub fn spawn_pump(&self) -> Result<HeadingPump> {
        let (sender, events) = bounded::<HeadingData>(self.config().pump_queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let manager = self.clone();

        let join = thread::Builder::new()
            .name("heading-pump".to_string())
            .spawn(move || pump_loop(manager, events, shutdown_rx))?;

        Ok(HeadingPump {
            sender,
            shutdown_tx: Some(shutdown_tx),
            join: Some(join),
        })
    }
}

fn pump_loop(manager: HeadingManager, events: Receiver<HeadingData>, shutdown: Receiver<()>) {
    loop {
        select! {
            recv(events) -> msg => match msg {
                Ok(data) => {
                    manager.dispatch(data);
                }
                Err(_) => break,
            },
            recv(shutdown) -> _ => {
                // Only what was queued before the signal; live senders may keep pushing
                let pending = events.len();
                for data in events.try_iter().take(pending) {
                    manager.dispatch(data);
                }
                break;
            }
        }
    }
    debug!("heading pump exiting");
}

impl HeadingPump {
    /// A sender for provider events. Blocks when the queue is full.
    pub fn sender(&self) -> Sender<HeadingData> {
        self.sender.clone()
    }

    /// Stop the worker after it dispatches the events already queued, and
    /// wait for it to exit. Does not wait for outstanding senders.
    pub fn shutdown(mut self) {
        self.shutdown_tx.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("heading pump thread panicked");
            }
        }
    }
}

impl Drop for HeadingPump {
    fn drop(&mut self) {
        // Signal and detach; the worker finishes its current event and exits.
        self.shutdown_tx.take();
        self.join.take();
    }
}
