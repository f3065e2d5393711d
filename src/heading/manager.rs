//! Manager owning the active heading requests.

use crate::error::{HeadingError, Result};
use crate::types::{ErrorReason, HeadingData, HeadingFilter, RequestId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::HeadingProvider;
use super::request::HeadingRequest;

/// Default capacity for request streams.
const DEFAULT_STREAM_CAPACITY: usize = 64;

/// Default capacity of the pump queue.
const DEFAULT_PUMP_QUEUE_CAPACITY: usize = 256;

/// Manager configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Filter used by `create_default_heading_request`.
    pub default_filter: HeadingFilter,

    /// Buffer size for `HeadingRequest::default_stream`.
    /// Default: 64
    pub stream_capacity: usize,

    /// Max queued provider events in a pump before senders block.
    /// Default: 256
    pub pump_queue_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_filter: HeadingFilter::default(),
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            pump_queue_capacity: DEFAULT_PUMP_QUEUE_CAPACITY,
        }
    }
}

impl ManagerConfig {
    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ManagerConfig = serde_json::from_str(json)?;
        config.default_filter.validate()?;
        Ok(config)
    }
}

/// State shared between the manager handle and its requests.
pub(crate) struct ManagerShared {
    config: ManagerConfig,
    /// Active requests by ID.
    requests: RwLock<HashMap<RequestId, Arc<HeadingRequest>>>,
    provider: Option<Arc<dyn HeadingProvider>>,
    /// Whether the provider was last told to start.
    provider_active: Mutex<bool>,
}

impl ManagerShared {
    /// Drop a request from the active set. Idempotent.
    pub(crate) fn remove(&self, id: RequestId) -> bool {
        let removed = self.requests.write().remove(&id).is_some();
        if removed {
            debug!(request = %id, "heading request removed");
            self.sync_provider();
        }
        removed
    }

    /// Start or stop the provider to match whether any request is tracked.
    fn sync_provider(&self) {
        let Some(provider) = &self.provider else {
            return;
        };

        let mut active = self.provider_active.lock();
        let wanted = !self.requests.read().is_empty();
        if wanted == *active {
            return;
        }

        if wanted {
            debug!("starting heading updates");
            provider.start_updates();
        } else {
            debug!("stopping heading updates");
            provider.stop_updates();
        }
        *active = wanted;
    }
}

/// Owns the active request set and fans provider events out to it.
///
/// Cloning yields another handle to the same manager.
#[derive(Clone)]
pub struct HeadingManager {
    shared: Arc<ManagerShared>,
}

impl HeadingManager {
    /// Create a manager with no provider attached.
    pub fn new(config: ManagerConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a manager that drives `provider` on and off with demand.
    pub fn with_provider(config: ManagerConfig, provider: Arc<dyn HeadingProvider>) -> Self {
        Self::build(config, Some(provider))
    }

    fn build(config: ManagerConfig, provider: Option<Arc<dyn HeadingProvider>>) -> Self {
        Self {
            shared: Arc::new(ManagerShared {
                config,
                requests: RwLock::new(HashMap::new()),
                provider,
                provider_active: Mutex::new(false),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    // --- Requests ---

    /// Create and track a new request in the `Idle` state.
    pub fn create_heading_request(
        &self,
        accuracy: Option<f64>,
        min_interval: Option<Duration>,
    ) -> Result<Arc<HeadingRequest>> {
        self.create_with_filter(HeadingFilter::new(accuracy, min_interval))
    }

    /// Create a request using the configured default filter.
    pub fn create_default_heading_request(&self) -> Result<Arc<HeadingRequest>> {
        self.create_with_filter(self.shared.config.default_filter.clone())
    }

    fn create_with_filter(&self, filter: HeadingFilter) -> Result<Arc<HeadingRequest>> {
        filter.validate()?;

        let request = Arc::new(HeadingRequest::new(
            filter,
            Arc::downgrade(&self.shared),
            self.shared.config.stream_capacity,
        ));

        self.shared
            .requests
            .write()
            .insert(request.id(), Arc::clone(&request));
        debug!(request = %request.id(), filter = ?request.filter(), "heading request created");

        self.shared.sync_provider();
        Ok(request)
    }

    /// Stop tracking `request` without notifying it. Returns false if it
    /// was not tracked.
    pub fn remove_request(&self, request: &HeadingRequest) -> bool {
        self.shared.remove(request.id())
    }

    pub fn get(&self, id: RequestId) -> Option<Arc<HeadingRequest>> {
        self.shared.requests.read().get(&id).cloned()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.shared.requests.read().contains_key(&id)
    }

    pub fn request_count(&self) -> usize {
        self.shared.requests.read().len()
    }

    pub fn request_ids(&self) -> Vec<RequestId> {
        self.shared.requests.read().keys().copied().collect()
    }

    /// Cancel a tracked request by ID.
    pub fn stop_request(&self, id: RequestId) -> Result<()> {
        let request = self.get(id).ok_or(HeadingError::RequestNotFound(id))?;
        request.stop();
        Ok(())
    }

    /// Cancel every tracked request.
    pub fn stop_all(&self) {
        for request in self.snapshot() {
            request.stop();
        }
    }

    // --- Dispatch ---

    /// Feed one provider event to every tracked request.
    ///
    /// A terminal failure (see [`ErrorReason::is_terminal`]) expires and
    /// removes every request instead. Returns the number of requests that
    /// forwarded the event to their callbacks.
    pub fn dispatch(&self, data: HeadingData) -> usize {
        let requests = self.snapshot();

        match &data {
            Err(reason) if reason.is_terminal() => {
                warn!(%reason, requests = requests.len(), "terminal provider error, expiring requests");
                for request in &requests {
                    request.stop_with_reason(reason.clone());
                }
                requests.len()
            }
            _ => requests
                .iter()
                .filter(|request| request.dispatch(&data))
                .count(),
        }
    }

    /// Deliver a provider failure. Shorthand for `dispatch(Err(reason))`.
    pub fn dispatch_error(&self, reason: ErrorReason) -> usize {
        self.dispatch(Err(reason))
    }

    /// Current requests, cloned so no lock is held while they run callbacks.
    fn snapshot(&self) -> Vec<Arc<HeadingRequest>> {
        self.shared.requests.read().values().cloned().collect()
    }
}

impl Default for HeadingManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}
