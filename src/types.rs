//! Core types shared by requests and the manager.

use crate::error::{HeadingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Process-wide counter backing [`RequestId::next`].
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a request.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Allocate a fresh identifier. Never repeats within a process.
    pub fn next() -> Self {
        RequestId(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Created, not yet started.
    #[default]
    Idle,
    /// Delivering readings.
    Running,
    /// Holding filters and callbacks, delivering nothing.
    Paused,
    /// Terminal.
    Expired,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Expired)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as i64)
    }

    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis.saturating_mul(1000))
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is not in the past.
    pub fn saturating_elapsed_since(self, earlier: Timestamp) -> Duration {
        let micros = self.0.saturating_sub(earlier.0);
        if micros <= 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(micros as u64)
        }
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A single heading reading from the sensor provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    /// Degrees relative to magnetic north.
    pub magnetic_heading: f64,
    /// Degrees relative to geographic north, when the provider knows it.
    pub true_heading: Option<f64>,
    /// Maximum deviation in degrees. Negative means the reading is invalid.
    pub accuracy: f64,
    /// When the provider took the reading.
    pub timestamp: Timestamp,
}

impl Heading {
    /// Reading stamped with the current time.
    pub fn new(magnetic_heading: f64, accuracy: f64) -> Self {
        Self {
            magnetic_heading,
            true_heading: None,
            accuracy,
            timestamp: Timestamp::now(),
        }
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_true_heading(mut self, degrees: f64) -> Self {
        self.true_heading = Some(degrees);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.accuracy >= 0.0
    }
}

/// Why a request received a failure.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    /// The caller stopped the request.
    #[error("request cancelled")]
    Cancelled,
    /// Access to heading updates was denied or revoked.
    #[error("permission denied")]
    PermissionDenied,
    /// The device cannot produce heading updates.
    #[error("heading unavailable")]
    Unavailable,
    /// Opaque provider failure.
    #[error("provider error: {0}")]
    Provider(String),
}

impl ErrorReason {
    /// Terminal reasons end every request when the manager receives them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ErrorReason::PermissionDenied | ErrorReason::Unavailable)
    }
}

/// Payload delivered to callbacks: a reading or a failure.
pub type HeadingData = std::result::Result<Heading, ErrorReason>;

/// Per-request filtering policy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingFilter {
    /// Suppress readings whose accuracy is coarser than this many degrees.
    pub accuracy: Option<f64>,
    /// Minimum spacing between delivered readings.
    pub min_interval: Option<Duration>,
}

impl HeadingFilter {
    pub fn new(accuracy: Option<f64>, min_interval: Option<Duration>) -> Self {
        Self {
            accuracy,
            min_interval,
        }
    }

    /// Reject thresholds that can never be compared against a reading.
    pub fn validate(&self) -> Result<()> {
        if let Some(accuracy) = self.accuracy {
            if !accuracy.is_finite() || accuracy < 0.0 {
                return Err(HeadingError::InvalidFilter(format!(
                    "accuracy must be a non-negative number of degrees, got {accuracy}"
                )));
            }
        }
        Ok(())
    }

    /// Check the accuracy threshold only.
    pub fn accepts_accuracy(&self, heading: &Heading) -> bool {
        match self.accuracy {
            Some(threshold) => heading.is_valid() && heading.accuracy <= threshold,
            None => true,
        }
    }

    /// Check the minimum interval against the last delivered reading.
    ///
    /// A reading stamped before the last delivered one means the provider
    /// clock stepped back; it is accepted and becomes the new reference.
    pub fn accepts_interval(&self, heading: &Heading, last_delivered: Option<Timestamp>) -> bool {
        match (self.min_interval, last_delivered) {
            (Some(_), Some(last)) if heading.timestamp < last => true,
            (Some(min), Some(last)) => heading.timestamp.saturating_elapsed_since(last) >= min,
            _ => true,
        }
    }
}
