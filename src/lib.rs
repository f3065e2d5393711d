//! # Heading Feed
//!
//! In-process subscriptions to a stream of compass heading updates.
//!
//! ## Core Concepts
//!
//! - **Requests**: One consumer's subscription, with its own filters,
//!   lifecycle and ordered callbacks
//! - **Manager**: Owns the active requests and fans provider events out to them
//! - **Provider**: The platform heading source, started and stopped on demand
//! - **Pump**: A delivery thread that serialises provider events into the manager
//!
//! ## Example
//!
//! ```ignore
//! use heading_feed::{Heading, HeadingManager, ManagerConfig};
//! use std::time::Duration;
//!
//! let manager = HeadingManager::new(ManagerConfig::default());
//! let request = manager.create_heading_request(Some(5.0), Some(Duration::from_secs(1)))?;
//! let stream = request.default_stream();
//! request.start();
//!
//! manager.dispatch(Ok(Heading::new(271.0, 2.0)));
//! let event = stream.recv()?;
//!
//! request.stop();
//! ```

pub mod error;
pub mod heading;
pub mod types;

// Re-exports
pub use error::{HeadingError, Result};
pub use heading::{
    Callback, HeadingManager, HeadingProvider, HeadingPump, HeadingRequest, HeadingStream,
    ManagerConfig,
};
pub use types::*;
