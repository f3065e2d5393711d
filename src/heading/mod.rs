//! Heading subscriptions and the manager that feeds them.
//!
//! A [`HeadingManager`] tracks every live [`HeadingRequest`] and pushes each
//! provider event to all of them. Each request decides on its own whether to
//! forward the event:
//! - Only `Running` requests deliver
//! - Readings are filtered by accuracy threshold and minimum interval
//! - Failures are forwarded unfiltered
//!
//! `stop()` delivers a final `Cancelled` failure and drops the request from
//! its manager.
//!
//! # Example
//!
//! ```ignore
//! let manager = HeadingManager::new(ManagerConfig::default());
//!
//! let request = manager.create_heading_request(Some(5.0), None)?;
//! request.register_callback(|data| match data {
//!     Ok(heading) => println!("heading: {}", heading.magnetic_heading),
//!     Err(reason) => println!("ended: {reason}"),
//! });
//! request.start();
//!
//! // Provider side
//! let pump = manager.spawn_pump()?;
//! pump.sender().send(Ok(Heading::new(92.5, 3.0)))?;
//! ```

mod manager;
mod observers;
mod provider;
mod pump;
mod request;

pub use manager::{HeadingManager, ManagerConfig};
pub use observers::{Callback, HeadingStream};
pub use provider::HeadingProvider;
pub use pump::HeadingPump;
pub use request::HeadingRequest;
