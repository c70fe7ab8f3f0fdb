//! Native event loop for the payframe controller.
//!
//! [`Driver`] owns a [`payframe::Controller`] and serializes every input
//! (caller commands, host surface events and timer expiries) through tokio
//! channels, so the controller only ever sees one event at a time. Timers are
//! tokio sleeps that report back through the same loop.
//!
//! # Example
//!
//! ```ignore
//! let (driver, handle) = Driver::new(Config::default(), surfaces)?;
//! let client = async move {
//!     let lease = handle.open("https://pay.example/s/abc").await?;
//!     handle.frame_loaded(lease.ticket, FrameContent::Opaque)?;
//!     lease.outcome().await
//! };
//! let (_surfaces, outcome) = tokio::join!(driver.run(), client);
//! ```

mod driver;
mod error;
mod host;
mod timers;

pub use driver::{Driver, DriverHandle, HostEvent, SessionLease};
pub use error::{Result, RuntimeError};
pub use host::RuntimeHost;
pub use timers::TokioTimers;
