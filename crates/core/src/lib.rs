//! payframe: presents gateway-hosted payment pages in an embedded frame,
//! a popup, a new tab or a full navigation, and settles every attempt into
//! exactly one outcome.
//!
//! The crate is host-agnostic. [`Controller`] owns the session state machine
//! and talks to the page through the [`host::Surfaces`] and
//! [`host::Scheduler`] traits; `payframe-web` implements them against the
//! DOM and `payframe-runtime` drives them from a tokio event loop.

pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod host;
pub mod policy;
pub mod session;

pub use config::{Config, GatewayLabel, LocationMarkers};
pub use controller::{Callbacks, Controller};
pub use error::{Error, Result};
pub use gateway::GatewaySessionApi;
pub use payframe_protocol::{
	CancelReason, DeviceClass, FrameContent, Outcome, OutcomeKind, Payload, RawMessage, SignalKind, SignalSource, Strategy, WindowProbe,
};
pub use policy::PresentationPolicy;
pub use session::{SessionState, Ticket};
