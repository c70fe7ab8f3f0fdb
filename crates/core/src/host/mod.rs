//! Host abstraction: the page-side operations the controller relies on.
//!
//! The controller never touches a DOM or a clock directly. It asks a
//! [`Surfaces`] implementation to mount frames, open windows and navigate,
//! and a [`Scheduler`] to deliver [`TimerId`]s back after a delay. Host
//! implementations must not call back into the controller from inside these
//! methods; every reaction arrives later as a separate event.

use std::fmt;
use std::time::Duration;

use payframe_protocol::{DeviceClass, Strategy, WindowProbe};
use thiserror::Error;

pub mod fake;

/// Opaque reference to a frame or window owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "surface#{}", self.0)
	}
}

/// Viewport or screen dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
	pub width: u32,
	pub height: u32,
}

/// Facts about the host page sampled at `open()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
	pub device_class: DeviceClass,
	pub viewport: Dimensions,
	pub screen: Dimensions,
}

impl Default for Environment {
	fn default() -> Self {
		Self {
			device_class: DeviceClass::Desktop,
			viewport: Dimensions { width: 1280, height: 800 },
			screen: Dimensions { width: 1920, height: 1080 },
		}
	}
}

/// Request to mount the embedded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpec {
	pub url: String,
	/// Space-separated sandbox tokens.
	pub sandbox: String,
	/// Permissions policy for the frame (`allow` attribute).
	pub allow: &'static str,
	/// Freeze body scrolling while the overlay is shown.
	pub lock_scroll: ScrollLock,
}

/// How the host suspends page scrolling while a surface is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollLock {
	/// `overflow: hidden` on the body.
	Overflow,
	/// Also pin the body in place; needed on touch devices.
	Pinned,
}

impl ScrollLock {
	pub fn for_device(device: DeviceClass) -> Self {
		match device {
			DeviceClass::Desktop => ScrollLock::Overflow,
			DeviceClass::Mobile => ScrollLock::Pinned,
		}
	}
}

/// Request to open a secondary browsing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
	pub url: String,
	/// Window target name (`_blank` for a plain tab).
	pub target: &'static str,
	pub features: Option<WindowFeatures>,
}

/// Geometry and chrome flags for a popup window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFeatures {
	pub width: u32,
	pub height: u32,
	pub left: u32,
	pub top: u32,
	/// Hide toolbars and allow resizing/scrolling.
	pub minimal_chrome: bool,
}

impl WindowFeatures {
	/// Popup geometry: full screen on constrained devices, centred otherwise.
	pub fn popup(device: DeviceClass, screen: Dimensions, width: u32, height: u32) -> Self {
		match device {
			DeviceClass::Mobile => Self {
				width: screen.width,
				height: screen.height,
				left: 0,
				top: 0,
				minimal_chrome: false,
			},
			DeviceClass::Desktop => Self {
				width,
				height,
				left: screen.width.saturating_sub(width) / 2,
				top: screen.height.saturating_sub(height) / 2,
				minimal_chrome: true,
			},
		}
	}

	/// Renders the `window.open` feature string.
	pub fn to_feature_string(&self) -> String {
		let mut features = format!("width={},height={},left={},top={}", self.width, self.height, self.left, self.top);
		if self.minimal_chrome {
			features.push_str(",toolbar=no,location=no,status=no,menubar=no,scrollbars=yes,resizable=yes");
		}
		features
	}
}

/// Frame height adjustment produced by a resize signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeight {
	/// Fixed height (desktop).
	Exact(u32),
	/// Minimum height, content may grow beyond it (constrained devices).
	AtLeast(u32),
}

/// Informational content shown in place of (or around) a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
	/// Loader shown while the embedded frame loads.
	Loading,
	/// Payment continues in a popup or tab.
	Waiting { gateway: String, strategy: Strategy },
	/// Full navigation countdown; `seconds` is the remaining time.
	Countdown { gateway: String, seconds: u32, url: String },
}

impl fmt::Display for Notice {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Notice::Loading => f.write_str("Loading secure payment page..."),
			Notice::Waiting { gateway, strategy } => {
				let place = if *strategy == Strategy::NewTab { "new tab" } else { "popup window" };
				write!(f, "Complete your payment with {gateway} in the {place}.")
			}
			Notice::Countdown { gateway, seconds, .. } => {
				write!(f, "Redirecting to {gateway} in {seconds}s...")
			}
		}
	}
}

/// Which browsing context a navigation request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationTarget {
	/// The top-level context, escaping any frame nesting of the host page.
	Top,
	/// The context the controller runs in.
	Current,
}

/// Host refused to mount a surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("surface rejected: {0}")]
pub struct HostError(pub String);

/// Presentation operations performed by the host page.
pub trait Surfaces {
	/// Samples device class and dimensions.
	fn environment(&self) -> Environment;

	/// Mounts a sandboxed frame and starts loading it. Load and error events
	/// are reported back through the controller.
	fn mount_frame(&mut self, spec: &FrameSpec) -> Result<SurfaceId, HostError>;

	/// Hides the loader and shows a frame that delivered content.
	fn reveal(&mut self, surface: SurfaceId);

	/// Opens a secondary window; `None` when the browser refused.
	fn open_window(&mut self, spec: &WindowSpec) -> Option<SurfaceId>;

	/// Checks whether a window is closed and, if readable, where it is.
	fn probe_window(&mut self, surface: SurfaceId) -> WindowProbe;

	fn resize_frame(&mut self, surface: SurfaceId, height: FrameHeight);

	/// Replaces the visible frame with inline markup.
	fn show_inline(&mut self, surface: SurfaceId, html: &str);

	fn show_notice(&mut self, notice: &Notice);

	fn navigate(&mut self, target: NavigationTarget, url: &str);

	/// Removes a frame or closes a window. Must tolerate repeated calls.
	fn release(&mut self, surface: SurfaceId);

	/// Hides the overlay and restores scroll/viewport state. Must tolerate
	/// repeated calls.
	fn dismiss(&mut self);
}

/// Why a timer was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
	/// No load event arrived for the embedded frame.
	FrameLoad,
	/// Empty frame content did not recover.
	Grace,
	/// Next popup/tab probe.
	Poll,
	/// Absolute session deadline.
	SessionTimeout,
	/// One-second full-navigation countdown step.
	Countdown,
}

/// Identifies one armed timer of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
	pub generation: u64,
	pub kind: TimerKind,
	pub seq: u32,
}

impl fmt::Display for TimerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:?}@{}.{}", self.kind, self.generation, self.seq)
	}
}

/// Delayed callback facility of the host event loop.
pub trait Scheduler {
	/// Delivers `timer` back to the controller after `after`.
	fn schedule(&mut self, timer: TimerId, after: Duration);

	/// Best-effort cancellation; a timer that already fired is ignored by the
	/// controller anyway.
	fn cancel(&mut self, timer: TimerId);
}

/// Everything the controller needs from its environment.
pub trait Host: Surfaces + Scheduler {}

impl<T: Surfaces + Scheduler> Host for T {}
