//! Blocked-presentation detection.

use std::fmt;

use payframe_protocol::{FrameContent, Payload, SignalSource, Strategy};
use serde_json::json;

/// Why a presentation attempt was declared blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
	/// The browser returned no handle for a popup or tab.
	WindowRefused,
	/// The host could not mount the frame at all.
	MountRejected(String),
	/// The frame reported an explicit error event.
	FrameError,
	/// The frame loaded without content and the grace period elapsed.
	EmptyFrame,
	/// No load event arrived before the frame load timeout.
	LoadTimeout,
}

impl BlockReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			BlockReason::WindowRefused => "window-refused",
			BlockReason::MountRejected(_) => "mount-rejected",
			BlockReason::FrameError => "frame-error",
			BlockReason::EmptyFrame => "empty-frame",
			BlockReason::LoadTimeout => "load-timeout",
		}
	}
}

impl fmt::Display for BlockReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BlockReason::MountRejected(detail) => write!(f, "{}: {detail}", self.as_str()),
			other => f.write_str(other.as_str()),
		}
	}
}

/// What a frame load event means for the presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadVerdict {
	/// Content arrived (or cannot be inspected); reveal the frame.
	Ready,
	/// Nothing rendered; wait out the grace period before declaring blocked.
	Suspect,
}

impl LoadVerdict {
	/// Cross-origin documents cannot be inspected and count as ready.
	pub fn from_content(content: FrameContent) -> Self {
		match content {
			FrameContent::NonEmpty | FrameContent::Opaque => LoadVerdict::Ready,
			FrameContent::Empty => LoadVerdict::Suspect,
		}
	}
}

/// Failure payload once every strategy has been blocked.
pub fn exhausted_payload(attempted: &[Strategy], last: Option<&BlockReason>) -> Payload {
	let attempted: Vec<&str> = attempted.iter().map(|strategy| strategy.as_str()).collect();
	Payload::new(
		SignalSource::Fallback,
		json!({
			"reason": "blocked",
			"attempted": attempted,
			"lastBlock": last.map(BlockReason::as_str),
		}),
	)
}
