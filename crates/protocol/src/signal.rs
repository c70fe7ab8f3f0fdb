//! Inputs delivered to the completion channel.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a single asynchronous input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
	Success,
	Failure,
	Cancelled,
	Resize,
	OtpRedirect,
	OtpInline,
	TimedOut,
	Unrecognized,
}

impl SignalKind {
	pub fn as_str(self) -> &'static str {
		match self {
			SignalKind::Success => "success",
			SignalKind::Failure => "failure",
			SignalKind::Cancelled => "cancelled",
			SignalKind::Resize => "resize",
			SignalKind::OtpRedirect => "otp-redirect",
			SignalKind::OtpInline => "otp-inline",
			SignalKind::TimedOut => "timed-out",
			SignalKind::Unrecognized => "unrecognized",
		}
	}

	/// Returns `true` when a signal of this kind settles its session.
	pub fn is_terminal(self) -> bool {
		matches!(
			self,
			SignalKind::Success | SignalKind::Failure | SignalKind::Cancelled | SignalKind::TimedOut | SignalKind::OtpRedirect
		)
	}
}

impl fmt::Display for SignalKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Cross-context message payload as received from the message source.
///
/// Sources may deliver either a structured object or a string that still has
/// to be parsed; both shapes are accepted and never trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawMessage {
	Text(String),
	Structured(Value),
}

impl From<Value> for RawMessage {
	fn from(value: Value) -> Self {
		match value {
			Value::String(text) => RawMessage::Text(text),
			other => RawMessage::Structured(other),
		}
	}
}

impl From<&str> for RawMessage {
	fn from(text: &str) -> Self {
		RawMessage::Text(text.to_string())
	}
}

/// What the host could observe about an embedded frame after its load event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameContent {
	/// Same-origin document with visible children or text.
	NonEmpty,
	/// Same-origin document with nothing rendered; possible framing denial.
	Empty,
	/// Cross-origin document that cannot be inspected.
	Opaque,
}

/// Result of probing a secondary window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowProbe {
	/// The window handle reports it has been closed.
	#[serde(default)]
	pub closed: bool,
	/// Location, readable only once the window is back on a same-origin page.
	#[serde(default)]
	pub location: Option<String>,
}

impl WindowProbe {
	pub fn open() -> Self {
		Self::default()
	}

	pub fn closed() -> Self {
		Self {
			closed: true,
			location: None,
		}
	}

	pub fn at(location: impl Into<String>) -> Self {
		Self {
			closed: false,
			location: Some(location.into()),
		}
	}
}
