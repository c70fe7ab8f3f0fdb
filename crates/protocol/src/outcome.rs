//! Settled session outcomes delivered to the caller.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a settling signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalSource {
	/// Structured message posted by the hosted page.
	Message,
	/// Location observed in a popup or tab after the gateway redirected back.
	WindowLocation,
	/// Produced by the blocked-presentation fallback.
	Fallback,
}

/// Gateway-supplied data attached to a success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
	pub source: SignalSource,
	/// Opaque data as received; never interpreted beyond classification.
	pub data: Value,
	/// Redirect target carried by the signal, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub redirect_url: Option<String>,
}

impl Payload {
	pub fn new(source: SignalSource, data: Value) -> Self {
		Self {
			source,
			data,
			redirect_url: None,
		}
	}

	pub fn with_redirect(mut self, url: Option<String>) -> Self {
		self.redirect_url = url;
		self
	}
}

/// Why a session ended without success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum CancelReason {
	/// The payer used the close affordance.
	UserClosed,
	/// The caller cancelled programmatically.
	Requested,
	/// The popup or tab was closed before a result was observed.
	WindowClosed,
	/// The hosted page reported a cancellation.
	GatewayCancelled { payload: Payload },
	/// A newer `open()` pre-empted this session.
	Superseded,
	/// No terminal signal arrived within the session timeout.
	TimedOut {
		#[serde(with = "millis")]
		after: Duration,
	},
	/// The flow continues in a navigated context (step-up page or full navigation).
	HandedOff { url: String },
}

impl CancelReason {
	/// Returns the stable reason identifier.
	pub fn as_str(&self) -> &'static str {
		match self {
			CancelReason::UserClosed => "user-closed",
			CancelReason::Requested => "requested",
			CancelReason::WindowClosed => "window-closed",
			CancelReason::GatewayCancelled { .. } => "gateway-cancelled",
			CancelReason::Superseded => "superseded",
			CancelReason::TimedOut { .. } => "timed-out",
			CancelReason::HandedOff { .. } => "handed-off",
		}
	}
}

impl fmt::Display for CancelReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Terminal result of one `open()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Outcome {
	Success { payload: Payload },
	Failure { payload: Payload },
	Cancelled { reason: CancelReason },
}

impl Outcome {
	pub fn success(payload: Payload) -> Self {
		Outcome::Success { payload }
	}

	pub fn failure(payload: Payload) -> Self {
		Outcome::Failure { payload }
	}

	pub fn cancelled(reason: CancelReason) -> Self {
		Outcome::Cancelled { reason }
	}

	pub fn kind(&self) -> OutcomeKind {
		match self {
			Outcome::Success { .. } => OutcomeKind::Success,
			Outcome::Failure { .. } => OutcomeKind::Failure,
			Outcome::Cancelled {
				reason: CancelReason::TimedOut { .. },
			} => OutcomeKind::TimedOut,
			Outcome::Cancelled { .. } => OutcomeKind::Cancelled,
		}
	}

	/// Returns the cancellation reason, if this is a cancellation.
	pub fn cancel_reason(&self) -> Option<&CancelReason> {
		match self {
			Outcome::Cancelled { reason } => Some(reason),
			_ => None,
		}
	}
}

/// Outcome discriminant without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeKind {
	Success,
	Failure,
	Cancelled,
	TimedOut,
}

impl fmt::Display for OutcomeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			OutcomeKind::Success => "success",
			OutcomeKind::Failure => "failure",
			OutcomeKind::Cancelled => "cancelled",
			OutcomeKind::TimedOut => "timedOut",
		})
	}
}

mod millis {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
