//! Completion channel: turns untrusted asynchronous inputs into [`Signal`]s.
//!
//! Message payloads come from pages we do not control, so every field is
//! looked up defensively and anything that does not fit a known shape
//! becomes [`Signal::Unrecognized`] instead of an error.

use payframe_protocol::{DeviceClass, RawMessage, SignalKind};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::config::{Config, LocationMarkers};
use crate::host::{Dimensions, FrameHeight};

/// Fields that may carry a redirect target, in lookup order.
pub const URL_FIELDS: [&str; 8] = [
	"url",
	"redirectUrl",
	"redirect_url",
	"gateway_url",
	"gatewayUrl",
	"GatewayPageURL",
	"otp_url",
	"otpUrl",
];

/// Classified message.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
	/// Step-up page that must replace the top-level context.
	OtpRedirect { url: String },
	/// Generic redirect; settles as success and navigates.
	Redirect { url: String, data: Value },
	Resize { height: u32 },
	/// Inline passcode form to render in place of the frame.
	OtpInline { html: String },
	Success { data: Value, url: Option<String> },
	Failure { data: Value, url: Option<String> },
	Cancelled { data: Value, url: Option<String> },
	Unrecognized { reason: &'static str },
}

impl Signal {
	pub fn kind(&self) -> SignalKind {
		match self {
			Signal::OtpRedirect { .. } => SignalKind::OtpRedirect,
			Signal::Redirect { .. } | Signal::Success { .. } => SignalKind::Success,
			Signal::Resize { .. } => SignalKind::Resize,
			Signal::OtpInline { .. } => SignalKind::OtpInline,
			Signal::Failure { .. } => SignalKind::Failure,
			Signal::Cancelled { .. } => SignalKind::Cancelled,
			Signal::Unrecognized { .. } => SignalKind::Unrecognized,
		}
	}
}

/// Classifies a cross-context message by the first matching rule.
pub fn classify_message(raw: &RawMessage) -> Signal {
	let value = match raw {
		RawMessage::Structured(value) => value.clone(),
		RawMessage::Text(text) => match serde_json::from_str::<Value>(text) {
			Ok(value) => value,
			Err(err) => {
				debug!(target = "payframe.channel", error = %err, "message is not JSON");
				return Signal::Unrecognized { reason: "unparseable" };
			}
		},
	};
	let Value::Object(fields) = value else {
		return Signal::Unrecognized { reason: "not an object" };
	};

	let kind = str_field(&fields, "type");
	let event = str_field(&fields, "event");
	let status = str_field(&fields, "status").map(str::to_ascii_lowercase);
	let url = redirect_url(&fields);

	if kind == Some("otp_redirect") || event == Some("otp_required") {
		if let Some(url) = url.clone() {
			return Signal::OtpRedirect { url };
		}
	}

	let redirect_type = matches!(kind, Some("redirect" | "gw_redirect"));
	if redirect_type || has_redirect_flag(&fields) {
		if let Some(url) = url {
			return Signal::Redirect {
				url,
				data: Value::Object(fields),
			};
		}
		// A bare flag may ride along on a status message.
		if redirect_type {
			return Signal::Unrecognized {
				reason: "redirect without URL",
			};
		}
	}

	if kind == Some("resize") {
		if let Some(height) = fields.get("height").and_then(height_value) {
			return Signal::Resize { height };
		}
	}

	if kind == Some("otp") {
		if let Some(html) = str_field(&fields, "data") {
			return Signal::OtpInline { html: html.to_string() };
		}
	}

	let status = status.as_deref();
	if status == Some("success") || event == Some("payment_success") {
		return Signal::Success {
			data: Value::Object(fields),
			url,
		};
	}
	if matches!(status, Some("error" | "failed" | "failure")) || event == Some("payment_failed") {
		return Signal::Failure {
			data: Value::Object(fields),
			url,
		};
	}
	if matches!(status, Some("cancel" | "cancelled" | "canceled")) || event == Some("payment_cancelled") {
		return Signal::Cancelled {
			data: Value::Object(fields),
			url,
		};
	}

	if let Some(url) = url {
		return Signal::Redirect {
			url,
			data: Value::Object(fields),
		};
	}

	Signal::Unrecognized { reason: "no known marker" }
}

/// Classifies a readable popup/tab location by configured substrings.
///
/// Success markers are checked first so `payment-success` never reads as a
/// failure; cancellation is checked before failure.
pub fn classify_location(location: &str, markers: &LocationMarkers) -> Option<SignalKind> {
	if location.is_empty() || location.starts_with("about:") {
		return None;
	}
	let location = location.to_ascii_lowercase();
	let hit = |list: &[String]| list.iter().any(|marker| !marker.is_empty() && location.contains(&marker.to_ascii_lowercase()));

	if hit(&markers.success) {
		Some(SignalKind::Success)
	} else if hit(&markers.cancel) {
		Some(SignalKind::Cancelled)
	} else if hit(&markers.failure) {
		Some(SignalKind::Failure)
	} else {
		None
	}
}

/// Computes the frame height for a resize request.
///
/// Desktop clamps to `[min, max]`; constrained devices only enforce the
/// minimum and let content grow.
pub fn frame_height(requested: u32, device: DeviceClass, config: &Config, viewport: Dimensions) -> FrameHeight {
	let min = config.min_frame_height;
	match device {
		DeviceClass::Mobile => FrameHeight::AtLeast(requested.max(min)),
		DeviceClass::Desktop => {
			let max = config
				.max_frame_height
				.unwrap_or_else(|| viewport.height.saturating_sub(config.viewport_margin))
				.max(min);
			FrameHeight::Exact(requested.clamp(min, max))
		}
	}
}

/// Returns `true` for absolute `http`/`https` URLs.
pub fn is_url_shaped(candidate: &str) -> bool {
	Url::parse(candidate.trim()).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

fn str_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
	fields.get(key).and_then(Value::as_str)
}

fn redirect_url(fields: &Map<String, Value>) -> Option<String> {
	URL_FIELDS
		.iter()
		.filter_map(|key| str_field(fields, key))
		.find(|candidate| is_url_shaped(candidate))
		.map(|url| url.trim().to_string())
}

fn has_redirect_flag(fields: &Map<String, Value>) -> bool {
	match fields.get("redirect") {
		Some(Value::Bool(flag)) => *flag,
		Some(Value::Number(n)) => n.as_u64() == Some(1),
		Some(Value::String(s)) => matches!(s.as_str(), "1" | "true"),
		_ => false,
	}
}

fn height_value(value: &Value) -> Option<u32> {
	let height = match value {
		Value::Number(n) => n.as_f64()?,
		Value::String(s) => s.trim().trim_end_matches("px").parse::<f64>().ok()?,
		_ => return None,
	};
	if !height.is_finite() || height <= 0.0 {
		return None;
	}
	Some(height.round().min(f64::from(u32::MAX)) as u32)
}
