use payframe::channel::{self, Signal};
use payframe::host::{Dimensions, FrameHeight};
use payframe::{Config, DeviceClass, RawMessage, SignalKind};
use serde_json::{Value, json};

use crate::output::ClassifyData;

/// Classifies a message payload. Input that is not JSON is passed on as a
/// raw string, the way an untrusted sender might post it.
pub fn message(payload: &str, device: DeviceClass, viewport_height: u32, config: &Config) -> ClassifyData {
	let raw = serde_json::from_str::<Value>(payload)
		.map(RawMessage::from)
		.unwrap_or_else(|_| RawMessage::Text(payload.to_string()));
	let signal = channel::classify_message(&raw);
	let kind = signal.kind();

	let mut data = ClassifyData {
		input: "message",
		kind: kind.as_str().to_string(),
		terminal: kind.is_terminal(),
		url: None,
		data: None,
		height: None,
		html_length: None,
		reason: None,
	};
	match signal {
		Signal::OtpRedirect { url } => data.url = Some(url),
		Signal::Redirect { url, data: body } => {
			data.url = Some(url);
			data.data = Some(body);
		}
		Signal::Resize { height } => {
			let viewport = Dimensions {
				width: 0,
				height: viewport_height,
			};
			let device = config.device_class.unwrap_or(device);
			data.height = Some(match channel::frame_height(height, device, config, viewport) {
				FrameHeight::Exact(px) => json!({"requested": height, "exact": px}),
				FrameHeight::AtLeast(px) => json!({"requested": height, "atLeast": px}),
			});
		}
		Signal::OtpInline { html } => data.html_length = Some(html.len()),
		Signal::Success { data: body, url } | Signal::Failure { data: body, url } | Signal::Cancelled { data: body, url } => {
			data.url = url;
			data.data = Some(body);
		}
		Signal::Unrecognized { reason } => data.reason = Some(reason),
	}
	data
}

/// Classifies a popup/tab location against the configured markers.
pub fn location(location: &str, config: &Config) -> ClassifyData {
	let kind = channel::classify_location(location, &config.location_markers);
	ClassifyData {
		input: "location",
		kind: kind.map_or("pending", SignalKind::as_str).to_string(),
		terminal: kind.is_some(),
		url: Some(location.to_string()),
		data: None,
		height: None,
		html_length: None,
		reason: None,
	}
}
