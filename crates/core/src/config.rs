//! Controller configuration loaded from camelCase JSON.
//!
//! Every field has a default so an empty object is a valid configuration.
//! Durations are expressed in milliseconds on the wire and exposed as
//! [`Duration`] through accessor methods.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use payframe_protocol::{DeviceClass, Strategy};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_GRACE_PERIOD_MS: u64 = 1000;
const DEFAULT_FRAME_LOAD_TIMEOUT_MS: u64 = 5000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_SESSION_TIMEOUT_MS: u64 = 15 * 60 * 1000;
const DEFAULT_REDIRECT_DELAY_MS: u64 = 3000;
const DEFAULT_MIN_FRAME_HEIGHT: u32 = 400;
const DEFAULT_VIEWPORT_MARGIN: u32 = 100;
const DEFAULT_POPUP_WIDTH: u32 = 600;
const DEFAULT_POPUP_HEIGHT: u32 = 700;

/// Display name for gateways whose host matches `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayLabel {
	pub pattern: String,
	pub label: String,
}

/// Substrings that classify a readable popup/tab location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationMarkers {
	pub success: Vec<String>,
	pub cancel: Vec<String>,
	pub failure: Vec<String>,
}

impl Default for LocationMarkers {
	fn default() -> Self {
		Self {
			success: vec!["success".to_string()],
			cancel: vec!["cancel".to_string()],
			failure: vec!["fail".to_string()],
		}
	}
}

/// Recognized controller options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
	/// Try the embedded frame first when the host allows it.
	pub prefer_embedded: bool,
	/// Fallback order on desktop once embedding is ruled out.
	pub desktop_fallbacks: Vec<Strategy>,
	/// Fallback order on constrained devices once embedding is ruled out.
	pub mobile_fallbacks: Vec<Strategy>,
	/// Host patterns known to refuse framing.
	pub framing_denied_hosts: Vec<String>,
	pub gateway_labels: Vec<GatewayLabel>,
	pub grace_period_ms: u64,
	pub frame_load_timeout_ms: u64,
	pub poll_interval_ms: u64,
	pub session_timeout_ms: u64,
	/// Countdown before a full navigation; rounded down to whole seconds.
	pub redirect_delay_ms: u64,
	pub min_frame_height: u32,
	/// Upper bound for desktop frame height; viewport height minus
	/// `viewport_margin` when unset.
	pub max_frame_height: Option<u32>,
	pub viewport_margin: u32,
	/// Overrides the device class reported by the host.
	pub device_class: Option<DeviceClass>,
	pub force_top_level_redirect: bool,
	pub navigate_on_cancel: bool,
	pub allow_close: bool,
	pub auto_resize: bool,
	pub popup_width: u32,
	pub popup_height: u32,
	/// Sandbox tokens applied to the embedded frame.
	pub sandbox: Vec<String>,
	/// Extra query parameters appended to the framed URL.
	pub embedded_query: BTreeMap<String, String>,
	pub location_markers: LocationMarkers,
	/// Mirror controller logs to the host console (web binding only).
	pub debug: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			prefer_embedded: true,
			desktop_fallbacks: vec![Strategy::Popup, Strategy::NewTab, Strategy::FullNavigation],
			mobile_fallbacks: vec![Strategy::FullNavigation],
			framing_denied_hosts: Vec::new(),
			gateway_labels: Vec::new(),
			grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
			frame_load_timeout_ms: DEFAULT_FRAME_LOAD_TIMEOUT_MS,
			poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
			session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
			redirect_delay_ms: DEFAULT_REDIRECT_DELAY_MS,
			min_frame_height: DEFAULT_MIN_FRAME_HEIGHT,
			max_frame_height: None,
			viewport_margin: DEFAULT_VIEWPORT_MARGIN,
			device_class: None,
			force_top_level_redirect: true,
			navigate_on_cancel: false,
			allow_close: true,
			auto_resize: true,
			popup_width: DEFAULT_POPUP_WIDTH,
			popup_height: DEFAULT_POPUP_HEIGHT,
			sandbox: vec!["allow-scripts".to_string(), "allow-forms".to_string()],
			embedded_query: BTreeMap::new(),
			location_markers: LocationMarkers::default(),
			debug: false,
		}
	}
}

impl Config {
	/// Parses and validates a JSON configuration document.
	pub fn from_json(json: &str) -> Result<Self> {
		let config: Config = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a JSON configuration file.
	pub fn from_file(path: &Path) -> Result<Self> {
		let json = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_json(&json)
	}

	/// Checks cross-field constraints serde cannot express.
	pub fn validate(&self) -> Result<()> {
		if self.poll_interval_ms == 0 {
			return Err(Error::Config("pollIntervalMs must be greater than zero".to_string()));
		}
		if self.session_timeout_ms == 0 {
			return Err(Error::Config("sessionTimeoutMs must be greater than zero".to_string()));
		}
		if let Some(max) = self.max_frame_height {
			if max < self.min_frame_height {
				return Err(Error::Config(format!(
					"maxFrameHeight ({max}) is below minFrameHeight ({})",
					self.min_frame_height
				)));
			}
		}
		for (name, order) in [("desktopFallbacks", &self.desktop_fallbacks), ("mobileFallbacks", &self.mobile_fallbacks)] {
			if order.contains(&Strategy::Embedded) {
				return Err(Error::Config(format!("{name} cannot contain the embedded strategy")));
			}
		}
		if let Some(token) = self.sandbox.iter().find(|token| !token.starts_with("allow-")) {
			return Err(Error::Config(format!("unknown sandbox token '{token}'")));
		}
		Ok(())
	}

	pub fn grace_period(&self) -> Duration {
		Duration::from_millis(self.grace_period_ms)
	}

	pub fn frame_load_timeout(&self) -> Duration {
		Duration::from_millis(self.frame_load_timeout_ms)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn session_timeout(&self) -> Duration {
		Duration::from_millis(self.session_timeout_ms)
	}

	/// Whole seconds shown by the full-navigation countdown.
	pub fn countdown_seconds(&self) -> u32 {
		u32::try_from(self.redirect_delay_ms / 1000).unwrap_or(u32::MAX)
	}

	/// Returns the fallback order for a device class.
	pub fn fallbacks(&self, device: DeviceClass) -> &[Strategy] {
		match device {
			DeviceClass::Desktop => &self.desktop_fallbacks,
			DeviceClass::Mobile => &self.mobile_fallbacks,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_object_yields_defaults() {
		let config = Config::from_json("{}").unwrap();
		assert_eq!(config, Config::default());
		assert_eq!(config.poll_interval(), Duration::from_millis(500));
		assert_eq!(config.session_timeout(), Duration::from_secs(900));
		assert_eq!(config.countdown_seconds(), 3);
		assert!(config.force_top_level_redirect);
		assert!(!config.navigate_on_cancel);
	}

	#[test]
	fn default_sandbox_has_no_top_navigation() {
		let config = Config::default();
		assert_eq!(config.sandbox, vec!["allow-scripts", "allow-forms"]);
		assert!(!config.sandbox.iter().any(|token| token.contains("top-navigation")));
	}

	#[test]
	fn parses_camel_case_fields() {
		let config = Config::from_json(
			r#"{
				"framingDeniedHosts": ["bkash.com", "*.nagad.com.bd"],
				"mobileFallbacks": ["popup", "fullNavigation"],
				"maxFrameHeight": 720,
				"embeddedQuery": {"full": "1"},
				"deviceClass": "mobile"
			}"#,
		)
		.unwrap();
		assert_eq!(config.framing_denied_hosts.len(), 2);
		assert_eq!(config.fallbacks(DeviceClass::Mobile), &[Strategy::Popup, Strategy::FullNavigation]);
		assert_eq!(config.max_frame_height, Some(720));
		assert_eq!(config.embedded_query.get("full").map(String::as_str), Some("1"));
		assert_eq!(config.device_class, Some(DeviceClass::Mobile));
	}

	#[test]
	fn rejects_inverted_height_bounds() {
		let err = Config::from_json(r#"{"minFrameHeight": 500, "maxFrameHeight": 300}"#).unwrap_err();
		assert!(err.to_string().contains("maxFrameHeight"));
	}

	#[test]
	fn rejects_embedded_in_fallback_order() {
		let err = Config::from_json(r#"{"desktopFallbacks": ["embedded"]}"#).unwrap_err();
		assert!(err.to_string().contains("desktopFallbacks"));
	}

	#[test]
	fn rejects_zero_poll_interval() {
		assert!(Config::from_json(r#"{"pollIntervalMs": 0}"#).is_err());
	}

	#[test]
	fn from_file_reports_missing_path() {
		let err = Config::from_file(Path::new("/nonexistent/payframe.json")).unwrap_err();
		assert!(matches!(err, Error::ConfigRead { .. }));
	}
}
