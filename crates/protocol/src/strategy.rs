//! Presentation strategies and device classes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a hosted payment page is presented to the payer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
	/// Sandboxed inline frame inside an overlay on the current page.
	Embedded,
	/// Sized secondary window opened with window features.
	Popup,
	/// Plain new browsing context (tab) without features.
	NewTab,
	/// Replace the current context's location with the target.
	FullNavigation,
}

impl Strategy {
	/// All strategies in canonical order.
	pub const ALL: [Strategy; 4] = [Strategy::Embedded, Strategy::Popup, Strategy::NewTab, Strategy::FullNavigation];

	/// Returns the stable identifier used in config files and logs.
	pub fn as_str(self) -> &'static str {
		match self {
			Strategy::Embedded => "embedded",
			Strategy::Popup => "popup",
			Strategy::NewTab => "newTab",
			Strategy::FullNavigation => "fullNavigation",
		}
	}

	/// Returns `true` for strategies backed by a separate browsing context.
	pub fn uses_window(self) -> bool {
		matches!(self, Strategy::Popup | Strategy::NewTab)
	}
}

impl fmt::Display for Strategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when parsing an unknown strategy or device class name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
	pub kind: &'static str,
	pub value: String,
}

impl fmt::Display for UnknownVariant {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "unknown {} '{}'", self.kind, self.value)
	}
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Strategy {
	type Err = UnknownVariant;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
			"embedded" | "iframe" | "frame" => Ok(Strategy::Embedded),
			"popup" => Ok(Strategy::Popup),
			"newtab" | "newwindow" | "tab" => Ok(Strategy::NewTab),
			"fullnavigation" | "fullredirect" | "redirect" => Ok(Strategy::FullNavigation),
			_ => Err(UnknownVariant {
				kind: "strategy",
				value: s.to_string(),
			}),
		}
	}
}

/// Coarse device class used for sizing and fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceClass {
	#[default]
	Desktop,
	/// Constrained viewport (phones, small tablets).
	Mobile,
}

impl DeviceClass {
	pub fn as_str(self) -> &'static str {
		match self {
			DeviceClass::Desktop => "desktop",
			DeviceClass::Mobile => "mobile",
		}
	}
}

impl fmt::Display for DeviceClass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DeviceClass {
	type Err = UnknownVariant;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"desktop" => Ok(DeviceClass::Desktop),
			"mobile" | "constrained" => Ok(DeviceClass::Mobile),
			_ => Err(UnknownVariant {
				kind: "device class",
				value: s.to_string(),
			}),
		}
	}
}
