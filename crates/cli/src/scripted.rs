//! Surfaces that replay a scenario instead of touching a browser.
//!
//! Every call is timestamped against the (paused) tokio clock and kept as a
//! [`CallRecord`] for the replay report. Window probes answer from a shared
//! [`WindowScript`] the replay steps update as they fire.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use payframe::WindowProbe;
use payframe::host::{Environment, FrameHeight, FrameSpec, HostError, NavigationTarget, Notice, SurfaceId, Surfaces, WindowSpec};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::debug;

/// One surface operation, relative to the start of the replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
	pub at_ms: u64,
	pub op: &'static str,
	#[serde(skip_serializing_if = "Value::is_null")]
	pub detail: Value,
}

#[derive(Debug, Default)]
struct ScriptState {
	windows: HashMap<SurfaceId, WindowProbe>,
	last_window: Option<SurfaceId>,
	calls: Vec<CallRecord>,
}

/// Shared view of the scripted state used by replay steps.
#[derive(Debug, Clone)]
pub struct WindowScript {
	state: Arc<Mutex<ScriptState>>,
}

impl WindowScript {
	/// Points the most recently opened window at `location`; `false` when no
	/// window is open.
	pub fn set_location(&self, location: &str) -> bool {
		let mut state = self.state.lock();
		let Some(surface) = state.last_window else {
			return false;
		};
		state.windows.insert(surface, WindowProbe::at(location));
		true
	}

	/// Marks the most recently opened window as closed by the payer.
	pub fn close_window(&self) -> bool {
		let mut state = self.state.lock();
		let Some(surface) = state.last_window else {
			return false;
		};
		state.windows.insert(surface, WindowProbe::closed());
		true
	}

	pub fn calls(&self) -> Vec<CallRecord> {
		self.state.lock().calls.clone()
	}
}

/// Scenario-driven [`Surfaces`] implementation.
#[derive(Debug)]
pub struct ScriptedSurfaces {
	environment: Environment,
	refuse_windows: bool,
	reject_frames: bool,
	started: Instant,
	next_surface: u64,
	state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSurfaces {
	pub fn new(environment: Environment, refuse_windows: bool, reject_frames: bool) -> (Self, WindowScript) {
		let state = Arc::new(Mutex::new(ScriptState::default()));
		(
			Self {
				environment,
				refuse_windows,
				reject_frames,
				started: Instant::now(),
				next_surface: 0,
				state: Arc::clone(&state),
			},
			WindowScript { state },
		)
	}

	fn allocate(&mut self) -> SurfaceId {
		self.next_surface += 1;
		SurfaceId(self.next_surface)
	}

	fn record(&self, op: &'static str, detail: Value) {
		let at_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
		debug!(target = "payframe.cli", at_ms, op, "surface call");
		self.state.lock().calls.push(CallRecord { at_ms, op, detail });
	}
}

impl Surfaces for ScriptedSurfaces {
	fn environment(&self) -> Environment {
		self.environment
	}

	fn mount_frame(&mut self, spec: &FrameSpec) -> Result<SurfaceId, HostError> {
		if self.reject_frames {
			self.record("mountFrame", json!({"url": spec.url, "rejected": true}));
			return Err(HostError("frame mounting disabled by scenario".to_string()));
		}
		let surface = self.allocate();
		self.record(
			"mountFrame",
			json!({"surface": surface.0, "url": spec.url, "sandbox": spec.sandbox, "allow": spec.allow}),
		);
		Ok(surface)
	}

	fn reveal(&mut self, surface: SurfaceId) {
		self.record("reveal", json!({"surface": surface.0}));
	}

	fn open_window(&mut self, spec: &WindowSpec) -> Option<SurfaceId> {
		let features = spec.features.map(|features| features.to_feature_string());
		if self.refuse_windows {
			self.record("openWindow", json!({"url": spec.url, "target": spec.target, "features": features, "refused": true}));
			return None;
		}
		let surface = self.allocate();
		{
			let mut state = self.state.lock();
			state.windows.insert(surface, WindowProbe::open());
			state.last_window = Some(surface);
		}
		self.record(
			"openWindow",
			json!({"surface": surface.0, "url": spec.url, "target": spec.target, "features": features}),
		);
		Some(surface)
	}

	fn probe_window(&mut self, surface: SurfaceId) -> WindowProbe {
		self.state.lock().windows.get(&surface).cloned().unwrap_or_else(WindowProbe::closed)
	}

	fn resize_frame(&mut self, surface: SurfaceId, height: FrameHeight) {
		let detail = match height {
			FrameHeight::Exact(px) => json!({"surface": surface.0, "height": px}),
			FrameHeight::AtLeast(px) => json!({"surface": surface.0, "minHeight": px}),
		};
		self.record("resize", detail);
	}

	fn show_inline(&mut self, surface: SurfaceId, html: &str) {
		self.record("showInline", json!({"surface": surface.0, "htmlLength": html.len()}));
	}

	fn show_notice(&mut self, notice: &Notice) {
		self.record("notice", json!({"text": notice.to_string()}));
	}

	fn navigate(&mut self, target: NavigationTarget, url: &str) {
		let target = match target {
			NavigationTarget::Top => "top",
			NavigationTarget::Current => "current",
		};
		self.record("navigate", json!({"target": target, "url": url}));
	}

	fn release(&mut self, surface: SurfaceId) {
		self.state.lock().windows.remove(&surface);
		self.record("release", json!({"surface": surface.0}));
	}

	fn dismiss(&mut self) {
		self.record("dismiss", Value::Null);
	}
}

#[cfg(test)]
mod tests {
	use payframe::host::WindowFeatures;
	use payframe::{DeviceClass, Strategy};

	use super::*;

	fn window(url: &str) -> WindowSpec {
		WindowSpec {
			url: url.to_string(),
			target: "payframe_popup",
			features: Some(WindowFeatures::popup(
				DeviceClass::Desktop,
				Environment::default().screen,
				600,
				700,
			)),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn window_script_drives_probes() {
		let (mut surfaces, script) = ScriptedSurfaces::new(Environment::default(), false, false);
		assert!(!script.set_location("https://shop.example/success"));

		let surface = surfaces.open_window(&window("https://pay.example")).unwrap();
		assert_eq!(surfaces.probe_window(surface), WindowProbe::open());

		tokio::time::advance(std::time::Duration::from_millis(250)).await;
		assert!(script.set_location("https://shop.example/success"));
		assert_eq!(surfaces.probe_window(surface).location.as_deref(), Some("https://shop.example/success"));

		surfaces.release(surface);
		assert!(surfaces.probe_window(surface).closed);

		let calls = script.calls();
		assert_eq!(calls[0].op, "openWindow");
		assert_eq!(calls[1].op, "release");
		assert_eq!(calls[1].at_ms, 250);
	}

	#[tokio::test(start_paused = true)]
	async fn refused_windows_are_recorded_without_surface() {
		let (mut surfaces, script) = ScriptedSurfaces::new(Environment::default(), true, false);
		assert!(surfaces.open_window(&window("https://pay.example")).is_none());
		assert!(!script.close_window());
		assert_eq!(script.calls()[0].detail["refused"], true);
	}

	#[tokio::test(start_paused = true)]
	async fn notices_are_rendered_as_text() {
		let (mut surfaces, script) = ScriptedSurfaces::new(Environment::default(), false, false);
		surfaces.show_notice(&Notice::Waiting {
			gateway: "Payment Gateway".to_string(),
			strategy: Strategy::Popup,
		});
		surfaces.dismiss();
		let calls = script.calls();
		assert_eq!(calls[0].detail["text"], "Complete your payment with Payment Gateway in the popup window.");
		assert_eq!(serde_json::to_value(&calls[1]).unwrap(), json!({"atMs": 0, "op": "dismiss"}));
	}
}
