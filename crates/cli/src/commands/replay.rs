//! Scripted session replay.
//!
//! A scenario names the target URL, the page environment and a list of
//! timed host events. The replay runs the real driver against
//! [`ScriptedSurfaces`] on a paused clock, so a 15 minute session timeout
//! completes instantly while keeping exact virtual timestamps.

use std::path::{Path, PathBuf};
use std::time::Duration;

use payframe::host::{Dimensions, Environment};
use payframe::{Config, DeviceClass, FrameContent, Outcome, Ticket};
use payframe_runtime::{Driver, DriverHandle};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{CliError, Result};
use crate::output::ReplayData;
use crate::scripted::{ScriptedSurfaces, WindowScript};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Scenario {
	pub url: String,
	/// Replaces the `--config` file for this scenario.
	#[serde(default)]
	pub config: Option<Config>,
	#[serde(default)]
	pub environment: ScenarioEnvironment,
	/// Every window open attempt is blocked.
	#[serde(default)]
	pub refuse_windows: bool,
	/// Every frame mount fails.
	#[serde(default)]
	pub reject_frames: bool,
	/// Extra framing-denied host patterns.
	#[serde(default)]
	pub deny: Vec<String>,
	#[serde(default)]
	pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioEnvironment {
	pub device: DeviceClass,
	pub viewport_width: u32,
	pub viewport_height: u32,
	pub screen_width: u32,
	pub screen_height: u32,
}

impl Default for ScenarioEnvironment {
	fn default() -> Self {
		let env = Environment::default();
		Self {
			device: env.device_class,
			viewport_width: env.viewport.width,
			viewport_height: env.viewport.height,
			screen_width: env.screen.width,
			screen_height: env.screen.height,
		}
	}
}

impl From<ScenarioEnvironment> for Environment {
	fn from(env: ScenarioEnvironment) -> Self {
		Environment {
			device_class: env.device,
			viewport: Dimensions {
				width: env.viewport_width,
				height: env.viewport_height,
			},
			screen: Dimensions {
				width: env.screen_width,
				height: env.screen_height,
			},
		}
	}
}

/// Host event fired `at_ms` after the session opened.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
	#[serde(default)]
	pub at_ms: u64,
	#[serde(flatten)]
	pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Action {
	FrameLoad {
		#[serde(default = "rendered")]
		content: FrameContent,
	},
	FrameError,
	Message {
		payload: Value,
	},
	/// The popup/tab navigated somewhere readable.
	WindowLocation {
		location: String,
	},
	WindowClosed,
	/// Close affordance.
	Close,
	ContinueNow,
	Cancel,
}

fn rendered() -> FrameContent {
	FrameContent::NonEmpty
}

impl Scenario {
	pub fn load(path: &Path) -> Result<Self> {
		let json = std::fs::read_to_string(path).map_err(|source| CliError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::parse(&json, path)
	}

	fn parse(json: &str, path: &Path) -> Result<Self> {
		let scenario: Scenario = serde_json::from_str(json).map_err(|err| scenario_error(path, err.to_string()))?;
		if let Some(pair) = scenario.steps.windows(2).find(|pair| pair[1].at_ms < pair[0].at_ms) {
			return Err(scenario_error(
				path,
				format!("steps must be ordered by atMs ({} follows {})", pair[1].at_ms, pair[0].at_ms),
			));
		}
		if let Some(config) = &scenario.config {
			config.validate()?;
		}
		Ok(scenario)
	}
}

fn scenario_error(path: &Path, message: String) -> CliError {
	CliError::Scenario {
		path: PathBuf::from(path),
		message,
	}
}

struct Played {
	outcome: Outcome,
	applied: usize,
	skipped: usize,
}

/// Runs `scenario` to completion. The tokio clock must already be paused.
pub async fn run(scenario: Scenario, base: Config) -> Result<ReplayData> {
	let config = scenario.config.clone().unwrap_or(base);
	let started = Instant::now();
	let (surfaces, script) = ScriptedSurfaces::new(scenario.environment.into(), scenario.refuse_windows, scenario.reject_frames);
	let (mut driver, handle) = Driver::new(config, surfaces)?;
	driver.deny_framing(&scenario.deny)?;

	let client = play(handle, scenario.url, scenario.steps, script.clone(), started);
	let (_surfaces, played) = tokio::join!(driver.run(), client);
	let played = played?;

	let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
	info!(
		target = "payframe.cli",
		outcome = %played.outcome.kind(),
		elapsed_ms,
		applied = played.applied,
		skipped = played.skipped,
		"replay finished"
	);
	Ok(ReplayData {
		kind: played.outcome.kind().to_string(),
		outcome: played.outcome,
		elapsed_ms,
		steps_applied: played.applied,
		steps_skipped: played.skipped,
		calls: script.calls(),
	})
}

async fn play(handle: DriverHandle, url: String, steps: Vec<Step>, script: WindowScript, started: Instant) -> Result<Played> {
	let lease = handle.open(url).await?;
	let ticket = lease.ticket;
	let outcome = lease.outcome();
	tokio::pin!(outcome);

	for (applied, step) in steps.iter().enumerate() {
		let due = started + Duration::from_millis(step.at_ms);
		tokio::select! {
			biased;
			settled = &mut outcome => {
				return Ok(Played {
					outcome: settled?,
					applied,
					skipped: steps.len() - applied,
				});
			}
			() = tokio::time::sleep_until(due) => {}
		}
		apply(&handle, ticket, &step.action, &script).await?;
		// Let the driver process the event before the next step is due.
		tokio::task::yield_now().await;
	}

	let outcome = outcome.await?;
	Ok(Played {
		outcome,
		applied: steps.len(),
		skipped: 0,
	})
}

async fn apply(handle: &DriverHandle, ticket: Ticket, action: &Action, script: &WindowScript) -> Result<()> {
	debug!(target = "payframe.cli", %ticket, ?action, "replay step");
	match action {
		Action::FrameLoad { content } => handle.frame_loaded(ticket, *content)?,
		Action::FrameError => handle.frame_error(ticket)?,
		Action::Message { payload } => handle.message(ticket, payload.clone())?,
		Action::WindowLocation { location } => {
			if !script.set_location(location) {
				debug!(target = "payframe.cli", "no window open for windowLocation step");
			}
		}
		Action::WindowClosed => {
			if !script.close_window() {
				debug!(target = "payframe.cli", "no window open for windowClosed step");
			}
		}
		Action::Close => handle.close(ticket)?,
		Action::ContinueNow => handle.continue_now(ticket)?,
		Action::Cancel => {
			handle.cancel().await?;
		}
	}
	Ok(())
}
