//! Command execution and result emission.

pub mod classify;
pub mod config;
pub mod replay;
pub mod strategy;

use anyhow::Context;
use payframe::DeviceClass;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::{
	ClassifyData, CommandInputs, ConfigData, DiagnosticLevel, OutputFormat, ReplayData, ResultBuilder, StrategyData, TextRender, print_result,
};

/// Runs the parsed command, printing its result envelope. The returned error
/// has already been reported on stdout.
pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
	let format = cli.format;
	let config_path = cli.config.as_deref();
	let config_input = config_path.map(|path| path.display().to_string());
	debug!(target = "payframe.cli", command = ?cli.command, config = ?config_input, "dispatch");

	let base = match config::load(config_path) {
		Ok(base) => base,
		Err(err) => {
			let name = command_name(&cli.command);
			let inputs = CommandInputs {
				config_path: config_input,
				..Default::default()
			};
			return emit::<()>(name, inputs, Err(err), format);
		}
	};

	match cli.command {
		Commands::Strategy {
			url,
			device,
			exclude,
			deny,
		} => {
			let inputs = CommandInputs {
				url: Some(url.clone()),
				config_path: config_input,
				extra: Some(json!({"device": DeviceClass::from(device), "exclude": exclude, "deny": deny})),
				..Default::default()
			};
			let result = strategy::execute(&url, device.into(), &exclude, &deny, &base);
			emit("strategy", inputs, result, format)
		}
		Commands::Classify {
			payload,
			location,
			device,
			viewport_height,
		} => {
			let inputs = CommandInputs {
				config_path: config_input,
				extra: Some(json!({"payload": payload, "location": location})),
				..Default::default()
			};
			let data = if location {
				classify::location(&payload, &base)
			} else {
				classify::message(&payload, device.into(), viewport_height, &base)
			};
			emit("classify", inputs, Ok(data), format)
		}
		Commands::Config => {
			let inputs = CommandInputs {
				config_path: config_input,
				..Default::default()
			};
			let result = config::execute(config_path, &base);
			emit("config", inputs, result, format)
		}
		Commands::Replay { scenario } => {
			let inputs = CommandInputs {
				config_path: config_input,
				scenario_path: Some(scenario.display().to_string()),
				..Default::default()
			};
			let result = match replay::Scenario::load(&scenario) {
				Ok(loaded) => {
					tokio::time::pause();
					replay::run(loaded, base).await
				}
				Err(err) => Err(err),
			};
			emit("replay", inputs, result, format)
		}
	}
}

fn command_name(command: &Commands) -> &'static str {
	match command {
		Commands::Strategy { .. } => "strategy",
		Commands::Classify { .. } => "classify",
		Commands::Config => "config",
		Commands::Replay { .. } => "replay",
	}
}

/// Notes worth surfacing next to a command's data.
trait Diagnose {
	fn diagnostics(&self) -> Vec<(DiagnosticLevel, String)> {
		Vec::new()
	}
}

impl Diagnose for () {}

impl Diagnose for ConfigData {}

impl Diagnose for StrategyData {
	fn diagnostics(&self) -> Vec<(DiagnosticLevel, String)> {
		let mut notes = Vec::new();
		if self.framing_denied {
			notes.push((DiagnosticLevel::Info, format!("{} is framing-denied, embedding skipped", self.host)));
		}
		if self.strategy.is_none() {
			notes.push((DiagnosticLevel::Warning, "every strategy is excluded".to_string()));
		}
		notes
	}
}

impl Diagnose for ClassifyData {
	fn diagnostics(&self) -> Vec<(DiagnosticLevel, String)> {
		match self.reason {
			Some(reason) => vec![(DiagnosticLevel::Info, format!("a live session would drop this message ({reason})"))],
			None => Vec::new(),
		}
	}
}

impl Diagnose for ReplayData {
	fn diagnostics(&self) -> Vec<(DiagnosticLevel, String)> {
		if self.steps_skipped == 0 {
			return Vec::new();
		}
		vec![(
			DiagnosticLevel::Warning,
			format!("{} step(s) not applied, the session settled first", self.steps_skipped),
		)]
	}
}

fn emit<T: Serialize + Diagnose + TextRender>(command: &'static str, inputs: CommandInputs, result: Result<T, CliError>, format: OutputFormat) -> anyhow::Result<()> {
	let builder = ResultBuilder::new(command).inputs(inputs);
	match result {
		Ok(data) => {
			let builder = data
				.diagnostics()
				.into_iter()
				.fold(builder, |builder, (level, message)| builder.diagnostic_with_source(level, message, command));
			print_result(&builder.data(data).build(), format);
			Ok(())
		}
		Err(err) => {
			let envelope: crate::output::CommandResult<T> = builder.error(err.code(), err.to_string()).build();
			print_result(&envelope, format);
			Err(err).with_context(|| format!("{command} failed"))
		}
	}
}
