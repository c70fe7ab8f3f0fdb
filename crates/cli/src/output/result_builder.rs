use std::io::{self, Write};
use std::time::Instant;

use colored::Colorize;
use serde::Serialize;

use crate::output::format::OutputFormat;
use crate::output::model::{CommandError, CommandInputs, CommandResult, Diagnostic, DiagnosticLevel, ErrorCode, SCHEMA_VERSION};
use crate::output::text::TextRender;

/// Builder for constructing command results.
pub struct ResultBuilder<T: Serialize> {
	command: String,
	inputs: Option<CommandInputs>,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
	diagnostics: Vec<Diagnostic>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			inputs: None,
			data: None,
			error: None,
			start_time: Instant::now(),
			diagnostics: Vec::new(),
		}
	}

	pub fn inputs(mut self, inputs: CommandInputs) -> Self {
		self.inputs = Some(inputs);
		self
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
			details: None,
		});
		self
	}

	pub fn diagnostic(mut self, level: DiagnosticLevel, message: impl Into<String>) -> Self {
		self.diagnostics.push(Diagnostic {
			level,
			message: message.into(),
			source: None,
		});
		self
	}

	pub fn diagnostic_with_source(mut self, level: DiagnosticLevel, message: impl Into<String>, source: impl Into<String>) -> Self {
		self.diagnostics.push(Diagnostic {
			level,
			message: message.into(),
			source: Some(source.into()),
		});
		self
	}

	pub fn build(self) -> CommandResult<T> {
		let ok = self.error.is_none() && self.data.is_some();
		let duration_ms = u64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(u64::MAX);

		CommandResult {
			schema_version: Some(SCHEMA_VERSION),
			ok,
			command: self.command,
			inputs: self.inputs,
			data: self.data,
			error: self.error,
			duration_ms: Some(duration_ms),
			diagnostics: self.diagnostics,
		}
	}
}

/// Prints a command result to stdout in `format`.
pub fn print_result<T: Serialize + TextRender>(result: &CommandResult<T>, format: OutputFormat) {
	if !format.is_json() {
		print_result_text(result);
		return;
	}
	let json = if format == OutputFormat::Ndjson {
		serde_json::to_string(result)
	} else {
		serde_json::to_string_pretty(result)
	};
	if let Ok(json) = json {
		println!("{json}");
	}
}

fn print_result_text<T: TextRender + Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if result.ok {
		if let Some(text) = result.data.as_ref().map(TextRender::render_text).filter(|text| !text.is_empty()) {
			let _ = writeln!(stdout, "{text}");
		}
	} else if let Some(ref error) = result.error {
		let _ = writeln!(stdout, "{} [{}]: {}", "Error".red().bold(), error.code, error.message);
		if let Some(ref details) = error.details {
			if let Ok(json) = serde_json::to_string_pretty(details) {
				let _ = writeln!(stdout, "Details: {json}");
			}
		}
	}

	for diag in &result.diagnostics {
		let prefix = match diag.level {
			DiagnosticLevel::Info => "info".cyan(),
			DiagnosticLevel::Warning => "warning".yellow(),
			DiagnosticLevel::Error => "error".red(),
		};
		if let Some(ref source) = diag.source {
			let _ = writeln!(stdout, "[{prefix}:{source}] {}", diag.message);
		} else {
			let _ = writeln!(stdout, "[{prefix}] {}", diag.message);
		}
	}
}
