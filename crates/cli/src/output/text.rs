//! Human-readable rendering of command payloads for `--format text`.

use std::fmt::Write;

use payframe::{CancelReason, Outcome, Payload};

use crate::output::data::{ClassifyData, ConfigData, ReplayData, StrategyData, StrategyStep};

/// Plain-text summary of a command payload.
pub trait TextRender {
	fn render_text(&self) -> String;
}

impl TextRender for () {
	fn render_text(&self) -> String {
		String::new()
	}
}

/// `embedded -> popup -> newTab -> fullNavigation`
fn chain_line(chain: &[StrategyStep]) -> String {
	chain.iter().map(|step| step.strategy.as_str()).collect::<Vec<_>>().join(" -> ")
}

fn payload_suffix(payload: &Payload) -> String {
	match &payload.redirect_url {
		Some(url) => format!(" via {}, redirect {url}", source_name(payload)),
		None => format!(" via {}", source_name(payload)),
	}
}

fn source_name(payload: &Payload) -> &'static str {
	match payload.source {
		payframe::SignalSource::Message => "message",
		payframe::SignalSource::WindowLocation => "window location",
		payframe::SignalSource::Fallback => "fallback",
	}
}

/// One-line description of how a session settled.
fn outcome_line(outcome: &Outcome) -> String {
	match outcome {
		Outcome::Success { payload } => format!("success{}", payload_suffix(payload)),
		Outcome::Failure { payload } => format!("failure{}", payload_suffix(payload)),
		Outcome::Cancelled { reason } => match reason {
			CancelReason::TimedOut { after } => format!("cancelled: timed-out after {}ms", after.as_millis()),
			CancelReason::HandedOff { url } => format!("cancelled: handed-off to {url}"),
			CancelReason::GatewayCancelled { payload } => format!("cancelled: gateway-cancelled{}", payload_suffix(payload)),
			other => format!("cancelled: {other}"),
		},
	}
}

impl TextRender for StrategyData {
	fn render_text(&self) -> String {
		let mut out = String::new();
		let _ = writeln!(out, "{} ({}, {})", self.url, self.device, self.gateway);
		if self.framing_denied {
			let _ = writeln!(out, "framing denied for {}", self.host);
		}
		match self.strategy {
			Some(strategy) => {
				let _ = writeln!(out, "strategy: {strategy}");
			}
			None => {
				let _ = writeln!(out, "strategy: none left");
			}
		}
		let _ = write!(out, "chain: {}", chain_line(&self.chain));
		out
	}
}

impl TextRender for ClassifyData {
	fn render_text(&self) -> String {
		let mut out = format!("{} -> {}", self.input, self.kind);
		if self.terminal {
			out.push_str(" (settles)");
		}
		if let Some(url) = &self.url {
			let _ = write!(out, "\nurl: {url}");
		}
		if let Some(height) = &self.height {
			let _ = write!(out, "\nheight: {height}");
		}
		if let Some(length) = self.html_length {
			let _ = write!(out, "\ninline markup: {length} bytes");
		}
		if let Some(reason) = self.reason {
			let _ = write!(out, "\nreason: {reason}");
		}
		out
	}
}

impl TextRender for ConfigData {
	fn render_text(&self) -> String {
		let body = serde_json::to_string_pretty(&self.config).unwrap_or_default();
		format!("# source: {}\n{body}", self.source)
	}
}

impl TextRender for ReplayData {
	fn render_text(&self) -> String {
		let mut out = String::new();
		let _ = writeln!(out, "{} at {}ms", outcome_line(&self.outcome), self.elapsed_ms);
		let _ = write!(out, "{} step(s) applied, {} skipped", self.steps_applied, self.steps_skipped);
		for call in &self.calls {
			let _ = write!(out, "\n  {:>7}ms  {}", call.at_ms, call.op);
			if !call.detail.is_null() {
				let _ = write!(out, " {}", call.detail);
			}
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use payframe::{SignalSource, Strategy};
	use serde_json::json;

	use super::*;
	use crate::scripted::CallRecord;

	#[test]
	fn outcome_lines_name_reason_and_source() {
		let paid = Outcome::success(Payload::new(SignalSource::Message, json!({})).with_redirect(Some("https://shop.example/ok".into())));
		assert_eq!(outcome_line(&paid), "success via message, redirect https://shop.example/ok");

		let blocked = Outcome::failure(Payload::new(SignalSource::Fallback, json!({"reason": "blocked"})));
		assert_eq!(outcome_line(&blocked), "failure via fallback");

		let idle = Outcome::cancelled(CancelReason::TimedOut {
			after: Duration::from_secs(900),
		});
		assert_eq!(outcome_line(&idle), "cancelled: timed-out after 900000ms");

		assert_eq!(outcome_line(&Outcome::cancelled(CancelReason::WindowClosed)), "cancelled: window-closed");
	}

	#[test]
	fn strategy_text_shows_chain() {
		let data = StrategyData {
			url: "https://pay.example/s/1".into(),
			host: "pay.example".into(),
			device: payframe::DeviceClass::Desktop,
			framing_denied: false,
			gateway: "Payment Gateway".into(),
			strategy: Some(Strategy::Embedded),
			chain: [Strategy::Embedded, Strategy::Popup, Strategy::FullNavigation]
				.into_iter()
				.map(|strategy| StrategyStep {
					strategy,
					excluded: Vec::new(),
				})
				.collect(),
		};
		let text = data.render_text();
		assert!(text.contains("strategy: embedded"), "{text}");
		assert!(text.ends_with("chain: embedded -> popup -> fullNavigation"), "{text}");
		assert!(!text.contains("framing denied"));
	}

	#[test]
	fn replay_text_lists_timeline() {
		let data = ReplayData {
			outcome: Outcome::cancelled(CancelReason::UserClosed),
			kind: "cancelled".into(),
			elapsed_ms: 1200,
			steps_applied: 1,
			steps_skipped: 0,
			calls: vec![
				CallRecord {
					at_ms: 0,
					op: "mountFrame",
					detail: serde_json::Value::Null,
				},
				CallRecord {
					at_ms: 1200,
					op: "dismiss",
					detail: serde_json::Value::Null,
				},
			],
		};
		let lines: Vec<String> = data.render_text().lines().map(str::to_string).collect();
		assert_eq!(lines[0], "cancelled: user-closed at 1200ms");
		assert_eq!(lines.len(), 4);
		assert!(lines[3].trim_start().starts_with("1200ms  dismiss"));
	}
}
