//! Mirrors `tracing` events to the browser console when `debug` is enabled.

use std::fmt::{self, Write};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use wasm_bindgen::JsValue;
use web_sys::console;

pub(crate) struct ConsoleLayer;

impl<S: Subscriber> Layer<S> for ConsoleLayer {
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		let meta = event.metadata();
		let mut line = format!("[{}] {}:", meta.level(), meta.target());
		event.record(&mut FieldWriter(&mut line));

		let text = JsValue::from_str(&line);
		match *meta.level() {
			Level::ERROR => console::error_1(&text),
			Level::WARN => console::warn_1(&text),
			Level::INFO => console::info_1(&text),
			_ => console::debug_1(&text),
		}
	}
}

struct FieldWriter<'a>(&'a mut String);

impl Visit for FieldWriter<'_> {
	fn record_str(&mut self, field: &Field, value: &str) {
		if field.name() == "message" {
			let _ = write!(self.0, " {value}");
		} else {
			let _ = write!(self.0, " {}={value}", field.name());
		}
	}

	fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
		if field.name() == "message" {
			let _ = write!(self.0, " {value:?}");
		} else {
			let _ = write!(self.0, " {}={value:?}", field.name());
		}
	}
}

/// Installs the console subscriber once; later calls are no-ops.
pub(crate) fn init(debug: bool) {
	if !debug {
		return;
	}
	let _ = tracing_subscriber::registry().with(LevelFilter::DEBUG).with(ConsoleLayer).try_init();
}
