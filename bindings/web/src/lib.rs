//! Browser binding for payframe.
//!
//! Exposes a `PaymentFrame` class to JavaScript. Each instance owns one
//! [`Controller`] over a [`dom::DomHost`]; DOM events, timeouts and window
//! messages re-enter the controller through [`Core::dispatch`]. Messages are
//! accepted only from windows the host opened or framed.

mod console;
mod dom;
mod sources;

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Function;
use payframe::{Callbacks, Config, Controller, Outcome, RawMessage};
use serde::Serialize;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use web_sys::{Event, MessageEvent};

use crate::dom::{DomHost, Listener};

#[wasm_bindgen(start)]
fn start() {
	console_error_panic_hook::set_once();
}

/// Shared state behind a `PaymentFrame` and every closure it registers.
pub(crate) struct Core {
	controller: RefCell<Option<Controller<DomHost>>>,
	/// Outcomes settled during a dispatch, delivered once the borrow ends.
	settled: RefCell<Vec<(Outcome, Callbacks)>>,
	listeners: RefCell<Vec<Listener>>,
}

impl Core {
	/// Runs `f` against the controller unless it is already borrowed higher
	/// up the stack, then delivers any outcome that settled.
	pub(crate) fn dispatch<R>(self: &Rc<Self>, f: impl FnOnce(&mut Controller<DomHost>) -> R) -> Option<R> {
		let result = {
			let Ok(mut slot) = self.controller.try_borrow_mut() else {
				debug!(target = "payframe.web", "re-entrant event dropped");
				return None;
			};
			let controller = slot.as_mut()?;
			controller.host_mut().purge();
			f(controller)
		};
		self.flush();
		Some(result)
	}

	fn flush(&self) {
		loop {
			let pending = std::mem::take(&mut *self.settled.borrow_mut());
			if pending.is_empty() {
				return;
			}
			for (outcome, callbacks) in pending {
				callbacks.dispatch(outcome);
			}
		}
	}

	fn queue(self: &Rc<Self>, callbacks: Callbacks) -> impl FnOnce(Outcome) + 'static {
		let core = Rc::downgrade(self);
		move |outcome| {
			if let Some(core) = core.upgrade() {
				core.settled.borrow_mut().push((outcome, callbacks));
			}
		}
	}
}

/// Converts a posted `MessageEvent.data` value into the controller's input.
fn raw_message(data: JsValue) -> Option<RawMessage> {
	if let Some(text) = data.as_string() {
		return Some(RawMessage::Text(text));
	}
	if data.is_undefined() || data.is_null() {
		return None;
	}
	match serde_wasm_bindgen::from_value::<serde_json::Value>(data) {
		Ok(value) => Some(RawMessage::Structured(value)),
		Err(err) => {
			debug!(target = "payframe.web", error = %err, "unreadable message ignored");
			None
		}
	}
}

fn parse_config(config: JsValue) -> Result<Config, JsError> {
	if config.is_undefined() || config.is_null() {
		return Ok(Config::default());
	}
	let json = match config.as_string() {
		Some(text) => text,
		None => {
			let value: serde_json::Value = serde_wasm_bindgen::from_value(config)?;
			value.to_string()
		}
	};
	Ok(Config::from_json(&json)?)
}

fn to_js(value: &impl Serialize) -> JsValue {
	value
		.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
		.unwrap_or(JsValue::UNDEFINED)
}

fn invoke(callback: &Function, value: JsValue) {
	if let Err(err) = callback.call1(&JsValue::NULL, &value) {
		warn!(target = "payframe.web", error = ?err, "outcome callback threw");
	}
}

/// Presents hosted payment pages over the current document.
#[wasm_bindgen]
pub struct PaymentFrame {
	core: Rc<Core>,
}

#[wasm_bindgen]
impl PaymentFrame {
	/// Accepts a config object, its JSON text, or nothing for defaults.
	#[wasm_bindgen(constructor)]
	pub fn new(config: JsValue) -> Result<PaymentFrame, JsError> {
		let config = parse_config(config)?;
		console::init(config.debug);

		let core = Rc::new(Core {
			controller: RefCell::new(None),
			settled: RefCell::new(Vec::new()),
			listeners: RefCell::new(Vec::new()),
		});
		let host = DomHost::new(Rc::downgrade(&core), config.allow_close).map_err(|err| JsError::new(&format!("{err:?}")))?;

		let weak = Rc::downgrade(&core);
		let listener = Listener::new(host.window(), "message", move |event: Event| {
			let Some(core) = weak.upgrade() else {
				return;
			};
			let Some(event) = event.dyn_ref::<MessageEvent>() else {
				return;
			};
			let source: Option<JsValue> = event.source().map(JsValue::from);
			core.dispatch(|controller| {
				let Some(ticket) = controller.active_ticket() else {
					return;
				};
				if controller.host().message_source(source.as_ref()).is_none() {
					debug!(target = "payframe.web", origin = %event.origin(), "message from untrusted sender dropped");
					return;
				}
				if let Some(raw) = raw_message(event.data()) {
					controller.on_message(ticket, raw);
				}
			});
		})
		.map_err(|err| JsError::new(&format!("{err:?}")))?;

		*core.controller.borrow_mut() = Some(Controller::new(config, host)?);
		core.listeners.borrow_mut().push(listener);
		Ok(PaymentFrame { core })
	}

	/// Opens `url`, superseding any session in progress. Returns the session
	/// generation.
	pub fn open(
		&self,
		url: &str,
		on_success: Option<Function>,
		on_failure: Option<Function>,
		on_cancelled: Option<Function>,
	) -> Result<f64, JsError> {
		let mut callbacks = Callbacks::new();
		if let Some(callback) = on_success {
			callbacks = callbacks.on_success(move |payload| invoke(&callback, to_js(&payload)));
		}
		if let Some(callback) = on_failure {
			callbacks = callbacks.on_failure(move |payload| invoke(&callback, to_js(&payload)));
		}
		if let Some(callback) = on_cancelled {
			callbacks = callbacks.on_cancelled(move |reason| invoke(&callback, to_js(&reason)));
		}

		let handler = self.core.queue(callbacks);
		let ticket = self
			.core
			.dispatch(|controller| controller.open(url, handler))
			.ok_or_else(|| JsError::new("payment frame is busy or destroyed"))??;
		Ok(ticket.generation() as f64)
	}

	/// Closes the active session as if the user dismissed it.
	pub fn close(&self) -> bool {
		self.core
			.dispatch(|controller| controller.active_ticket().is_some_and(|ticket| controller.close(ticket)))
			.unwrap_or(false)
	}

	/// Cancels the active session. Returns `false` when nothing was open.
	pub fn cancel(&self) -> bool {
		self.core.dispatch(|controller| controller.cancel()).unwrap_or(false)
	}

	/// Skips a pending redirect countdown.
	#[wasm_bindgen(js_name = continueNow)]
	pub fn continue_now(&self) {
		self.core.dispatch(|controller| {
			if let Some(ticket) = controller.active_ticket() {
				controller.continue_now(ticket);
			}
		});
	}

	#[wasm_bindgen(getter)]
	pub fn state(&self) -> String {
		self.core
			.controller
			.try_borrow()
			.ok()
			.and_then(|slot| slot.as_ref().map(|controller| controller.state().to_string()))
			.unwrap_or_else(|| "destroyed".to_string())
	}

	/// Marks a host as refusing to be framed for later sessions.
	#[wasm_bindgen(js_name = denyFraming)]
	pub fn deny_framing(&self, pattern: &str) -> Result<(), JsError> {
		self.core
			.dispatch(|controller| controller.policy_mut().extend_denied([pattern]))
			.ok_or_else(|| JsError::new("payment frame is busy or destroyed"))??;
		Ok(())
	}

	/// Cancels any session, removes every element and listener, and detaches
	/// the controller. Later calls become no-ops.
	pub fn destroy(&self) {
		self.core.dispatch(|controller| {
			controller.cancel();
			controller.host_mut().teardown();
		});
		self.core.listeners.borrow_mut().clear();
		if let Ok(mut slot) = self.core.controller.try_borrow_mut() {
			*slot = None;
		}
	}
}
