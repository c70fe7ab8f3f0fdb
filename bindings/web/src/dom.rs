//! DOM implementation of the controller's host traits.
//!
//! Every JS callback registered here goes back through [`Core::dispatch`],
//! which never runs while the controller is already borrowed. Closures whose
//! listener or timeout is gone are parked in `spent` and only dropped at the
//! start of the next dispatch, so none is freed while it is executing.

use std::collections::HashMap;
use std::rc::Weak;
use std::sync::LazyLock;
use std::time::Duration;

use payframe::host::{
	Dimensions, Environment, FrameHeight, FrameSpec, HostError, NavigationTarget, Notice, Scheduler, ScrollLock, SurfaceId, Surfaces, TimerId,
	WindowSpec,
};
use payframe::{DeviceClass, FrameContent, WindowProbe};
use regex::Regex;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use web_sys::{Document, Event, EventTarget, HtmlElement, HtmlIFrameElement, KeyboardEvent, Window};

use crate::Core;
use crate::sources::TrustedSources;

static MOBILE_UA_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)android|webos|iphone|ipad|ipod|blackberry|iemobile|opera mini").expect("MOBILE_UA_RE should compile"));

const STYLE_ID: &str = "payframe-styles";
/// Inline OTP markup runs in an opaque origin: no `allow-same-origin`.
const INLINE_SANDBOX: &str = "allow-forms allow-scripts";

const STYLES: &str = r#"
.payframe-overlay { position: fixed; inset: 0; background: rgba(0, 0, 0, 0.85); z-index: 999999; display: flex; align-items: center; justify-content: center; }
.payframe-dialog { position: relative; background: #fff; width: 100%; height: 100%; max-width: 900px; max-height: 95vh; display: flex; flex-direction: column; border-radius: 8px; overflow: hidden; box-shadow: 0 0 50px rgba(0, 0, 0, 0.5); }
.payframe-dialog.payframe-mobile { max-width: 100%; max-height: 100%; border-radius: 0; }
.payframe-close { position: absolute; top: 10px; right: 10px; width: 36px; height: 36px; border: none; border-radius: 50%; background: rgba(0, 0, 0, 0.5); color: #fff; font-size: 24px; line-height: 36px; cursor: pointer; z-index: 10; }
.payframe-body { flex: 1; position: relative; overflow: hidden; }
.payframe-frame { width: 100%; height: 100%; border: none; display: block; }
.payframe-loader { position: absolute; top: 50%; left: 50%; transform: translate(-50%, -50%); text-align: center; }
.payframe-inline { position: absolute; inset: 0; width: 100%; height: 100%; border: none; background: #fff; }
.payframe-notice { padding: 32px 20px; text-align: center; font: 16px/1.5 system-ui, sans-serif; }
.payframe-notice button { margin-top: 16px; padding: 8px 20px; cursor: pointer; }
"#;

/// Event listener that detaches itself when dropped.
pub(crate) struct Listener {
	target: EventTarget,
	kind: &'static str,
	callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
	pub(crate) fn new(target: &EventTarget, kind: &'static str, handler: impl FnMut(Event) + 'static) -> Result<Self, JsValue> {
		let callback = Closure::<dyn FnMut(Event)>::new(handler);
		target.add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())?;
		Ok(Self {
			target: target.clone(),
			kind,
			callback,
		})
	}
}

impl Drop for Listener {
	fn drop(&mut self) {
		let _ = self.target.remove_event_listener_with_callback(self.kind, self.callback.as_ref().unchecked_ref());
	}
}

struct Timeout {
	handle: i32,
	callback: Closure<dyn FnMut()>,
}

struct MountedFrame {
	element: HtmlIFrameElement,
	/// Sandboxed `srcdoc` frame holding inline OTP markup.
	inline: Option<HtmlIFrameElement>,
	listeners: Vec<Listener>,
}

struct Overlay {
	root: HtmlElement,
	body: HtmlElement,
	loader: HtmlElement,
	notice: HtmlElement,
	listeners: Vec<Listener>,
	notice_listeners: Vec<Listener>,
}

/// Body styles replaced while scrolling is locked.
struct SavedScroll {
	overflow: String,
	position: String,
	width: String,
	top: String,
	scroll_y: f64,
}

pub(crate) struct DomHost {
	window: Window,
	document: Document,
	core: Weak<Core>,
	allow_close: bool,
	next_surface: u64,
	overlay: Option<Overlay>,
	frames: HashMap<SurfaceId, MountedFrame>,
	windows: HashMap<SurfaceId, Window>,
	sources: TrustedSources<JsValue>,
	timers: HashMap<TimerId, Timeout>,
	scroll: Option<SavedScroll>,
	spent_listeners: Vec<Listener>,
	spent_timers: Vec<Timeout>,
}

impl DomHost {
	pub(crate) fn new(core: Weak<Core>, allow_close: bool) -> Result<Self, JsValue> {
		let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
		let document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;
		Ok(Self {
			window,
			document,
			core,
			allow_close,
			next_surface: 0,
			overlay: None,
			frames: HashMap::new(),
			windows: HashMap::new(),
			sources: TrustedSources::default(),
			timers: HashMap::new(),
			scroll: None,
			spent_listeners: Vec::new(),
			spent_timers: Vec::new(),
		})
	}

	pub(crate) fn window(&self) -> &Window {
		&self.window
	}

	/// Drops closures retired during earlier dispatches.
	pub(crate) fn purge(&mut self) {
		self.spent_listeners.clear();
		self.spent_timers.clear();
	}

	/// Moves a fired timeout out of the live set.
	pub(crate) fn retire_timer(&mut self, timer: TimerId) {
		if let Some(timeout) = self.timers.remove(&timer) {
			self.spent_timers.push(timeout);
		}
	}

	/// Releases every timer and surface; used when the frame is destroyed.
	pub(crate) fn teardown(&mut self) {
		let timers: Vec<TimerId> = self.timers.keys().copied().collect();
		for timer in timers {
			self.cancel(timer);
		}
		let surfaces: Vec<SurfaceId> = self.frames.keys().chain(self.windows.keys()).copied().collect();
		for surface in surfaces {
			self.release(surface);
		}
		self.dismiss();
		self.sources.clear();
	}

	/// Surface whose window sent a message, or `None` for any other sender.
	pub(crate) fn message_source(&self, source: Option<&JsValue>) -> Option<SurfaceId> {
		self.sources.accepts(source)
	}

	/// Inspects a mounted frame after its load event; `None` once released.
	pub(crate) fn frame_content(&self, surface: SurfaceId) -> Option<FrameContent> {
		let frame = self.frames.get(&surface)?;
		let Some(document) = frame.element.content_document() else {
			return Some(FrameContent::Opaque);
		};
		let rendered = document.body().is_some_and(|body| {
			body.child_element_count() > 0 || body.text_content().is_some_and(|text| !text.trim().is_empty())
		});
		Some(if rendered { FrameContent::NonEmpty } else { FrameContent::Empty })
	}

	pub(crate) fn is_mounted(&self, surface: SurfaceId) -> bool {
		self.frames.contains_key(&surface)
	}

	fn allocate(&mut self) -> SurfaceId {
		self.next_surface += 1;
		SurfaceId(self.next_surface)
	}

	fn element(&self, tag: &str, class: &str) -> Result<HtmlElement, JsValue> {
		let element = self.document.create_element(tag)?.dyn_into::<HtmlElement>().map_err(JsValue::from)?;
		element.set_class_name(class);
		Ok(element)
	}

	fn ensure_styles(&self) -> Result<(), JsValue> {
		if self.document.get_element_by_id(STYLE_ID).is_some() {
			return Ok(());
		}
		let style = self.document.create_element("style")?;
		style.set_id(STYLE_ID);
		style.set_text_content(Some(STYLES));
		match self.document.head() {
			Some(head) => head.append_child(&style)?,
			None => self.document_body()?.append_child(&style)?,
		};
		Ok(())
	}

	fn document_body(&self) -> Result<HtmlElement, JsValue> {
		self.document.body().ok_or_else(|| JsValue::from_str("document has no body"))
	}

	fn ensure_overlay(&mut self) -> Result<&Overlay, JsValue> {
		if self.overlay.is_none() {
			let overlay = self.build_overlay()?;
			self.overlay = Some(overlay);
		}
		self.overlay.as_ref().ok_or_else(|| JsValue::from_str("overlay unavailable"))
	}

	fn build_overlay(&self) -> Result<Overlay, JsValue> {
		self.ensure_styles()?;
		let mobile = self.environment().device_class == DeviceClass::Mobile;

		let root = self.element("div", "payframe-overlay")?;
		let dialog = self.element("div", if mobile { "payframe-dialog payframe-mobile" } else { "payframe-dialog" })?;
		let body = self.element("div", "payframe-body")?;
		let loader = self.element("div", "payframe-loader")?;
		let notice = self.element("div", "payframe-notice")?;
		notice.set_hidden(true);
		loader.set_hidden(true);

		let mut listeners = Vec::new();
		if self.allow_close {
			let close = self.element("button", "payframe-close")?;
			close.set_attribute("type", "button")?;
			close.set_attribute("aria-label", "Close payment")?;
			close.set_text_content(Some("\u{00d7}"));
			listeners.push(Listener::new(&close, "click", self.close_handler())?);
			dialog.append_child(&close)?;

			let overlay_target: JsValue = root.clone().into();
			let core = self.core.clone();
			listeners.push(Listener::new(&root, "click", move |event: Event| {
				let on_backdrop = event.target().is_some_and(|target| {
					let target: &JsValue = target.as_ref();
					*target == overlay_target
				});
				if on_backdrop {
					request_close(&core);
				}
			})?);

			let core = self.core.clone();
			listeners.push(Listener::new(&self.document, "keydown", move |event: Event| {
				if event.dyn_ref::<KeyboardEvent>().is_some_and(|key| key.key() == "Escape") {
					request_close(&core);
				}
			})?);
		}

		body.append_child(&loader)?;
		dialog.append_child(&notice)?;
		dialog.append_child(&body)?;
		root.append_child(&dialog)?;
		self.document_body()?.append_child(&root)?;

		Ok(Overlay {
			root,
			body,
			loader,
			notice,
			listeners,
			notice_listeners: Vec::new(),
		})
	}

	fn close_handler(&self) -> impl FnMut(Event) + 'static {
		let core = self.core.clone();
		move |_event: Event| request_close(&core)
	}

	fn frame_handler(&self, surface: SurfaceId, failed: bool) -> impl FnMut(Event) + 'static {
		let core = self.core.clone();
		move |_event: Event| {
			let Some(core) = core.upgrade() else {
				return;
			};
			core.dispatch(|controller| {
				let Some(ticket) = controller.active_ticket() else {
					return;
				};
				if failed {
					if controller.host().is_mounted(surface) {
						controller.on_frame_error(ticket);
					}
				} else if let Some(content) = controller.host().frame_content(surface) {
					controller.on_frame_load(ticket, content);
				}
			});
		}
	}

	fn try_mount_frame(&mut self, spec: &FrameSpec) -> Result<SurfaceId, JsValue> {
		let surface = self.allocate();
		let element = self.document.create_element("iframe")?.dyn_into::<HtmlIFrameElement>().map_err(JsValue::from)?;
		element.set_class_name("payframe-frame");
		element.set_attribute("sandbox", &spec.sandbox)?;
		element.set_attribute("allow", spec.allow)?;
		element.set_attribute("title", "Secure payment")?;
		let listeners = vec![
			Listener::new(&element, "load", self.frame_handler(surface, false))?,
			Listener::new(&element, "error", self.frame_handler(surface, true))?,
		];
		// Set before insertion so no about:blank load is reported.
		element.set_src(&spec.url);

		self.ensure_overlay()?.body.append_child(&element)?;
		if let Some(window) = element.content_window() {
			self.sources.trust(surface, window.into());
		}
		self.lock_scroll(spec.lock_scroll)?;
		self.frames.insert(
			surface,
			MountedFrame {
				element,
				inline: None,
				listeners,
			},
		);
		Ok(surface)
	}

	fn lock_scroll(&mut self, lock: ScrollLock) -> Result<(), JsValue> {
		if self.scroll.is_some() {
			return Ok(());
		}
		let style = self.document_body()?.style();
		let saved = SavedScroll {
			overflow: style.get_property_value("overflow")?,
			position: style.get_property_value("position")?,
			width: style.get_property_value("width")?,
			top: style.get_property_value("top")?,
			scroll_y: self.window.scroll_y().unwrap_or(0.0),
		};
		style.set_property("overflow", "hidden")?;
		if lock == ScrollLock::Pinned {
			style.set_property("position", "fixed")?;
			style.set_property("width", "100%")?;
			style.set_property("top", &format!("-{}px", saved.scroll_y))?;
		}
		self.scroll = Some(saved);
		Ok(())
	}

	fn restore_scroll(&mut self) -> Result<(), JsValue> {
		let Some(saved) = self.scroll.take() else {
			return Ok(());
		};
		let style = self.document_body()?.style();
		style.set_property("overflow", &saved.overflow)?;
		style.set_property("position", &saved.position)?;
		style.set_property("width", &saved.width)?;
		style.set_property("top", &saved.top)?;
		self.window.scroll_to_with_x_and_y(0.0, saved.scroll_y);
		Ok(())
	}

	fn try_show_notice(&mut self, notice: &Notice) -> Result<(), JsValue> {
		let core = self.core.clone();
		let document = self.document.clone();
		let overlay = self.ensure_overlay()?;
		let mut listeners = Vec::new();

		match notice {
			Notice::Loading => {
				overlay.loader.set_text_content(Some(&notice.to_string()));
				overlay.loader.set_hidden(false);
				overlay.notice.set_hidden(true);
			}
			Notice::Waiting { .. } => {
				overlay.loader.set_hidden(true);
				overlay.notice.set_text_content(Some(&notice.to_string()));
				overlay.notice.set_hidden(false);
			}
			Notice::Countdown { .. } => {
				overlay.loader.set_hidden(true);
				overlay.notice.set_text_content(Some(&notice.to_string()));
				let button = document.create_element("button")?;
				button.set_attribute("type", "button")?;
				button.set_text_content(Some("Continue now"));
				listeners.push(Listener::new(&button, "click", move |_event: Event| {
					let Some(core) = core.upgrade() else {
						return;
					};
					core.dispatch(|controller| {
						if let Some(ticket) = controller.active_ticket() {
							controller.continue_now(ticket);
						}
					});
				})?);
				overlay.notice.append_child(&button)?;
				overlay.notice.set_hidden(false);
			}
		}

		if let Some(overlay) = self.overlay.as_mut() {
			let previous = std::mem::replace(&mut overlay.notice_listeners, listeners);
			self.spent_listeners.extend(previous);
		}
		Ok(())
	}

	fn try_show_inline(&mut self, surface: SurfaceId, html: &str) -> Result<(), JsValue> {
		let Some(frame) = self.frames.get(&surface) else {
			return Ok(());
		};
		let inline = self.document.create_element("iframe")?.dyn_into::<HtmlIFrameElement>().map_err(JsValue::from)?;
		inline.set_class_name("payframe-inline");
		inline.set_attribute("sandbox", INLINE_SANDBOX)?;
		inline.set_attribute("title", "Payment verification")?;
		inline.set_srcdoc(html);
		frame.element.set_hidden(true);

		let Some(overlay) = &self.overlay else {
			return Ok(());
		};
		overlay.loader.set_hidden(true);
		overlay.body.append_child(&inline)?;
		if let Some(window) = inline.content_window() {
			self.sources.trust(surface, window.into());
		}
		if let Some(frame) = self.frames.get_mut(&surface) {
			if let Some(previous) = frame.inline.replace(inline) {
				previous.remove();
			}
		}
		Ok(())
	}

	fn try_navigate(&self, target: NavigationTarget, url: &str) -> Result<(), JsValue> {
		if target == NavigationTarget::Top {
			if let Some(top) = self.window.top().ok().flatten() {
				if top.location().set_href(url).is_ok() {
					return Ok(());
				}
				debug!(target = "payframe.web", "top-level context not navigable, using current");
			}
		}
		self.window.location().set_href(url)
	}
}

fn request_close(core: &Weak<Core>) {
	let Some(core) = core.upgrade() else {
		return;
	};
	core.dispatch(|controller| {
		if let Some(ticket) = controller.active_ticket() {
			controller.close(ticket);
		}
	});
}

/// Returns `true` for user agents of phones and small tablets.
pub(crate) fn is_mobile_agent(user_agent: &str) -> bool {
	MOBILE_UA_RE.is_match(user_agent)
}

fn css_px(value: Result<JsValue, JsValue>) -> u32 {
	value
		.ok()
		.and_then(|value| value.as_f64())
		.filter(|px| px.is_finite() && *px > 0.0)
		.map_or(0, |px| px as u32)
}

fn timeout_millis(after: Duration) -> i32 {
	i32::try_from(after.as_millis()).unwrap_or(i32::MAX)
}

fn describe(err: &JsValue) -> String {
	err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

impl Surfaces for DomHost {
	fn environment(&self) -> Environment {
		let user_agent = self.window.navigator().user_agent().unwrap_or_default();
		let screen = self
			.window
			.screen()
			.ok()
			.map(|screen| Dimensions {
				width: screen.width().ok().and_then(|w| u32::try_from(w).ok()).unwrap_or(0),
				height: screen.height().ok().and_then(|h| u32::try_from(h).ok()).unwrap_or(0),
			})
			.unwrap_or_default();
		Environment {
			device_class: if is_mobile_agent(&user_agent) {
				DeviceClass::Mobile
			} else {
				DeviceClass::Desktop
			},
			viewport: Dimensions {
				width: css_px(self.window.inner_width()),
				height: css_px(self.window.inner_height()),
			},
			screen,
		}
	}

	fn mount_frame(&mut self, spec: &FrameSpec) -> Result<SurfaceId, HostError> {
		self.try_mount_frame(spec).map_err(|err| HostError(describe(&err)))
	}

	fn reveal(&mut self, surface: SurfaceId) {
		if let Some(overlay) = &self.overlay {
			overlay.loader.set_hidden(true);
		}
		if let Some(frame) = self.frames.get(&surface) {
			frame.element.set_hidden(false);
		}
	}

	fn open_window(&mut self, spec: &WindowSpec) -> Option<SurfaceId> {
		let opened = match spec.features {
			Some(features) => self
				.window
				.open_with_url_and_target_and_features(&spec.url, spec.target, &features.to_feature_string()),
			None => self.window.open_with_url_and_target(&spec.url, spec.target),
		};
		match opened {
			Ok(Some(window)) => {
				let surface = self.allocate();
				self.sources.trust(surface, window.clone().into());
				self.windows.insert(surface, window);
				Some(surface)
			}
			Ok(None) => None,
			Err(err) => {
				debug!(target = "payframe.web", error = %describe(&err), "window.open threw");
				None
			}
		}
	}

	fn probe_window(&mut self, surface: SurfaceId) -> WindowProbe {
		let Some(window) = self.windows.get(&surface) else {
			return WindowProbe::closed();
		};
		if window.closed().unwrap_or(true) {
			return WindowProbe::closed();
		}
		// Throws until the window is back on our origin.
		match window.location().href() {
			Ok(href) => WindowProbe::at(href),
			Err(_) => WindowProbe::open(),
		}
	}

	fn resize_frame(&mut self, surface: SurfaceId, height: FrameHeight) {
		let Some(frame) = self.frames.get(&surface) else {
			return;
		};
		let style = frame.element.style();
		let result = match height {
			FrameHeight::Exact(px) => style.set_property("height", &format!("{px}px")),
			FrameHeight::AtLeast(px) => style
				.set_property("min-height", &format!("{px}px"))
				.and_then(|()| style.set_property("height", "auto")),
		};
		if let Err(err) = result {
			warn!(target = "payframe.web", %surface, error = %describe(&err), "resize failed");
		}
	}

	fn show_inline(&mut self, surface: SurfaceId, html: &str) {
		if let Err(err) = self.try_show_inline(surface, html) {
			warn!(target = "payframe.web", %surface, error = %describe(&err), "inline content not shown");
		}
	}

	fn show_notice(&mut self, notice: &Notice) {
		if let Err(err) = self.try_show_notice(notice) {
			warn!(target = "payframe.web", error = %describe(&err), "notice not shown");
		}
	}

	fn navigate(&mut self, target: NavigationTarget, url: &str) {
		if let Err(err) = self.try_navigate(target, url) {
			warn!(target = "payframe.web", %url, error = %describe(&err), "navigation failed");
		}
	}

	fn release(&mut self, surface: SurfaceId) {
		self.sources.forget(surface);
		if let Some(frame) = self.frames.remove(&surface) {
			frame.element.remove();
			if let Some(inline) = frame.inline {
				inline.remove();
			}
			self.spent_listeners.extend(frame.listeners);
		}
		if let Some(window) = self.windows.remove(&surface) {
			if !window.closed().unwrap_or(true) {
				let _ = window.close();
			}
		}
	}

	fn dismiss(&mut self) {
		if let Some(overlay) = self.overlay.take() {
			overlay.root.remove();
			self.spent_listeners.extend(overlay.listeners);
			self.spent_listeners.extend(overlay.notice_listeners);
		}
		if let Err(err) = self.restore_scroll() {
			warn!(target = "payframe.web", error = %describe(&err), "scroll state not restored");
		}
	}
}

impl Scheduler for DomHost {
	fn schedule(&mut self, timer: TimerId, after: Duration) {
		let core = self.core.clone();
		let callback = Closure::<dyn FnMut()>::new(move || {
			let Some(core) = core.upgrade() else {
				return;
			};
			core.dispatch(|controller| {
				controller.host_mut().retire_timer(timer);
				controller.on_timer(timer);
			});
		});
		match self
			.window
			.set_timeout_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), timeout_millis(after))
		{
			Ok(handle) => {
				self.timers.insert(timer, Timeout { handle, callback });
			}
			Err(err) => warn!(target = "payframe.web", %timer, error = %describe(&err), "setTimeout failed"),
		}
	}

	fn cancel(&mut self, timer: TimerId) {
		if let Some(timeout) = self.timers.remove(&timer) {
			self.window.clear_timeout_with_handle(timeout.handle);
			self.spent_timers.push(timeout);
		}
	}
}
