//! Session controller: owns the single active-session slot and the
//! settlement path.
//!
//! Every input enters through a `&mut Controller` method: [`Controller::open`]
//! and the caller/user affordances, frame and message events tagged with the
//! session [`Ticket`], and timer expiries tagged with a [`TimerId`]. Events
//! that do not belong to the live session are dropped.
//!
//! Settlement always runs in this order: cancel armed timers, release the
//! surface, dismiss the overlay, invoke the outcome handler, then navigate if
//! the signal asked for it.

use std::collections::BTreeMap;
use std::time::Duration;

use payframe_protocol::{CancelReason, FrameContent, Outcome, Payload, RawMessage, SignalKind, SignalSource, Strategy};
use serde_json::json;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::channel::{self, Signal};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fallback::{BlockReason, LoadVerdict, exhausted_payload};
use crate::host::{FrameSpec, Host, NavigationTarget, Notice, ScrollLock, TimerId, TimerKind, WindowFeatures, WindowSpec};
use crate::policy::PresentationPolicy;
use crate::session::{Phase, Session, SessionState, Ticket};

/// Permissions policy granted to the embedded frame.
const FRAME_PERMISSIONS: &str = "payment";
/// Window name reused by popups so a second open replaces the first.
const POPUP_TARGET: &str = "payframe_popup";
const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

/// Timers that belong to one presentation attempt rather than the session.
const ATTEMPT_TIMERS: [TimerKind; 4] = [TimerKind::FrameLoad, TimerKind::Grace, TimerKind::Poll, TimerKind::Countdown];

/// Adapts separate per-outcome closures to the single outcome handler.
///
/// Timed-out sessions are reported through `on_cancelled` with
/// [`CancelReason::TimedOut`].
#[derive(Default)]
pub struct Callbacks {
	on_success: Option<Box<dyn FnOnce(Payload)>>,
	on_failure: Option<Box<dyn FnOnce(Payload)>>,
	on_cancelled: Option<Box<dyn FnOnce(CancelReason)>>,
}

impl Callbacks {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn on_success(mut self, callback: impl FnOnce(Payload) + 'static) -> Self {
		self.on_success = Some(Box::new(callback));
		self
	}

	pub fn on_failure(mut self, callback: impl FnOnce(Payload) + 'static) -> Self {
		self.on_failure = Some(Box::new(callback));
		self
	}

	pub fn on_cancelled(mut self, callback: impl FnOnce(CancelReason) + 'static) -> Self {
		self.on_cancelled = Some(Box::new(callback));
		self
	}

	/// Invokes the closure matching `outcome`, if one was registered.
	pub fn dispatch(self, outcome: Outcome) {
		match outcome {
			Outcome::Success { payload } => {
				if let Some(callback) = self.on_success {
					callback(payload);
				}
			}
			Outcome::Failure { payload } => {
				if let Some(callback) = self.on_failure {
					callback(payload);
				}
			}
			Outcome::Cancelled { reason } => {
				if let Some(callback) = self.on_cancelled {
					callback(reason);
				}
			}
		}
	}

	pub fn into_handler(self) -> impl FnOnce(Outcome) + 'static {
		move |outcome| self.dispatch(outcome)
	}
}

/// Hosted-payment session controller over a [`Host`].
pub struct Controller<H: Host> {
	config: Config,
	policy: PresentationPolicy,
	host: H,
	session: Option<Session>,
	generation: u64,
	last: SessionState,
}

impl<H: Host> Controller<H> {
	/// Validates `config` and compiles its host patterns.
	pub fn new(config: Config, host: H) -> Result<Self> {
		config.validate()?;
		let policy = PresentationPolicy::from_config(&config)?;
		Ok(Self {
			config,
			policy,
			host,
			session: None,
			generation: 0,
			last: SessionState::Idle,
		})
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn policy(&self) -> &PresentationPolicy {
		&self.policy
	}

	/// Mutable policy access, e.g. to extend framing-denied hosts at runtime.
	pub fn policy_mut(&mut self) -> &mut PresentationPolicy {
		&mut self.policy
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}

	pub fn into_host(self) -> H {
		self.host
	}

	pub fn state(&self) -> SessionState {
		self.session.as_ref().map_or(self.last, |session| session.state)
	}

	pub fn active_ticket(&self) -> Option<Ticket> {
		self.session.as_ref().map(|session| session.ticket)
	}

	pub fn is_active(&self) -> bool {
		self.session.is_some()
	}

	/// Starts presenting `url`, settling any active session as superseded
	/// first. `on_outcome` runs exactly once, when the new session settles.
	///
	/// Returns an error without touching the active session when `url` is
	/// empty or not an absolute URL with a host.
	pub fn open(&mut self, url: &str, on_outcome: impl FnOnce(Outcome) + 'static) -> Result<Ticket> {
		let target = parse_target(url)?;

		if self.session.is_some() {
			self.settle(Outcome::cancelled(CancelReason::Superseded), None);
		}

		self.generation += 1;
		let ticket = Ticket::new(self.generation);
		let environment = self.host.environment();
		let device = self.config.device_class.unwrap_or(environment.device_class);
		let mut session = Session::new(ticket, target, device, environment, Box::new(on_outcome));

		let timeout = session.arm(TimerKind::SessionTimeout);
		self.host.schedule(timeout, self.config.session_timeout());
		info!(
			target = "payframe.session",
			%ticket,
			url = session.target.as_str(),
			%device,
			"session opened"
		);
		self.session = Some(session);
		self.present(None);
		Ok(ticket)
	}

	/// Caller-initiated cancellation. Returns `false` when nothing was active.
	pub fn cancel(&mut self) -> bool {
		if self.session.is_none() {
			return false;
		}
		self.settle(Outcome::cancelled(CancelReason::Requested), None);
		true
	}

	/// User close affordance for the session identified by `ticket`.
	///
	/// Ignored when closing is disabled or the ticket is stale.
	pub fn close(&mut self, ticket: Ticket) -> bool {
		if !self.config.allow_close {
			debug!(target = "payframe.session", %ticket, "close disabled by configuration");
			return false;
		}
		if current(&mut self.session, ticket).is_none() {
			return false;
		}
		self.settle(Outcome::cancelled(CancelReason::UserClosed), None);
		true
	}

	/// Skips the remaining full-navigation countdown.
	pub fn continue_now(&mut self, ticket: Ticket) {
		let Some(session) = current(&mut self.session, ticket) else {
			return;
		};
		if matches!(session.phase, Phase::Countdown { .. }) {
			self.hand_off();
		}
	}

	/// Load event of the embedded frame, with what the host could observe.
	pub fn on_frame_load(&mut self, ticket: Ticket, content: FrameContent) {
		let Some(session) = current(&mut self.session, ticket) else {
			trace!(target = "payframe.session", %ticket, "stale frame load");
			return;
		};
		let Some(surface) = session.surface.filter(|_| session.strategy == Strategy::Embedded) else {
			return;
		};

		match (session.phase, LoadVerdict::from_content(content)) {
			(Phase::Loading | Phase::Suspect, LoadVerdict::Ready) => {
				for timer in session.disarm_kinds(&[TimerKind::FrameLoad, TimerKind::Grace]) {
					self.host.cancel(timer);
				}
				session.phase = Phase::Ready;
				self.host.reveal(surface);
				debug!(target = "payframe.session", %ticket, ?content, "frame ready");
			}
			(Phase::Loading, LoadVerdict::Suspect) => {
				for timer in session.disarm_kinds(&[TimerKind::FrameLoad]) {
					self.host.cancel(timer);
				}
				session.phase = Phase::Suspect;
				let grace = session.arm(TimerKind::Grace);
				self.host.schedule(grace, self.config.grace_period());
				debug!(target = "payframe.session", %ticket, "frame loaded empty, waiting out grace period");
			}
			(phase, verdict) => {
				trace!(target = "payframe.session", %ticket, ?phase, ?verdict, "frame load ignored");
			}
		}
	}

	/// Explicit error event on the embedded frame.
	pub fn on_frame_error(&mut self, ticket: Ticket) {
		let Some(session) = current(&mut self.session, ticket) else {
			return;
		};
		if session.strategy == Strategy::Embedded && session.surface.is_some() && session.phase != Phase::Inline {
			self.block(BlockReason::FrameError);
		}
	}

	/// Cross-context message received while `ticket` was live.
	pub fn on_message(&mut self, ticket: Ticket, raw: RawMessage) {
		let Some(session) = current(&mut self.session, ticket) else {
			trace!(target = "payframe.channel", %ticket, "message for stale session dropped");
			return;
		};
		if session.strategy == Strategy::FullNavigation {
			return;
		}
		let framed = session.surface.filter(|_| session.strategy == Strategy::Embedded);

		let signal = channel::classify_message(&raw);
		debug!(target = "payframe.channel", %ticket, kind = %signal.kind(), "message classified");

		match signal {
			Signal::Unrecognized { reason } => {
				debug!(target = "payframe.channel", %ticket, reason, "message dropped");
			}
			Signal::Resize { height } => {
				let Some(surface) = framed.filter(|_| self.config.auto_resize) else {
					return;
				};
				let height = channel::frame_height(height, session.device, &self.config, session.environment.viewport);
				self.host.resize_frame(surface, height);
			}
			Signal::OtpInline { html } => {
				let Some(surface) = framed else {
					return;
				};
				for timer in session.disarm_kinds(&[TimerKind::FrameLoad, TimerKind::Grace]) {
					self.host.cancel(timer);
				}
				session.phase = Phase::Inline;
				self.host.show_inline(surface, &html);
			}
			Signal::OtpRedirect { url } => {
				self.settle(Outcome::cancelled(CancelReason::HandedOff { url: url.clone() }), Some((NavigationTarget::Top, url)));
			}
			Signal::Redirect { url, data } => {
				let payload = Payload::new(SignalSource::Message, data).with_redirect(Some(url.clone()));
				let target = self.redirect_target();
				self.settle(Outcome::success(payload), Some((target, url)));
			}
			Signal::Success { data, url } => {
				let navigation = url.clone().map(|url| (self.redirect_target(), url));
				self.settle(Outcome::success(Payload::new(SignalSource::Message, data).with_redirect(url)), navigation);
			}
			Signal::Failure { data, url } => {
				let navigation = url.clone().map(|url| (self.redirect_target(), url));
				self.settle(Outcome::failure(Payload::new(SignalSource::Message, data).with_redirect(url)), navigation);
			}
			Signal::Cancelled { data, url } => {
				let navigation = url.clone().filter(|_| self.config.navigate_on_cancel).map(|url| (self.redirect_target(), url));
				let payload = Payload::new(SignalSource::Message, data).with_redirect(url);
				self.settle(Outcome::cancelled(CancelReason::GatewayCancelled { payload }), navigation);
			}
		}
	}

	/// Timer expiry delivered by the host scheduler.
	pub fn on_timer(&mut self, timer: TimerId) {
		let Some(session) = self.session.as_mut().filter(|session| session.ticket.owns(timer)) else {
			trace!(target = "payframe.session", %timer, "timer for stale session ignored");
			return;
		};
		if !session.disarm(timer) {
			trace!(target = "payframe.session", %timer, "timer no longer armed");
			return;
		}

		match timer.kind {
			TimerKind::FrameLoad if session.phase == Phase::Loading => self.block(BlockReason::LoadTimeout),
			TimerKind::Grace if session.phase == Phase::Suspect => self.block(BlockReason::EmptyFrame),
			TimerKind::Poll => self.poll_window(),
			TimerKind::Countdown => self.tick_countdown(),
			TimerKind::SessionTimeout => {
				let after = self.config.session_timeout();
				warn!(target = "payframe.session", ticket = %session.ticket, ?after, "session timed out");
				self.settle(Outcome::cancelled(CancelReason::TimedOut { after }), None);
			}
			kind => trace!(target = "payframe.session", ?kind, "timer fired in unrelated phase"),
		}
	}

	fn redirect_target(&self) -> NavigationTarget {
		if self.config.force_top_level_redirect {
			NavigationTarget::Top
		} else {
			NavigationTarget::Current
		}
	}

	/// Runs the policy and presents the chosen strategy, falling through
	/// blocked attempts until one presents or nothing is left.
	fn present(&mut self, last_block: Option<BlockReason>) {
		let Some(session) = self.session.as_mut() else {
			return;
		};
		let Some(strategy) = self.policy.choose_strategy(&session.target, session.device, &session.excluded) else {
			let payload = exhausted_payload(&session.excluded, last_block.as_ref());
			warn!(target = "payframe.session", ticket = %session.ticket, attempted = ?session.excluded, "every strategy blocked");
			self.settle(Outcome::failure(payload), None);
			return;
		};

		session.strategy = strategy;
		session.state = SessionState::Presenting(strategy);
		info!(target = "payframe.session", ticket = %session.ticket, %strategy, "presenting");

		let attempt = match strategy {
			Strategy::Embedded => self.present_frame(),
			Strategy::Popup | Strategy::NewTab => self.present_window(strategy),
			Strategy::FullNavigation => {
				self.start_countdown();
				Ok(())
			}
		};
		if let Err(reason) = attempt {
			self.block(reason);
		}
	}

	fn present_frame(&mut self) -> Result<(), BlockReason> {
		let Self { config, host, session, .. } = self;
		let Some(session) = session.as_mut() else {
			return Ok(());
		};
		let spec = FrameSpec {
			url: framed_url(&session.target, &config.embedded_query),
			sandbox: config.sandbox.join(" "),
			allow: FRAME_PERMISSIONS,
			lock_scroll: ScrollLock::for_device(session.device),
		};
		host.show_notice(&Notice::Loading);
		let surface = host.mount_frame(&spec).map_err(|err| BlockReason::MountRejected(err.0))?;
		session.surface = Some(surface);
		session.phase = Phase::Loading;
		let timer = session.arm(TimerKind::FrameLoad);
		host.schedule(timer, config.frame_load_timeout());
		debug!(target = "payframe.session", ticket = %session.ticket, %surface, "frame mounted");
		Ok(())
	}

	fn present_window(&mut self, strategy: Strategy) -> Result<(), BlockReason> {
		let Self {
			config, policy, host, session, ..
		} = self;
		let Some(session) = session.as_mut() else {
			return Ok(());
		};
		let spec = match strategy {
			Strategy::Popup => WindowSpec {
				url: session.target.to_string(),
				target: POPUP_TARGET,
				features: Some(WindowFeatures::popup(
					session.device,
					session.environment.screen,
					config.popup_width,
					config.popup_height,
				)),
			},
			_ => WindowSpec {
				url: session.target.to_string(),
				target: "_blank",
				features: None,
			},
		};
		let surface = host.open_window(&spec).ok_or(BlockReason::WindowRefused)?;
		session.surface = Some(surface);
		session.phase = Phase::Monitoring;
		host.show_notice(&Notice::Waiting {
			gateway: policy.gateway_label(&session.target).to_string(),
			strategy,
		});
		let timer = session.arm(TimerKind::Poll);
		host.schedule(timer, config.poll_interval());
		debug!(target = "payframe.session", ticket = %session.ticket, %surface, %strategy, "window opened");
		Ok(())
	}

	fn start_countdown(&mut self) {
		let seconds = self.config.countdown_seconds();
		if seconds == 0 {
			self.hand_off();
			return;
		}
		let Self {
			policy, host, session, ..
		} = self;
		let Some(session) = session.as_mut() else {
			return;
		};
		session.phase = Phase::Countdown { remaining: seconds };
		host.show_notice(&Notice::Countdown {
			gateway: policy.gateway_label(&session.target).to_string(),
			seconds,
			url: session.target.to_string(),
		});
		let timer = session.arm(TimerKind::Countdown);
		host.schedule(timer, COUNTDOWN_STEP);
	}

	fn tick_countdown(&mut self) {
		let Some(session) = self.session.as_mut() else {
			return;
		};
		let Phase::Countdown { remaining } = session.phase else {
			return;
		};
		let remaining = remaining.saturating_sub(1);
		if remaining == 0 {
			self.hand_off();
			return;
		}
		session.phase = Phase::Countdown { remaining };
		self.host.show_notice(&Notice::Countdown {
			gateway: self.policy.gateway_label(&session.target).to_string(),
			seconds: remaining,
			url: session.target.to_string(),
		});
		let timer = session.arm(TimerKind::Countdown);
		self.host.schedule(timer, COUNTDOWN_STEP);
	}

	fn hand_off(&mut self) {
		let Some(session) = self.session.as_ref() else {
			return;
		};
		let url = session.target.to_string();
		self.settle(
			Outcome::cancelled(CancelReason::HandedOff { url: url.clone() }),
			Some((NavigationTarget::Current, url)),
		);
	}

	fn poll_window(&mut self) {
		let Some(session) = self.session.as_mut() else {
			return;
		};
		let Some(surface) = session.surface else {
			return;
		};
		let probe = self.host.probe_window(surface);

		let outcome = if probe.closed {
			Some(Outcome::cancelled(CancelReason::WindowClosed))
		} else {
			probe.location.as_deref().and_then(|location| {
				let kind = channel::classify_location(location, &self.config.location_markers)?;
				let payload = Payload::new(SignalSource::WindowLocation, json!({ "location": location }));
				match kind {
					SignalKind::Success => Some(Outcome::success(payload)),
					SignalKind::Failure => Some(Outcome::failure(payload)),
					SignalKind::Cancelled => Some(Outcome::cancelled(CancelReason::GatewayCancelled { payload })),
					_ => None,
				}
			})
		};

		if let Some(outcome) = outcome {
			debug!(target = "payframe.channel", %surface, kind = %outcome.kind(), "window probe settled session");
			self.settle(outcome, None);
			return;
		}
		let timer = session.arm(TimerKind::Poll);
		self.host.schedule(timer, self.config.poll_interval());
	}

	/// Tears down the current attempt, excludes its strategy and re-runs the policy.
	fn block(&mut self, reason: BlockReason) {
		let Some(session) = self.session.as_mut() else {
			return;
		};
		let strategy = session.strategy;
		session.state = SessionState::Blocked(strategy);
		warn!(target = "payframe.session", ticket = %session.ticket, %strategy, %reason, "presentation blocked");

		for timer in session.disarm_kinds(&ATTEMPT_TIMERS) {
			self.host.cancel(timer);
		}
		if let Some(surface) = session.surface.take() {
			self.host.release(surface);
		}
		if !session.excluded.contains(&strategy) {
			session.excluded.push(strategy);
		}
		self.present(Some(reason));
	}

	fn settle(&mut self, outcome: Outcome, navigation: Option<(NavigationTarget, String)>) {
		let Some(mut session) = self.session.take() else {
			return;
		};
		for timer in session.drain_timers() {
			self.host.cancel(timer);
		}
		if let Some(surface) = session.surface.take() {
			self.host.release(surface);
		}
		self.host.dismiss();

		let kind = outcome.kind();
		self.last = SessionState::Settled(kind);
		info!(
			target = "payframe.session",
			ticket = %session.ticket,
			strategy = %session.strategy,
			outcome = %kind,
			reason = outcome.cancel_reason().map(CancelReason::as_str),
			"session settled"
		);

		if let Some(handler) = session.take_handler() {
			handler(outcome);
		}
		if let Some((target, url)) = navigation {
			info!(target = "payframe.session", destination = ?target, %url, "navigating");
			self.host.navigate(target, &url);
		}
	}
}

fn current(slot: &mut Option<Session>, ticket: Ticket) -> Option<&mut Session> {
	slot.as_mut().filter(|session| session.ticket == ticket)
}

fn parse_target(url: &str) -> Result<Url> {
	let trimmed = url.trim();
	if trimmed.is_empty() {
		return Err(Error::EmptyTargetUrl);
	}
	let target = Url::parse(trimmed).map_err(|source| Error::InvalidTargetUrl {
		url: trimmed.to_string(),
		source,
	})?;
	if target.host_str().is_none_or(str::is_empty) {
		return Err(Error::MissingHost(trimmed.to_string()));
	}
	Ok(target)
}

fn framed_url(target: &Url, extra: &BTreeMap<String, String>) -> String {
	if extra.is_empty() {
		return target.to_string();
	}
	let mut url = target.clone();
	url.query_pairs_mut().extend_pairs(extra);
	url.to_string()
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use payframe_protocol::{DeviceClass, OutcomeKind};

	use super::*;
	use crate::host::fake::{FakeHost, FakeHostBuilder, FakeHostHandle, HostCall};
	use crate::host::{Dimensions, Environment, FrameHeight, SurfaceId};

	const TARGET: &str = "https://pay.example/s/abc";

	type Outcomes = Rc<RefCell<Vec<Outcome>>>;

	fn recorder() -> (Outcomes, impl FnOnce(Outcome) + 'static) {
		let outcomes = Rc::new(RefCell::new(Vec::new()));
		let sink = Rc::clone(&outcomes);
		(outcomes, move |outcome| sink.borrow_mut().push(outcome))
	}

	fn setup(config: Config) -> (Controller<FakeHost>, FakeHostHandle) {
		setup_with(config, FakeHostBuilder::new())
	}

	fn setup_with(config: Config, builder: FakeHostBuilder) -> (Controller<FakeHost>, FakeHostHandle) {
		let (host, handle) = builder.build();
		(Controller::new(config, host).unwrap(), handle)
	}

	fn fire(controller: &mut Controller<FakeHost>, handle: &FakeHostHandle, kind: TimerKind) {
		let timer = handle.fire(kind).unwrap_or_else(|| panic!("no {kind:?} timer armed"));
		controller.on_timer(timer);
	}

	fn mounted(handle: &FakeHostHandle) -> usize {
		handle.calls().iter().filter(|call| matches!(call, HostCall::MountFrame(_))).count()
	}

	fn windows(handle: &FakeHostHandle) -> Vec<WindowSpec> {
		handle
			.calls()
			.into_iter()
			.filter_map(|call| match call {
				HostCall::OpenWindow(spec, _) => Some(spec),
				_ => None,
			})
			.collect()
	}

	fn mobile() -> Environment {
		Environment {
			device_class: DeviceClass::Mobile,
			viewport: Dimensions { width: 390, height: 844 },
			screen: Dimensions { width: 390, height: 844 },
		}
	}

	#[test]
	fn exactly_one_outcome_per_open() {
		let (mut controller, _handle) = setup(Config::default());
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		controller.on_frame_load(ticket, FrameContent::Opaque);
		controller.on_message(ticket, json!({"status": "success", "tran_id": "T1"}).into());
		controller.on_message(ticket, json!({"status": "failed"}).into());
		assert!(!controller.cancel());
		controller.close(ticket);

		let outcomes = outcomes.borrow();
		assert_eq!(outcomes.len(), 1);
		assert_eq!(outcomes[0].kind(), OutcomeKind::Success);
		assert_eq!(controller.state(), SessionState::Settled(OutcomeKind::Success));
		assert!(!controller.is_active());
	}

	#[test]
	fn open_while_active_supersedes_before_presenting() {
		let (mut controller, handle) = setup(Config::default());
		let first_outcomes = Rc::new(RefCell::new(Vec::new()));
		let sink = Rc::clone(&first_outcomes);
		let observer = handle.clone();
		let first = controller
			.open(TARGET, move |outcome| sink.borrow_mut().push((outcome, observer.calls().len())))
			.unwrap();

		let (second_outcomes, handler) = recorder();
		let second = controller.open("https://pay.example/s/def", handler).unwrap();
		assert_ne!(first, second);

		let first_outcomes = first_outcomes.borrow();
		assert_eq!(first_outcomes.len(), 1);
		assert_eq!(first_outcomes[0].0.cancel_reason(), Some(&CancelReason::Superseded));

		let calls = handle.calls();
		let second_mount = calls
			.iter()
			.rposition(|call| matches!(call, HostCall::MountFrame(spec) if spec.url.ends_with("/def")))
			.unwrap();
		assert!(first_outcomes[0].1 <= second_mount);
		assert_eq!(calls[..second_mount].iter().filter(|call| matches!(call, HostCall::Dismiss)).count(), 1);
		assert!(second_outcomes.borrow().is_empty());
		assert_eq!(controller.state(), SessionState::Presenting(Strategy::Embedded));
		assert_eq!(controller.active_ticket(), Some(second));
	}

	#[test]
	fn success_with_url_settles_then_navigates_top() {
		let (mut controller, handle) = setup(Config::default());
		let navigations_at_callback = Rc::new(RefCell::new(None));
		let sink = Rc::clone(&navigations_at_callback);
		let observer = handle.clone();
		let ticket = controller
			.open(TARGET, move |outcome| {
				*sink.borrow_mut() = Some((outcome.kind(), observer.navigations().len()));
			})
			.unwrap();

		controller.on_message(ticket, json!({"status": "success", "url": "https://shop.example/thanks"}).into());

		assert_eq!(*navigations_at_callback.borrow(), Some((OutcomeKind::Success, 0)));
		assert_eq!(handle.navigations(), vec![(NavigationTarget::Top, "https://shop.example/thanks".to_string())]);
	}

	#[test]
	fn redirect_without_force_navigates_current_context() {
		let config = Config {
			force_top_level_redirect: false,
			..Config::default()
		};
		let (mut controller, handle) = setup(config);
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		controller.on_message(ticket, json!({"type": "redirect", "url": "https://shop.example/next"}).into());

		let outcomes = outcomes.borrow();
		let Outcome::Success { payload } = &outcomes[0] else {
			panic!("expected success, got {:?}", outcomes[0]);
		};
		assert_eq!(payload.redirect_url.as_deref(), Some("https://shop.example/next"));
		assert_eq!(handle.navigations(), vec![(NavigationTarget::Current, "https://shop.example/next".to_string())]);
	}

	#[test]
	fn otp_redirect_always_navigates_top() {
		for force in [true, false] {
			let config = Config {
				force_top_level_redirect: force,
				framing_denied_hosts: vec!["pay.example".to_string()],
				..Config::default()
			};
			let (mut controller, handle) = setup(config);
			let (outcomes, handler) = recorder();
			let ticket = controller.open(TARGET, handler).unwrap();
			assert_eq!(controller.state(), SessionState::Presenting(Strategy::Popup));

			controller.on_message(ticket, json!({"type": "otp_redirect", "otp_url": "https://acs.bank.example/otp"}).into());

			assert_eq!(
				outcomes.borrow()[0].cancel_reason(),
				Some(&CancelReason::HandedOff {
					url: "https://acs.bank.example/otp".to_string()
				})
			);
			assert_eq!(handle.navigations(), vec![(NavigationTarget::Top, "https://acs.bank.example/otp".to_string())]);
		}
	}

	#[test]
	fn denied_host_opens_popup_without_embedded_attempt() {
		let config = Config {
			framing_denied_hosts: vec!["pay.example".to_string()],
			..Config::default()
		};
		let (mut controller, handle) = setup(config);
		let (_outcomes, handler) = recorder();
		controller.open(TARGET, handler).unwrap();

		assert_eq!(controller.state(), SessionState::Presenting(Strategy::Popup));
		assert_eq!(mounted(&handle), 0);
		let windows = windows(&handle);
		assert_eq!(windows.len(), 1);
		assert_eq!(windows[0].target, POPUP_TARGET);
		assert_eq!(windows[0].features.map(|f| (f.width, f.height)), Some((600, 700)));
		assert!(handle.armed_of(TimerKind::Poll).is_some());
	}

	#[test]
	fn resize_clamps_per_device_class() {
		let config = Config {
			max_frame_height: Some(900),
			..Config::default()
		};
		let (mut controller, handle) = setup(config.clone());
		let (_outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		controller.on_message(ticket, json!({"type": "resize", "height": 120}).into());
		controller.on_message(ticket, json!({"type": "resize", "height": 2400}).into());
		let resizes: Vec<_> = handle.calls().into_iter().filter(|call| matches!(call, HostCall::Resize(..))).collect();
		assert_eq!(
			resizes,
			vec![
				HostCall::Resize(SurfaceId(1), FrameHeight::Exact(400)),
				HostCall::Resize(SurfaceId(1), FrameHeight::Exact(900)),
			]
		);

		let (mut controller, handle) = setup_with(config, FakeHostBuilder::new().environment(mobile()));
		let (_outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		controller.on_message(ticket, json!({"type": "resize", "height": 120}).into());
		controller.on_message(ticket, json!({"type": "resize", "height": 2400}).into());
		let resizes: Vec<_> = handle.calls().into_iter().filter(|call| matches!(call, HostCall::Resize(..))).collect();
		assert_eq!(
			resizes,
			vec![
				HostCall::Resize(SurfaceId(1), FrameHeight::AtLeast(400)),
				HostCall::Resize(SurfaceId(1), FrameHeight::AtLeast(2400)),
			]
		);
	}

	#[test]
	fn resize_is_ignored_when_auto_resize_is_off() {
		let config = Config {
			auto_resize: false,
			..Config::default()
		};
		let (mut controller, handle) = setup(config);
		let (_outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		controller.on_message(ticket, json!({"type": "resize", "height": 600}).into());
		assert!(!handle.calls().iter().any(|call| matches!(call, HostCall::Resize(..))));
	}

	#[test]
	fn embedded_session_times_out_without_terminal_signal() {
		let (mut controller, handle) = setup(Config::default());
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		assert_eq!(controller.state(), SessionState::Presenting(Strategy::Embedded));

		controller.on_frame_load(ticket, FrameContent::NonEmpty);
		assert!(handle.calls().contains(&HostCall::Reveal(SurfaceId(1))));
		assert_eq!(handle.armed_of(TimerKind::FrameLoad), None);

		fire(&mut controller, &handle, TimerKind::SessionTimeout);

		let outcomes = outcomes.borrow();
		assert_eq!(outcomes.len(), 1);
		assert_eq!(
			outcomes[0].cancel_reason(),
			Some(&CancelReason::TimedOut {
				after: Duration::from_secs(900)
			})
		);
		assert_eq!(handle.released(), vec![SurfaceId(1)]);
		assert!(handle.armed().is_empty());
	}

	#[test]
	fn empty_frame_after_grace_falls_back_to_popup() {
		let (mut controller, handle) = setup(Config::default());
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();

		controller.on_frame_load(ticket, FrameContent::Empty);
		assert_eq!(controller.state(), SessionState::Presenting(Strategy::Embedded));
		assert!(handle.armed_of(TimerKind::Grace).is_some());

		fire(&mut controller, &handle, TimerKind::Grace);

		assert_eq!(controller.state(), SessionState::Presenting(Strategy::Popup));
		assert_eq!(handle.released(), vec![SurfaceId(1)]);
		assert_eq!(windows(&handle).len(), 1);
		assert!(outcomes.borrow().is_empty());
		assert!(handle.armed_of(TimerKind::SessionTimeout).is_some());
	}

	#[test]
	fn content_during_grace_cancels_fallback() {
		let (mut controller, handle) = setup(Config::default());
		let (_outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		controller.on_frame_load(ticket, FrameContent::Empty);
		let grace = handle.armed_of(TimerKind::Grace).unwrap();
		controller.on_frame_load(ticket, FrameContent::NonEmpty);

		assert!(handle.cancelled().contains(&grace));
		controller.on_timer(grace);
		assert_eq!(controller.state(), SessionState::Presenting(Strategy::Embedded));
		assert!(handle.released().is_empty());
	}

	#[test]
	fn missing_load_event_blocks_after_timeout() {
		let (mut controller, handle) = setup(Config::default());
		let (_outcomes, handler) = recorder();
		controller.open(TARGET, handler).unwrap();
		fire(&mut controller, &handle, TimerKind::FrameLoad);
		assert_eq!(controller.state(), SessionState::Presenting(Strategy::Popup));
	}

	#[test]
	fn frame_error_and_mount_rejection_block_immediately() {
		let (mut controller, handle) = setup(Config::default());
		let (_outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		controller.on_frame_error(ticket);
		assert_eq!(controller.state(), SessionState::Presenting(Strategy::Popup));
		assert_eq!(handle.released(), vec![SurfaceId(1)]);

		let (mut controller, _handle) = setup_with(Config::default(), FakeHostBuilder::new().reject_frames());
		let (_outcomes, handler) = recorder();
		controller.open(TARGET, handler).unwrap();
		assert_eq!(controller.state(), SessionState::Presenting(Strategy::Popup));
	}

	#[test]
	fn refused_windows_fall_through_to_countdown_then_hand_off() {
		let (mut controller, handle) = setup_with(Config::default(), FakeHostBuilder::new().refuse_windows());
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		controller.on_frame_error(ticket);

		assert_eq!(controller.state(), SessionState::Presenting(Strategy::FullNavigation));
		assert_eq!(windows(&handle).len(), 2);
		assert_eq!(windows(&handle)[1].target, "_blank");

		for _ in 0..3 {
			fire(&mut controller, &handle, TimerKind::Countdown);
		}

		let notices: Vec<u32> = handle
			.calls()
			.into_iter()
			.filter_map(|call| match call {
				HostCall::Notice(Notice::Countdown { seconds, .. }) => Some(seconds),
				_ => None,
			})
			.collect();
		assert_eq!(notices, vec![3, 2, 1]);
		assert_eq!(outcomes.borrow()[0].cancel_reason(), Some(&CancelReason::HandedOff { url: TARGET.to_string() }));
		assert_eq!(handle.navigations(), vec![(NavigationTarget::Current, TARGET.to_string())]);
	}

	#[test]
	fn continue_now_skips_countdown() {
		let config = Config {
			prefer_embedded: false,
			desktop_fallbacks: vec![Strategy::FullNavigation],
			..Config::default()
		};
		let (mut controller, handle) = setup(config);
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		controller.continue_now(ticket);
		assert_eq!(outcomes.borrow().len(), 1);
		assert_eq!(handle.navigations().len(), 1);
	}

	#[test]
	fn zero_redirect_delay_navigates_immediately() {
		let config = Config {
			redirect_delay_ms: 0,
			..Config::default()
		};
		let (mut controller, handle) = setup_with(config, FakeHostBuilder::new().environment(mobile()));
		controller.policy_mut().extend_denied(["pay.example"]).unwrap();
		let (outcomes, handler) = recorder();
		controller.open(TARGET, handler).unwrap();
		assert_eq!(outcomes.borrow()[0].kind(), OutcomeKind::Cancelled);
		assert_eq!(handle.navigations(), vec![(NavigationTarget::Current, TARGET.to_string())]);
	}

	#[test]
	fn messages_are_ignored_during_full_navigation() {
		let config = Config {
			prefer_embedded: false,
			desktop_fallbacks: Vec::new(),
			..Config::default()
		};
		let (mut controller, _handle) = setup(config);
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		controller.on_message(ticket, json!({"status": "success"}).into());
		assert!(outcomes.borrow().is_empty());
		assert_eq!(controller.state(), SessionState::Presenting(Strategy::FullNavigation));
	}

	#[test]
	fn closed_popup_cancels() {
		let config = Config {
			prefer_embedded: false,
			..Config::default()
		};
		let (mut controller, handle) = setup(config);
		let (outcomes, handler) = recorder();
		controller.open(TARGET, handler).unwrap();

		fire(&mut controller, &handle, TimerKind::Poll);
		assert!(outcomes.borrow().is_empty());
		handle.close_window(SurfaceId(1));
		fire(&mut controller, &handle, TimerKind::Poll);

		assert_eq!(outcomes.borrow()[0].cancel_reason(), Some(&CancelReason::WindowClosed));
		assert!(handle.navigations().is_empty());
	}

	#[test]
	fn popup_location_markers_settle() {
		let cases = [
			("https://shop.example/payment-success?tran=1", OutcomeKind::Success),
			("https://shop.example/checkout/cancel", OutcomeKind::Cancelled),
			("https://shop.example/payment-fail", OutcomeKind::Failure),
		];
		for (location, expected) in cases {
			let config = Config {
				prefer_embedded: false,
				..Config::default()
			};
			let (mut controller, handle) = setup(config);
			let (outcomes, handler) = recorder();
			controller.open(TARGET, handler).unwrap();
			handle.set_location(SurfaceId(1), location);
			fire(&mut controller, &handle, TimerKind::Poll);

			let outcomes = outcomes.borrow();
			assert_eq!(outcomes[0].kind(), expected, "{location}");
			if let Outcome::Success { payload } = &outcomes[0] {
				assert_eq!(payload.source, SignalSource::WindowLocation);
				assert_eq!(payload.data["location"], location);
			}
			assert_eq!(handle.released(), vec![SurfaceId(1)]);
		}
	}

	#[test]
	fn cancel_with_url_navigates_only_when_configured() {
		for navigate_on_cancel in [false, true] {
			let config = Config {
				navigate_on_cancel,
				..Config::default()
			};
			let (mut controller, handle) = setup(config);
			let (outcomes, handler) = recorder();
			let ticket = controller.open(TARGET, handler).unwrap();
			controller.on_message(ticket, json!({"status": "cancelled", "url": "https://shop.example/cart"}).into());

			assert!(matches!(
				outcomes.borrow()[0].cancel_reason(),
				Some(CancelReason::GatewayCancelled { .. })
			));
			assert_eq!(handle.navigations().len(), usize::from(navigate_on_cancel));
		}
	}

	#[test]
	fn timers_are_cancelled_before_the_outcome_handler_runs() {
		let (mut controller, handle) = setup(Config::default());
		let observed = Rc::new(RefCell::new(None));
		let sink = Rc::clone(&observed);
		let observer = handle.clone();
		let ticket = controller
			.open(TARGET, move |_| {
				*sink.borrow_mut() = Some((observer.armed().len(), observer.released().len()));
			})
			.unwrap();
		let stale = handle.armed_of(TimerKind::FrameLoad).unwrap();

		assert!(controller.cancel());
		assert_eq!(*observed.borrow(), Some((0, 1)));

		controller.on_timer(stale);
		controller.on_frame_load(ticket, FrameContent::Empty);
		assert_eq!(controller.state(), SessionState::Settled(OutcomeKind::Cancelled));
	}

	#[test]
	fn stale_events_do_not_reach_the_next_session() {
		let (mut controller, handle) = setup(Config::default());
		let (_first, handler) = recorder();
		let old = controller.open(TARGET, handler).unwrap();
		let old_load = handle.armed_of(TimerKind::FrameLoad).unwrap();
		let (second, handler) = recorder();
		controller.open(TARGET, handler).unwrap();

		controller.on_message(old, json!({"status": "success"}).into());
		controller.on_timer(old_load);
		controller.on_frame_error(old);

		assert!(second.borrow().is_empty());
		assert_eq!(controller.state(), SessionState::Presenting(Strategy::Embedded));
	}

	#[test]
	fn close_respects_configuration_and_ticket() {
		let (mut controller, _handle) = setup(Config::default());
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		assert!(!controller.close(Ticket::new(ticket.generation() + 1)));
		assert!(controller.close(ticket));
		assert_eq!(outcomes.borrow()[0].cancel_reason(), Some(&CancelReason::UserClosed));

		let config = Config {
			allow_close: false,
			..Config::default()
		};
		let (mut controller, _handle) = setup(config);
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		assert!(!controller.close(ticket));
		assert!(outcomes.borrow().is_empty());
		assert!(controller.cancel());
		assert_eq!(outcomes.borrow()[0].cancel_reason(), Some(&CancelReason::Requested));
	}

	#[test]
	fn invalid_url_leaves_active_session_alone() {
		let (mut controller, _handle) = setup(Config::default());
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();

		assert!(matches!(controller.open("   ", |_| {}), Err(Error::EmptyTargetUrl)));
		assert!(matches!(controller.open("not a url", |_| {}), Err(Error::InvalidTargetUrl { .. })));
		assert!(matches!(controller.open("about:blank", |_| {}), Err(Error::MissingHost(_))));

		assert!(outcomes.borrow().is_empty());
		assert_eq!(controller.active_ticket(), Some(ticket));
	}

	#[test]
	fn frame_spec_carries_sandbox_and_query() {
		let mut config = Config::default();
		config.embedded_query.insert("full".to_string(), "1".to_string());
		let (mut controller, handle) = setup(config);
		let (_outcomes, handler) = recorder();
		controller.open(TARGET, handler).unwrap();

		let spec = handle
			.calls()
			.into_iter()
			.find_map(|call| match call {
				HostCall::MountFrame(spec) => Some(spec),
				_ => None,
			})
			.unwrap();
		assert_eq!(spec.url, "https://pay.example/s/abc?full=1");
		assert_eq!(spec.sandbox, "allow-scripts allow-forms");
		assert_eq!(spec.lock_scroll, ScrollLock::Overflow);
	}

	#[test]
	fn inline_otp_replaces_frame_without_settling() {
		let (mut controller, handle) = setup(Config::default());
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		controller.on_message(ticket, json!({"type": "otp", "data": "<form id=otp></form>"}).into());

		assert!(handle.calls().contains(&HostCall::ShowInline(SurfaceId(1), "<form id=otp></form>".to_string())));
		assert_eq!(handle.armed_of(TimerKind::FrameLoad), None);
		controller.on_frame_error(ticket);
		assert_eq!(controller.state(), SessionState::Presenting(Strategy::Embedded));
		assert!(outcomes.borrow().is_empty());
	}

	#[test]
	fn unrecognized_messages_are_dropped() {
		let (mut controller, handle) = setup(Config::default());
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		let before = handle.calls().len();
		controller.on_message(ticket, RawMessage::from("{not json"));
		controller.on_message(ticket, json!({"source": "devtools"}).into());
		assert!(outcomes.borrow().is_empty());
		assert_eq!(handle.calls().len(), before);
	}

	#[test]
	fn failure_with_url_navigates_like_success() {
		let (mut controller, handle) = setup(Config::default());
		let (outcomes, handler) = recorder();
		let ticket = controller.open(TARGET, handler).unwrap();
		controller.on_message(ticket, RawMessage::from(r#"{"status":"failed","redirect_url":"https://shop.example/failed"}"#));
		assert_eq!(outcomes.borrow()[0].kind(), OutcomeKind::Failure);
		assert_eq!(handle.navigations(), vec![(NavigationTarget::Top, "https://shop.example/failed".to_string())]);
	}

	#[test]
	fn callbacks_route_timed_out_to_cancelled() {
		let seen = Rc::new(RefCell::new(Vec::new()));
		let (success, cancelled) = (Rc::clone(&seen), Rc::clone(&seen));
		let callbacks = Callbacks::new()
			.on_success(move |_| success.borrow_mut().push("success"))
			.on_cancelled(move |reason| cancelled.borrow_mut().push(reason.as_str()));
		let handler = callbacks.into_handler();
		handler(Outcome::cancelled(CancelReason::TimedOut {
			after: Duration::from_secs(1),
		}));
		assert_eq!(*seen.borrow(), vec!["timed-out"]);

		Callbacks::new().dispatch(Outcome::failure(Payload::new(SignalSource::Message, json!({}))));
	}

	#[test]
	fn config_override_forces_device_class() {
		let config = Config {
			device_class: Some(DeviceClass::Mobile),
			framing_denied_hosts: vec!["pay.example".to_string()],
			..Config::default()
		};
		let (mut controller, _handle) = setup(config);
		let (_outcomes, handler) = recorder();
		controller.open(TARGET, handler).unwrap();
		assert_eq!(controller.state(), SessionState::Presenting(Strategy::FullNavigation));
	}
}
