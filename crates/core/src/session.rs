//! Per-open session record and its timer bookkeeping.

use std::fmt;

use payframe_protocol::{DeviceClass, Outcome, OutcomeKind, Strategy};
use url::Url;

use crate::host::{Environment, SurfaceId, TimerId, TimerKind};

/// Identifies one `open()` call. Events carrying an older ticket are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
	pub(crate) fn new(generation: u64) -> Self {
		Self(generation)
	}

	pub fn generation(self) -> u64 {
		self.0
	}

	/// Returns `true` when `timer` was armed for this ticket's session.
	pub fn owns(self, timer: TimerId) -> bool {
		timer.generation == self.0
	}
}

impl fmt::Display for Ticket {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "session#{}", self.0)
	}
}

/// Observable lifecycle of the controller's session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
	#[default]
	Idle,
	Presenting(Strategy),
	/// Transient: the strategy was rejected and the policy is re-run.
	Blocked(Strategy),
	Settled(OutcomeKind),
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SessionState::Idle => f.write_str("idle"),
			SessionState::Presenting(strategy) => write!(f, "presenting({strategy})"),
			SessionState::Blocked(strategy) => write!(f, "blocked({strategy})"),
			SessionState::Settled(kind) => write!(f, "settled({kind})"),
		}
	}
}

/// Progress of the current presentation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
	/// Frame mounted, no load event yet.
	Loading,
	/// Frame loaded empty; grace timer running.
	Suspect,
	/// Frame revealed.
	Ready,
	/// Frame replaced by inline content.
	Inline,
	/// Popup or tab open and being polled.
	Monitoring,
	/// Full-navigation countdown with whole seconds left.
	Countdown { remaining: u32 },
}

pub(crate) type OutcomeHandler = Box<dyn FnOnce(Outcome)>;

pub(crate) struct Session {
	pub ticket: Ticket,
	pub target: Url,
	pub device: DeviceClass,
	pub environment: Environment,
	pub state: SessionState,
	pub strategy: Strategy,
	/// Strategies blocked so far, in attempt order.
	pub excluded: Vec<Strategy>,
	pub surface: Option<SurfaceId>,
	pub phase: Phase,
	armed: Vec<TimerId>,
	next_seq: u32,
	on_outcome: Option<OutcomeHandler>,
}

impl Session {
	pub fn new(ticket: Ticket, target: Url, device: DeviceClass, environment: Environment, on_outcome: OutcomeHandler) -> Self {
		Self {
			ticket,
			target,
			device,
			environment,
			state: SessionState::Idle,
			strategy: Strategy::FullNavigation,
			excluded: Vec::new(),
			surface: None,
			phase: Phase::Loading,
			armed: Vec::new(),
			next_seq: 0,
			on_outcome: Some(on_outcome),
		}
	}

	/// Allocates and records a new timer id; the caller schedules it.
	pub fn arm(&mut self, kind: TimerKind) -> TimerId {
		self.next_seq += 1;
		let timer = TimerId {
			generation: self.ticket.generation(),
			kind,
			seq: self.next_seq,
		};
		self.armed.push(timer);
		timer
	}

	/// Consumes a fired timer. Returns `false` for timers no longer armed.
	pub fn disarm(&mut self, timer: TimerId) -> bool {
		let before = self.armed.len();
		self.armed.retain(|armed| *armed != timer);
		self.armed.len() != before
	}

	/// Disarms every timer of the given kinds and returns them for cancellation.
	pub fn disarm_kinds(&mut self, kinds: &[TimerKind]) -> Vec<TimerId> {
		let (taken, kept): (Vec<TimerId>, Vec<TimerId>) = self.armed.drain(..).partition(|timer| kinds.contains(&timer.kind));
		self.armed = kept;
		taken
	}

	pub fn drain_timers(&mut self) -> Vec<TimerId> {
		std::mem::take(&mut self.armed)
	}

	pub fn take_handler(&mut self) -> Option<OutcomeHandler> {
		self.on_outcome.take()
	}
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("ticket", &self.ticket)
			.field("target", &self.target.as_str())
			.field("device", &self.device)
			.field("state", &self.state)
			.field("excluded", &self.excluded)
			.field("surface", &self.surface)
			.field("phase", &self.phase)
			.field("armed", &self.armed)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn session() -> Session {
		let target = Url::parse("https://pay.example/s/abc").unwrap();
		Session::new(Ticket::new(3), target, DeviceClass::Desktop, Environment::default(), Box::new(|_| {}))
	}

	#[test]
	fn timers_carry_generation_and_unique_seq() {
		let mut session = session();
		let a = session.arm(TimerKind::Poll);
		let b = session.arm(TimerKind::Poll);
		assert_eq!(a.generation, 3);
		assert_ne!(a, b);
		assert!(session.ticket.owns(a));
	}

	#[test]
	fn fired_timer_is_consumed_once() {
		let mut session = session();
		let timer = session.arm(TimerKind::Grace);
		assert!(session.disarm(timer));
		assert!(!session.disarm(timer));
	}

	#[test]
	fn disarm_kinds_keeps_others() {
		let mut session = session();
		let timeout = session.arm(TimerKind::SessionTimeout);
		session.arm(TimerKind::FrameLoad);
		session.arm(TimerKind::Grace);
		let taken = session.disarm_kinds(&[TimerKind::FrameLoad, TimerKind::Grace]);
		assert_eq!(taken.len(), 2);
		assert_eq!(session.drain_timers(), vec![timeout]);
	}

	#[test]
	fn handler_is_taken_once() {
		let mut session = session();
		assert!(session.take_handler().is_some());
		assert!(session.take_handler().is_none());
	}
}
