//! Command loop around the controller.

use payframe::host::{Surfaces, TimerId};
use payframe::{Config, Controller, FrameContent, Outcome, RawMessage, Ticket};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::error::{Result, RuntimeError};
use crate::host::RuntimeHost;
use crate::timers::TokioTimers;

/// Event raised by the page hosting a session surface.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
	FrameLoaded { ticket: Ticket, content: FrameContent },
	FrameError { ticket: Ticket },
	Message { ticket: Ticket, raw: RawMessage },
	/// The payer used the close affordance.
	Close { ticket: Ticket },
	/// The payer skipped the full-navigation countdown.
	ContinueNow { ticket: Ticket },
}

impl HostEvent {
	pub fn ticket(&self) -> Ticket {
		match self {
			HostEvent::FrameLoaded { ticket, .. }
			| HostEvent::FrameError { ticket }
			| HostEvent::Message { ticket, .. }
			| HostEvent::Close { ticket }
			| HostEvent::ContinueNow { ticket } => *ticket,
		}
	}
}

enum Command {
	Open {
		url: String,
		reply: oneshot::Sender<Result<SessionLease>>,
	},
	Cancel {
		reply: oneshot::Sender<bool>,
	},
	Host(HostEvent),
}

/// A started session: its ticket and the receiver for its single outcome.
#[derive(Debug)]
pub struct SessionLease {
	pub ticket: Ticket,
	outcome: oneshot::Receiver<Outcome>,
}

impl SessionLease {
	/// Waits for the session to settle.
	pub async fn outcome(self) -> Result<Outcome> {
		self.outcome.await.map_err(|_| RuntimeError::Abandoned(self.ticket))
	}
}

/// Cloneable sender side of a [`Driver`].
#[derive(Debug, Clone)]
pub struct DriverHandle {
	commands: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for Command {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Command::Open { url, .. } => f.debug_struct("Open").field("url", url).finish_non_exhaustive(),
			Command::Cancel { .. } => f.write_str("Cancel"),
			Command::Host(event) => f.debug_tuple("Host").field(event).finish(),
		}
	}
}

impl DriverHandle {
	/// Opens `url`, superseding any active session.
	pub async fn open(&self, url: impl Into<String>) -> Result<SessionLease> {
		let (reply, response) = oneshot::channel();
		self.send(Command::Open { url: url.into(), reply })?;
		response.await.map_err(|_| RuntimeError::Closed)?
	}

	/// Cancels the active session; `false` when nothing was active.
	pub async fn cancel(&self) -> Result<bool> {
		let (reply, response) = oneshot::channel();
		self.send(Command::Cancel { reply })?;
		response.await.map_err(|_| RuntimeError::Closed)
	}

	pub fn frame_loaded(&self, ticket: Ticket, content: FrameContent) -> Result<()> {
		self.event(HostEvent::FrameLoaded { ticket, content })
	}

	pub fn frame_error(&self, ticket: Ticket) -> Result<()> {
		self.event(HostEvent::FrameError { ticket })
	}

	pub fn message(&self, ticket: Ticket, raw: impl Into<RawMessage>) -> Result<()> {
		self.event(HostEvent::Message { ticket, raw: raw.into() })
	}

	pub fn close(&self, ticket: Ticket) -> Result<()> {
		self.event(HostEvent::Close { ticket })
	}

	pub fn continue_now(&self, ticket: Ticket) -> Result<()> {
		self.event(HostEvent::ContinueNow { ticket })
	}

	/// Forwards a host event as-is.
	pub fn event(&self, event: HostEvent) -> Result<()> {
		self.send(Command::Host(event))
	}

	fn send(&self, command: Command) -> Result<()> {
		self.commands.send(command).map_err(|_| RuntimeError::Closed)
	}
}

/// Owns the controller and processes one event at a time.
///
/// The controller holds non-`Send` outcome handlers, so the driver future is
/// `!Send`: await it on the current task (for example with `tokio::join!`) or
/// inside a `LocalSet`.
pub struct Driver<S: Surfaces> {
	controller: Controller<RuntimeHost<S>>,
	commands: mpsc::UnboundedReceiver<Command>,
	expired: mpsc::UnboundedReceiver<TimerId>,
}

impl<S: Surfaces> Driver<S> {
	pub fn new(config: Config, surfaces: S) -> Result<(Self, DriverHandle)> {
		let (command_tx, commands) = mpsc::unbounded_channel();
		let (expired_tx, expired) = mpsc::unbounded_channel();
		let host = RuntimeHost::new(surfaces, TokioTimers::new(expired_tx));
		let controller = Controller::new(config, host)?;
		Ok((
			Self {
				controller,
				commands,
				expired,
			},
			DriverHandle { commands: command_tx },
		))
	}

	/// Extends the framing-denied host patterns before the loop starts.
	pub fn deny_framing<I, P>(&mut self, patterns: I) -> Result<()>
	where
		I: IntoIterator<Item = P>,
		P: AsRef<str>,
	{
		self.controller.policy_mut().extend_denied(patterns)?;
		Ok(())
	}

	/// Runs until every [`DriverHandle`] is dropped and no session is active,
	/// then returns the surfaces.
	pub async fn run(mut self) -> S {
		let mut handles_open = true;
		loop {
			if !handles_open && !self.controller.is_active() {
				break;
			}
			tokio::select! {
				command = self.commands.recv(), if handles_open => match command {
					Some(command) => self.dispatch(command),
					None => {
						debug!(target = "payframe.runtime", active = self.controller.is_active(), "all handles dropped");
						handles_open = false;
					}
				},
				Some(timer) = self.expired.recv() => {
					trace!(target = "payframe.runtime", %timer, "timer expired");
					self.controller.on_timer(timer);
				}
			}
		}
		debug!(target = "payframe.runtime", "driver loop ended");
		self.controller.into_host().into_surfaces()
	}

	fn dispatch(&mut self, command: Command) {
		trace!(target = "payframe.runtime", ?command, "command");
		match command {
			Command::Open { url, reply } => {
				let (outcome_tx, outcome) = oneshot::channel();
				let result = self.controller.open(&url, move |settled| {
					let _ = outcome_tx.send(settled);
				});
				let _ = reply.send(result.map(|ticket| SessionLease { ticket, outcome }).map_err(RuntimeError::from));
			}
			Command::Cancel { reply } => {
				let _ = reply.send(self.controller.cancel());
			}
			Command::Host(event) => match event {
				HostEvent::FrameLoaded { ticket, content } => self.controller.on_frame_load(ticket, content),
				HostEvent::FrameError { ticket } => self.controller.on_frame_error(ticket),
				HostEvent::Message { ticket, raw } => self.controller.on_message(ticket, raw),
				HostEvent::Close { ticket } => {
					self.controller.close(ticket);
				}
				HostEvent::ContinueNow { ticket } => self.controller.continue_now(ticket),
			},
		}
	}
}
