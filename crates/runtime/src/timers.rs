//! Tokio-backed [`Scheduler`].

use std::collections::HashMap;
use std::time::Duration;

use payframe::host::{Scheduler, TimerId};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

/// Spawns one sleeping task per armed timer; expiries are sent to the driver.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct TokioTimers {
	expired: mpsc::UnboundedSender<TimerId>,
	pending: HashMap<TimerId, AbortHandle>,
}

impl TokioTimers {
	pub fn new(expired: mpsc::UnboundedSender<TimerId>) -> Self {
		Self {
			expired,
			pending: HashMap::new(),
		}
	}

	/// Number of timers whose tasks have not finished yet.
	pub fn pending(&self) -> usize {
		self.pending.values().filter(|handle| !handle.is_finished()).count()
	}
}

impl Scheduler for TokioTimers {
	fn schedule(&mut self, timer: TimerId, after: Duration) {
		self.pending.retain(|_, handle| !handle.is_finished());
		let expired = self.expired.clone();
		let task = tokio::spawn(async move {
			tokio::time::sleep(after).await;
			let _ = expired.send(timer);
		});
		trace!(target = "payframe.runtime", %timer, ?after, "timer scheduled");
		self.pending.insert(timer, task.abort_handle());
	}

	fn cancel(&mut self, timer: TimerId) {
		if let Some(handle) = self.pending.remove(&timer) {
			handle.abort();
			trace!(target = "payframe.runtime", %timer, "timer aborted");
		}
	}
}

impl Drop for TokioTimers {
	fn drop(&mut self) {
		for handle in self.pending.values() {
			handle.abort();
		}
	}
}
