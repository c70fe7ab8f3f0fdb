//! Recording host for exercising the controller without a browser.
//!
//! [`FakeHostBuilder::build`] returns the [`FakeHost`] handed to the
//! controller together with a [`FakeHostHandle`] that shares its state. The
//! handle inspects recorded calls and armed timers and scripts what probed
//! windows report.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use payframe_protocol::WindowProbe;

use super::{
	Environment, FrameHeight, FrameSpec, HostError, NavigationTarget, Notice, Scheduler, SurfaceId, Surfaces, TimerId, TimerKind, WindowSpec,
};

/// One recorded surface operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
	MountFrame(FrameSpec),
	Reveal(SurfaceId),
	/// Window open attempt; `None` when refused.
	OpenWindow(WindowSpec, Option<SurfaceId>),
	Resize(SurfaceId, FrameHeight),
	ShowInline(SurfaceId, String),
	Notice(Notice),
	Navigate(NavigationTarget, String),
	Release(SurfaceId),
	Dismiss,
}

#[derive(Debug, Default)]
struct FakeState {
	environment: Environment,
	refuse_windows: bool,
	reject_frames: bool,
	next_surface: u64,
	calls: Vec<HostCall>,
	armed: Vec<(TimerId, Duration)>,
	cancelled: Vec<TimerId>,
	probes: HashMap<SurfaceId, WindowProbe>,
}

/// Builder for [`FakeHost`] instances.
#[derive(Debug, Default)]
pub struct FakeHostBuilder {
	state: FakeState,
}

impl FakeHostBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn environment(mut self, environment: Environment) -> Self {
		self.state.environment = environment;
		self
	}

	/// Every `open_window` call reports a blocked window.
	pub fn refuse_windows(mut self) -> Self {
		self.state.refuse_windows = true;
		self
	}

	/// Every `mount_frame` call fails.
	pub fn reject_frames(mut self) -> Self {
		self.state.reject_frames = true;
		self
	}

	pub fn build(self) -> (FakeHost, FakeHostHandle) {
		let state = Arc::new(Mutex::new(self.state));
		(FakeHost { state: Arc::clone(&state) }, FakeHostHandle { state })
	}
}

/// [`Surfaces`] and [`Scheduler`] implementation that only records.
#[derive(Debug)]
pub struct FakeHost {
	state: Arc<Mutex<FakeState>>,
}

impl FakeHost {
	fn allocate(state: &mut FakeState) -> SurfaceId {
		state.next_surface += 1;
		SurfaceId(state.next_surface)
	}
}

impl Surfaces for FakeHost {
	fn environment(&self) -> Environment {
		self.state.lock().environment
	}

	fn mount_frame(&mut self, spec: &FrameSpec) -> Result<SurfaceId, HostError> {
		let mut state = self.state.lock();
		state.calls.push(HostCall::MountFrame(spec.clone()));
		if state.reject_frames {
			return Err(HostError("frame rejected by fake host".to_string()));
		}
		Ok(Self::allocate(&mut state))
	}

	fn reveal(&mut self, surface: SurfaceId) {
		self.state.lock().calls.push(HostCall::Reveal(surface));
	}

	fn open_window(&mut self, spec: &WindowSpec) -> Option<SurfaceId> {
		let mut state = self.state.lock();
		let surface = (!state.refuse_windows).then(|| Self::allocate(&mut state));
		state.calls.push(HostCall::OpenWindow(spec.clone(), surface));
		surface
	}

	fn probe_window(&mut self, surface: SurfaceId) -> WindowProbe {
		self.state.lock().probes.get(&surface).cloned().unwrap_or_default()
	}

	fn resize_frame(&mut self, surface: SurfaceId, height: FrameHeight) {
		self.state.lock().calls.push(HostCall::Resize(surface, height));
	}

	fn show_inline(&mut self, surface: SurfaceId, html: &str) {
		self.state.lock().calls.push(HostCall::ShowInline(surface, html.to_string()));
	}

	fn show_notice(&mut self, notice: &Notice) {
		self.state.lock().calls.push(HostCall::Notice(notice.clone()));
	}

	fn navigate(&mut self, target: NavigationTarget, url: &str) {
		self.state.lock().calls.push(HostCall::Navigate(target, url.to_string()));
	}

	fn release(&mut self, surface: SurfaceId) {
		self.state.lock().calls.push(HostCall::Release(surface));
	}

	fn dismiss(&mut self) {
		self.state.lock().calls.push(HostCall::Dismiss);
	}
}

impl Scheduler for FakeHost {
	fn schedule(&mut self, timer: TimerId, after: Duration) {
		self.state.lock().armed.push((timer, after));
	}

	fn cancel(&mut self, timer: TimerId) {
		let mut state = self.state.lock();
		state.armed.retain(|(armed, _)| *armed != timer);
		state.cancelled.push(timer);
	}
}

/// Shared view into a [`FakeHost`].
#[derive(Debug, Clone)]
pub struct FakeHostHandle {
	state: Arc<Mutex<FakeState>>,
}

impl FakeHostHandle {
	pub fn calls(&self) -> Vec<HostCall> {
		self.state.lock().calls.clone()
	}

	/// Takes all recorded calls, clearing the log.
	pub fn take_calls(&self) -> Vec<HostCall> {
		std::mem::take(&mut self.state.lock().calls)
	}

	/// Timers scheduled and not cancelled, in scheduling order.
	pub fn armed(&self) -> Vec<(TimerId, Duration)> {
		self.state.lock().armed.clone()
	}

	/// Most recently scheduled live timer of `kind`.
	pub fn armed_of(&self, kind: TimerKind) -> Option<TimerId> {
		self.state.lock().armed.iter().rev().find(|(timer, _)| timer.kind == kind).map(|(timer, _)| *timer)
	}

	/// Removes a timer from the armed list as if it fired, returning it.
	pub fn fire(&self, kind: TimerKind) -> Option<TimerId> {
		let mut state = self.state.lock();
		let index = state.armed.iter().rposition(|(timer, _)| timer.kind == kind)?;
		Some(state.armed.remove(index).0)
	}

	pub fn cancelled(&self) -> Vec<TimerId> {
		self.state.lock().cancelled.clone()
	}

	/// Surfaces released so far, in order.
	pub fn released(&self) -> Vec<SurfaceId> {
		self.state
			.lock()
			.calls
			.iter()
			.filter_map(|call| match call {
				HostCall::Release(surface) => Some(*surface),
				_ => None,
			})
			.collect()
	}

	pub fn navigations(&self) -> Vec<(NavigationTarget, String)> {
		self.state
			.lock()
			.calls
			.iter()
			.filter_map(|call| match call {
				HostCall::Navigate(target, url) => Some((*target, url.clone())),
				_ => None,
			})
			.collect()
	}

	/// Last surface handed out by `mount_frame` or `open_window`.
	pub fn last_surface(&self) -> Option<SurfaceId> {
		let state = self.state.lock();
		(state.next_surface > 0).then_some(SurfaceId(state.next_surface))
	}

	/// Makes the next probes of `surface` read `location`.
	pub fn set_location(&self, surface: SurfaceId, location: &str) {
		self.state.lock().probes.insert(surface, WindowProbe::at(location));
	}

	/// Makes the next probes of `surface` report a closed window.
	pub fn close_window(&self, surface: SurfaceId) {
		self.state.lock().probes.insert(surface, WindowProbe::closed());
	}

	pub fn set_refuse_windows(&self, refuse: bool) {
		self.state.lock().refuse_windows = refuse;
	}

	pub fn set_environment(&self, environment: Environment) {
		self.state.lock().environment = environment;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn timer(kind: TimerKind, seq: u32) -> TimerId {
		TimerId { generation: 1, kind, seq }
	}

	#[test]
	fn records_calls_and_allocates_surfaces() {
		let (mut host, handle) = FakeHostBuilder::new().build();
		let spec = WindowSpec {
			url: "https://pay.example/".to_string(),
			target: "_blank",
			features: None,
		};
		let first = host.open_window(&spec);
		let second = host.open_window(&spec);
		assert_eq!((first, second), (Some(SurfaceId(1)), Some(SurfaceId(2))));
		host.release(SurfaceId(1));
		assert_eq!(handle.released(), vec![SurfaceId(1)]);
		assert_eq!(handle.take_calls().len(), 3);
		assert!(handle.calls().is_empty());
	}

	#[test]
	fn refused_windows_are_recorded_without_surface() {
		let (mut host, handle) = FakeHostBuilder::new().refuse_windows().build();
		let spec = WindowSpec {
			url: "https://pay.example/".to_string(),
			target: "_blank",
			features: None,
		};
		assert_eq!(host.open_window(&spec), None);
		assert!(matches!(handle.calls().as_slice(), [HostCall::OpenWindow(_, None)]));
	}

	#[test]
	fn scripted_probes() {
		let (mut host, handle) = FakeHostBuilder::new().build();
		assert_eq!(host.probe_window(SurfaceId(7)), WindowProbe::open());
		handle.set_location(SurfaceId(7), "https://shop.example/success");
		assert_eq!(host.probe_window(SurfaceId(7)).location.as_deref(), Some("https://shop.example/success"));
		handle.close_window(SurfaceId(7));
		assert!(host.probe_window(SurfaceId(7)).closed);
	}

	#[test]
	fn cancel_removes_armed_timer() {
		let (mut host, handle) = FakeHostBuilder::new().build();
		host.schedule(timer(TimerKind::Poll, 1), Duration::from_millis(500));
		host.schedule(timer(TimerKind::SessionTimeout, 2), Duration::from_secs(900));
		host.cancel(timer(TimerKind::Poll, 1));
		assert_eq!(handle.armed_of(TimerKind::Poll), None);
		assert_eq!(handle.cancelled(), vec![timer(TimerKind::Poll, 1)]);
		assert_eq!(handle.fire(TimerKind::SessionTimeout), Some(timer(TimerKind::SessionTimeout, 2)));
		assert!(handle.armed().is_empty());
	}
}
