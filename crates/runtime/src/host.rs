use std::time::Duration;

use payframe::WindowProbe;
use payframe::host::{Environment, FrameHeight, FrameSpec, HostError, NavigationTarget, Notice, Scheduler, SurfaceId, Surfaces, TimerId, WindowSpec};

use crate::timers::TokioTimers;

/// Caller-provided surfaces paired with tokio timers.
#[derive(Debug)]
pub struct RuntimeHost<S> {
	surfaces: S,
	timers: TokioTimers,
}

impl<S: Surfaces> RuntimeHost<S> {
	pub fn new(surfaces: S, timers: TokioTimers) -> Self {
		Self { surfaces, timers }
	}

	pub fn surfaces(&self) -> &S {
		&self.surfaces
	}

	pub fn timers(&self) -> &TokioTimers {
		&self.timers
	}

	pub fn into_surfaces(self) -> S {
		self.surfaces
	}
}

impl<S: Surfaces> Surfaces for RuntimeHost<S> {
	fn environment(&self) -> Environment {
		self.surfaces.environment()
	}

	fn mount_frame(&mut self, spec: &FrameSpec) -> Result<SurfaceId, HostError> {
		self.surfaces.mount_frame(spec)
	}

	fn reveal(&mut self, surface: SurfaceId) {
		self.surfaces.reveal(surface);
	}

	fn open_window(&mut self, spec: &WindowSpec) -> Option<SurfaceId> {
		self.surfaces.open_window(spec)
	}

	fn probe_window(&mut self, surface: SurfaceId) -> WindowProbe {
		self.surfaces.probe_window(surface)
	}

	fn resize_frame(&mut self, surface: SurfaceId, height: FrameHeight) {
		self.surfaces.resize_frame(surface, height);
	}

	fn show_inline(&mut self, surface: SurfaceId, html: &str) {
		self.surfaces.show_inline(surface, html);
	}

	fn show_notice(&mut self, notice: &Notice) {
		self.surfaces.show_notice(notice);
	}

	fn navigate(&mut self, target: NavigationTarget, url: &str) {
		self.surfaces.navigate(target, url);
	}

	fn release(&mut self, surface: SurfaceId) {
		self.surfaces.release(surface);
	}

	fn dismiss(&mut self) {
		self.surfaces.dismiss();
	}
}

impl<S> Scheduler for RuntimeHost<S> {
	fn schedule(&mut self, timer: TimerId, after: Duration) {
		self.timers.schedule(timer, after);
	}

	fn cancel(&mut self, timer: TimerId) {
		self.timers.cancel(timer);
	}
}
