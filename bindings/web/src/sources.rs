//! Message sender allow-list.
//!
//! Only windows the host created (a mounted frame, its inline OTP frame, an
//! opened popup or tab) may deliver messages to the controller.

use payframe::host::SurfaceId;

/// Windows trusted to post messages, keyed by the surface that owns them.
#[derive(Debug)]
pub(crate) struct TrustedSources<W> {
	entries: Vec<(SurfaceId, W)>,
}

impl<W> Default for TrustedSources<W> {
	fn default() -> Self {
		Self { entries: Vec::new() }
	}
}

impl<W: PartialEq> TrustedSources<W> {
	pub(crate) fn trust(&mut self, surface: SurfaceId, window: W) {
		if !self.entries.iter().any(|(owner, known)| *owner == surface && *known == window) {
			self.entries.push((surface, window));
		}
	}

	/// Forgets every window owned by `surface`.
	pub(crate) fn forget(&mut self, surface: SurfaceId) {
		self.entries.retain(|(owner, _)| *owner != surface);
	}

	pub(crate) fn clear(&mut self) {
		self.entries.clear();
	}

	/// Returns the owning surface when `source` is a trusted window.
	///
	/// A missing source (worker or message port) is never accepted.
	pub(crate) fn accepts(&self, source: Option<&W>) -> Option<SurfaceId> {
		let source = source?;
		self.entries.iter().find(|(_, known)| known == source).map(|(owner, _)| *owner)
	}
}
