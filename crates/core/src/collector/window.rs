//! Bookkeeping for requested and acknowledged member-list windows.

use std::collections::BTreeMap;

use serde::Serialize;

/// Inclusive `[start, end]` index range.
pub type Window = [u32; 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
	Requested,
	Satisfied,
}

/// Window states for one collection.
///
/// A window moves `Requested -> Satisfied` at most once and the satisfied set
/// never shrinks. Acknowledging a window that was never requested records it
/// as satisfied directly.
#[derive(Debug, Default)]
pub struct WindowTracker {
	windows: BTreeMap<Window, WindowStatus>,
}

impl WindowTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Marks `window` requested. Returns `false` if it was already known.
	pub fn request(&mut self, window: Window) -> bool {
		if self.windows.contains_key(&window) {
			return false;
		}
		self.windows.insert(window, WindowStatus::Requested);
		true
	}

	/// Marks `window` satisfied. Returns `false` if it already was.
	pub fn satisfy(&mut self, window: Window) -> bool {
		let previous = self.windows.insert(window, WindowStatus::Satisfied);
		previous != Some(WindowStatus::Satisfied)
	}

	pub fn status(&self, window: Window) -> Option<WindowStatus> {
		self.windows.get(&window).copied()
	}

	pub fn satisfied(&self) -> Vec<Window> {
		self.windows.iter().filter(|(_, status)| **status == WindowStatus::Satisfied).map(|(window, _)| *window).collect()
	}

	/// Satisfied window with the largest end index.
	pub fn highest_satisfied(&self) -> Option<Window> {
		self.windows
			.iter()
			.filter(|(_, status)| **status == WindowStatus::Satisfied)
			.map(|(window, _)| *window)
			.max_by_key(|window| window[1])
	}

	/// Window of `size` that starts right after the highest satisfied one,
	/// unless it is already requested or satisfied.
	pub fn next_window(&self, size: u32) -> Option<Window> {
		let start = self.highest_satisfied()?[1].checked_add(1)?;
		let next = [start, start.checked_add(size.saturating_sub(1))?];
		(!self.windows.contains_key(&next)).then_some(next)
	}
}

/// The first `count` windows of `size`, starting at index zero.
///
/// Stops early rather than wrapping once indices would leave `u32`.
pub fn initial_windows(size: u32, count: u32) -> Vec<Window> {
	let size = size.max(1);
	(0..count)
		.map_while(|i| {
			let start = i.checked_mul(size)?;
			Some([start, start.checked_add(size - 1)?])
		})
		.collect()
}
