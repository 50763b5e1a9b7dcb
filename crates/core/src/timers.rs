//! Named timers multiplexed onto a single wait point.
//!
//! Each driver loop owns one [`Timers`] and selects on [`Timers::fired`]
//! next to its other event sources. Timers are plain deadlines, so dropping
//! the owner cancels all of them and nothing outlives the loop.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerName {
	/// Absolute ceiling for an operation; never reset.
	Hard,
	/// Detection deadline of a correlated action.
	Detect,
	/// Reset whenever an operation makes progress.
	Idle,
	/// Periodic heartbeat of a session.
	Heartbeat,
}

#[derive(Debug, Default)]
pub struct Timers {
	deadlines: BTreeMap<TimerName, Instant>,
}

impl Timers {
	pub fn new() -> Self {
		Self::default()
	}

	/// Arms (or re-arms) `name` to fire `after` from now.
	pub fn arm_in(&mut self, name: TimerName, after: Duration) {
		self.arm_at(name, Instant::now() + after);
	}

	pub fn arm_at(&mut self, name: TimerName, at: Instant) {
		self.deadlines.insert(name, at);
	}

	pub fn cancel(&mut self, name: TimerName) {
		self.deadlines.remove(&name);
	}

	pub fn cancel_all(&mut self) {
		self.deadlines.clear();
	}

	pub fn is_armed(&self, name: TimerName) -> bool {
		self.deadlines.contains_key(&name)
	}

	pub fn deadline(&self, name: TimerName) -> Option<Instant> {
		self.deadlines.get(&name).copied()
	}

	/// Waits for the earliest armed timer, disarms it and returns its name.
	///
	/// Pends forever while nothing is armed. Cancel-safe: a dropped wait
	/// leaves every timer armed.
	pub async fn fired(&mut self) -> TimerName {
		let next = self.deadlines.iter().min_by_key(|(_, at)| **at).map(|(name, at)| (*name, *at));
		let Some((name, at)) = next else {
			return std::future::pending().await;
		};
		sleep_until(at).await;
		self.deadlines.remove(&name);
		name
	}
}
