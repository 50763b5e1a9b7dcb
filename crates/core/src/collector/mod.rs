//! Windowed collection of a guild's member list.
//!
//! The server pages the member list in windows requested with op 14. Each
//! `GUILD_MEMBER_LIST_UPDATE` acknowledges windows (SYNC) and delivers
//! records (SYNC, INSERT, UPDATE). There is no end-of-list marker, so a
//! collection completes on the first of:
//!
//! 1. the record cap is reached
//! 2. the server-reported total is reached (when known)
//! 3. no productive batch arrived for the idle timeout
//! 4. the hard timeout elapsed
//!
//! The last two yield a partial outcome rather than an error.

mod records;
mod window;

use cordwire_protocol::{DispatchEvent, GatewayFrame, GuildMember, GuildMemberListUpdate, ListItem, MemberListOp, MemberListSubscription};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

pub use records::RecordSet;
pub use window::{Window, WindowStatus, WindowTracker, initial_windows};

use crate::config::CollectorConfig;
use crate::error::{Error, Result};
use crate::gateway::{Session, SessionEvent};
use crate::timers::{TimerName, Timers};

/// What to collect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectRequest {
	pub guild_id: String,
	pub channel_id: String,
	pub max_items: usize,
}

/// Completion condition that ended a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
	MaxItems,
	Total,
	Idle,
	Hard,
}

impl FinishReason {
	pub fn is_partial(self) -> bool {
		matches!(self, FinishReason::Idle | FinishReason::Hard)
	}
}

/// Result of one collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectOutcome {
	pub members: Vec<GuildMember>,
	/// Server-reported total; zero when never reported.
	pub total: u64,
	pub windows: Vec<Window>,
	pub finish: FinishReason,
	/// Set when completion came from a timeout rather than a count.
	pub partial: bool,
}

/// Runs windowed member-list collections on a ready session.
#[derive(Debug, Clone, Default)]
pub struct Collector {
	config: CollectorConfig,
}

impl Collector {
	pub fn new(config: CollectorConfig) -> Self {
		Self { config }
	}

	/// Collects members of `request.channel_id`'s list in `request.guild_id`.
	///
	/// Resolves exactly once. Timeouts produce a partial outcome.
	///
	/// # Errors
	///
	/// * [`Error::Transport`] if the session ends mid-collection
	/// * [`Error::Cancelled`] if `cancel` fires first
	/// * [`Error::NotReady`] if the session is not live
	pub async fn collect(&self, session: &Session, request: &CollectRequest, cancel: &CancellationToken) -> Result<CollectOutcome> {
		let mut progress = Progress::new(request.max_items);
		if let Some(finish) = progress.finished() {
			return Ok(progress.into_outcome(finish));
		}

		let mut stream = session.subscribe();
		let windows = initial_windows(self.config.window_size, self.config.initial_windows);
		for window in &windows {
			progress.tracker.request(*window);
		}
		debug!(target = "cordwire.collector", guild = %request.guild_id, channel = %request.channel_id, ?windows, "requesting windows");
		session.send(subscription(request, windows)?).await?;

		let mut timers = Timers::new();
		timers.arm_in(TimerName::Hard, self.config.hard_timeout());
		timers.arm_in(TimerName::Idle, self.config.idle_timeout());

		let finish = loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				event = stream.next() => match event {
					Some(SessionEvent::Dispatch(event)) => {
						let DispatchEvent::GuildMemberListUpdate(update) = &*event else { continue };
						if update.guild_id != request.guild_id {
							continue;
						}

						let added = progress.apply(update);
						trace!(target = "cordwire.collector", added, count = progress.records.len(), total = progress.total, "batch applied");
						if added == 0 {
							continue;
						}
						timers.arm_in(TimerName::Idle, self.config.idle_timeout());

						if let Some(finish) = progress.finished() {
							break finish;
						}
						if let Some(next) = progress.tracker.next_window(self.config.window_size) {
							progress.tracker.request(next);
							debug!(target = "cordwire.collector", window = ?next, "requesting next window");
							session.send(subscription(request, vec![next])?).await?;
						}
					}
					Some(SessionEvent::Closed(reason)) => return Err(Error::Transport(reason)),
					None => return Err(Error::ChannelClosed),
				},
				name = timers.fired() => match name {
					TimerName::Idle => break FinishReason::Idle,
					TimerName::Hard => break FinishReason::Hard,
					_ => {}
				},
			}
		};

		let outcome = progress.into_outcome(finish);
		info!(
			target = "cordwire.collector",
			guild = %request.guild_id,
			count = outcome.members.len(),
			total = outcome.total,
			finish = ?outcome.finish,
			partial = outcome.partial,
			"collection finished"
		);
		Ok(outcome)
	}
}

fn subscription(request: &CollectRequest, windows: Vec<Window>) -> Result<GatewayFrame> {
	let subscription = MemberListSubscription::new(request.guild_id.clone(), request.channel_id.clone(), windows);
	Ok(GatewayFrame::guild_subscriptions(&subscription)?)
}

struct Progress {
	tracker: WindowTracker,
	records: RecordSet,
	max_items: usize,
	total: u64,
}

impl Progress {
	fn new(max_items: usize) -> Self {
		Self {
			tracker: WindowTracker::new(),
			records: RecordSet::with_capacity(max_items),
			max_items,
			total: 0,
		}
	}

	/// Applies one update and returns the number of new records.
	fn apply(&mut self, update: &GuildMemberListUpdate) -> usize {
		if update.member_count > 0 {
			self.total = update.member_count;
		}

		let mut added = 0;
		for op in &update.ops {
			match op {
				MemberListOp::Sync { range, items } => {
					self.tracker.satisfy(*range);
					added += items.iter().filter(|item| self.insert(item)).count();
				}
				MemberListOp::Insert { item, .. } | MemberListOp::Update { item, .. } => {
					added += usize::from(self.insert(item));
				}
				MemberListOp::Invalidate { range } => {
					trace!(target = "cordwire.collector", ?range, "window invalidated");
				}
				MemberListOp::Delete { .. } | MemberListOp::Unknown => {}
			}
		}
		added
	}

	fn insert(&mut self, item: &ListItem) -> bool {
		item.member().is_some_and(|member| self.records.insert(member))
	}

	fn finished(&self) -> Option<FinishReason> {
		let count = self.records.len();
		if count >= self.max_items {
			Some(FinishReason::MaxItems)
		} else if self.total > 0 && count as u64 >= self.total {
			Some(FinishReason::Total)
		} else {
			None
		}
	}

	fn into_outcome(self, finish: FinishReason) -> CollectOutcome {
		CollectOutcome {
			windows: self.tracker.satisfied(),
			total: self.total,
			members: self.records.into_members(),
			finish,
			partial: finish.is_partial(),
		}
	}
}
