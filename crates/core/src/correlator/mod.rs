//! Trigger, detect, act.
//!
//! A command interaction is posted over the side channel and its resulting
//! message shows up asynchronously on the push channel. Detection races
//! three sources into one outcome:
//!
//! 1. `MESSAGE_CREATE` from the expected application in the target channel
//! 2. `INTERACTION_SUCCESS` for the trigger nonce embedding the message
//! 3. a side-channel lookup of recent messages, started when the success
//!    arrives without a message
//!
//! The first match wins and ends detection; nothing before the deadline is
//! [`ClickOutcome::NotFound`]. The captured message is then clicked
//! `repetitions` times through the rate-limited executor.

mod pending;
mod phase;

use std::sync::Arc;
use std::time::Duration;

use cordwire_protocol::{ChannelRanges, CommandRef, GatewayFrame, InteractionRequest};
use cordwire_runtime::transport::BoxFuture;
use futures_util::future::{OptionFuture, join_all};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use pending::{CapturedObject, DetectionPath, Expectation, PendingAction, Signal};
pub use phase::WorkflowPhase;

use crate::config::CorrelatorConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::executor::Executor;
use crate::gateway::{DispatchStream, Session, SessionEvent};
use crate::nonce;
use crate::rest::SideChannel;
use crate::timers::{TimerName, Timers};

/// Tolerated clock difference between this host and message snowflakes.
const LOOKUP_CLOCK_SKEW_MS: u64 = 2_000;

/// Command to invoke and how to recognise its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSpec {
	pub guild_id: Option<String>,
	pub channel_id: String,
	pub command: CommandRef,
	/// Prefix of the custom id of the button to click.
	pub custom_id_prefix: String,
}

/// How to act on the captured message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickSpec {
	pub repetitions: u32,
	pub interval: Duration,
	/// Stop after detection and return [`ClickOutcome::Captured`].
	pub delay: bool,
}

impl Default for ClickSpec {
	fn default() -> Self {
		Self {
			repetitions: 1,
			interval: Duration::ZERO,
			delay: false,
		}
	}
}

/// Tally of the Act phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActReport {
	pub attempted: u32,
	pub succeeded: u32,
	pub failed: u32,
	/// Rate-limited attempts that were retried.
	pub retries: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_error: Option<String>,
}

/// Final state of one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClickOutcome {
	Completed { captured: CapturedObject, report: ActReport },
	Captured { captured: CapturedObject },
	/// Nothing matched before the deadline, or the server rejected the trigger.
	NotFound,
	TriggerFailed { kind: ErrorKind, message: String },
	/// Cancelled before the workflow finished. Records what already reached
	/// the server: whether the trigger was posted, the captured message and
	/// the clicks sent so far.
	Cancelled {
		triggered: bool,
		#[serde(skip_serializing_if = "Option::is_none")]
		captured: Option<CapturedObject>,
		report: ActReport,
	},
	/// A session-level failure ended this target of a batch.
	Failed { kind: ErrorKind, message: String },
}

impl ClickOutcome {
	pub fn captured(&self) -> Option<&CapturedObject> {
		match self {
			ClickOutcome::Completed { captured, .. } | ClickOutcome::Captured { captured } => Some(captured),
			ClickOutcome::Cancelled { captured, .. } => captured.as_ref(),
			ClickOutcome::NotFound | ClickOutcome::TriggerFailed { .. } | ClickOutcome::Failed { .. } => None,
		}
	}
}

/// Runs trigger/detect/act workflows on a ready session.
pub struct Correlator {
	side: Arc<dyn SideChannel>,
	executor: Arc<Executor>,
	config: CorrelatorConfig,
}

impl Correlator {
	pub fn new(side: Arc<dyn SideChannel>, executor: Arc<Executor>, config: CorrelatorConfig) -> Self {
		Self { side, executor, config }
	}

	/// Triggers `trigger.command`, waits for the resulting message and clicks it.
	///
	/// # Errors
	///
	/// * [`Error::Transport`] if the session ends during detection
	/// * [`Error::NotReady`] if the session has no READY state
	///
	/// Trigger failures, missing messages and cancellation are outcomes, not
	/// errors.
	pub async fn trigger_and_act(
		&self,
		session: &Session,
		trigger: &TriggerSpec,
		click: &ClickSpec,
		cancel: &CancellationToken,
	) -> Result<ClickOutcome> {
		let session_id = session.require_session_id()?;
		let mut phase = WorkflowPhase::Pending;

		let mut stream = session.subscribe();
		if self.config.subscribe_guild {
			if let Some(guild_id) = &trigger.guild_id {
				session.send(GatewayFrame::guild_subscriptions_bulk(guild_id, &ChannelRanges::new())).await?;
			}
		}

		let nonce = nonce::generate();
		let request = InteractionRequest::command(&trigger.command, trigger.guild_id.clone(), trigger.channel_id.clone(), session_id, nonce.clone());
		let scope = channel_scope(&trigger.channel_id);
		debug!(target = "cordwire.correlator", command = %trigger.command.name, channel = %trigger.channel_id, %nonce, "triggering");

		match self.executor.execute(&scope, cancel, || self.side.interact(&request)).await {
			Ok(_) => phase = advance(phase, WorkflowPhase::Triggered)?,
			Err(Error::Cancelled) => {
				advance(phase, WorkflowPhase::Finished)?;
				return Ok(cancelled(false, None, ActReport::default()));
			}
			Err(err) => {
				warn!(target = "cordwire.correlator", command = %trigger.command.name, error = %err, "trigger failed");
				advance(phase, WorkflowPhase::Finished)?;
				return Ok(ClickOutcome::TriggerFailed {
					kind: err.kind(),
					message: err.to_string(),
				});
			}
		}

		let expectation = Expectation {
			application_id: trigger.command.application_id.clone(),
			guild_id: trigger.guild_id.clone(),
			channel_id: trigger.channel_id.clone(),
			custom_id_prefix: trigger.custom_id_prefix.clone(),
			invoker_id: session.user_id(),
		};
		let pending = PendingAction::new(nonce, expectation);

		let detected = match self.detect(&mut stream, pending, cancel).await {
			Err(Error::Cancelled) => {
				advance(phase, WorkflowPhase::Finished)?;
				return Ok(cancelled(true, None, ActReport::default()));
			}
			other => other?,
		};
		let Some(captured) = detected else {
			advance(phase, WorkflowPhase::Finished)?;
			info!(
				target = "cordwire.correlator",
				command = %trigger.command.name,
				timeout_ms = self.config.detect_timeout_ms,
				"no resulting message"
			);
			return Ok(ClickOutcome::NotFound);
		};
		drop(stream);
		phase = advance(phase, WorkflowPhase::Captured)?;
		info!(target = "cordwire.correlator", message = %captured.message_id, custom_id = %captured.custom_id, path = ?captured.path, "captured");

		if click.delay {
			advance(phase, WorkflowPhase::Finished)?;
			return Ok(ClickOutcome::Captured { captured });
		}
		self.act_from(session, phase, captured, click, cancel).await
	}

	/// Clicks a message captured earlier, typically in delay mode.
	pub async fn act_on(
		&self,
		session: &Session,
		captured: &CapturedObject,
		click: &ClickSpec,
		cancel: &CancellationToken,
	) -> Result<ClickOutcome> {
		self.act_from(session, WorkflowPhase::Captured, captured.clone(), click, cancel).await
	}

	/// Triggers every target concurrently, then clicks every captured message.
	///
	/// Returns one outcome per target, in input order. A target that fails
	/// with a session-level error becomes [`ClickOutcome::Failed`] without
	/// discarding the others. After cancellation, captured targets that were
	/// not clicked yet come back as [`ClickOutcome::Cancelled`].
	pub async fn run_batch(&self, session: &Session, targets: &[TriggerSpec], click: &ClickSpec, cancel: &CancellationToken) -> Vec<ClickOutcome> {
		let capture_only = ClickSpec { delay: true, ..click.clone() };
		let detected = join_all(targets.iter().map(|trigger| self.trigger_and_act(session, trigger, &capture_only, cancel))).await;

		let mut outcomes = Vec::with_capacity(targets.len());
		for outcome in detected {
			let outcome = match outcome {
				Ok(ClickOutcome::Captured { captured }) if !click.delay => self.act_on(session, &captured, click, cancel).await,
				other => other,
			};
			outcomes.push(outcome.unwrap_or_else(|err| {
				warn!(target = "cordwire.correlator", error = %err, "batch target failed");
				ClickOutcome::Failed {
					kind: err.kind(),
					message: err.to_string(),
				}
			}));
		}

		let clicked = outcomes.iter().filter(|o| matches!(o, ClickOutcome::Completed { .. })).count();
		info!(target = "cordwire.correlator", targets = targets.len(), clicked, "batch finished");
		outcomes
	}

	async fn detect(
		&self,
		stream: &mut DispatchStream,
		mut pending: PendingAction,
		cancel: &CancellationToken,
	) -> Result<Option<CapturedObject>> {
		let mut timers = Timers::new();
		timers.arm_in(TimerName::Detect, self.config.detect_timeout());
		let mut lookup: Option<BoxFuture<'_, Result<Option<CapturedObject>>>> = None;

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				event = stream.next() => match event {
					Some(SessionEvent::Dispatch(event)) => match pending.observe(&event) {
						Signal::Captured(captured) => return Ok(Some(captured)),
						Signal::Failed => {
							debug!(target = "cordwire.correlator", nonce = %pending.nonce, "interaction failed");
							return Ok(None);
						}
						Signal::NeedsLookup => {
							debug!(target = "cordwire.correlator", nonce = %pending.nonce, "private response without message; looking up");
							lookup = Some(Box::pin(self.lookup(pending.clone(), cancel.clone())));
						}
						Signal::Ignore => {}
					},
					Some(SessionEvent::Closed(reason)) => return Err(Error::Transport(reason)),
					None => return Err(Error::ChannelClosed),
				},
				Some(found) = OptionFuture::from(lookup.as_mut()), if lookup.is_some() => {
					lookup = None;
					match found {
						Ok(Some(captured)) => return Ok(Some(captured)),
						Ok(None) => debug!(target = "cordwire.correlator", "lookup found nothing"),
						Err(Error::Cancelled) => return Err(Error::Cancelled),
						Err(err) => warn!(target = "cordwire.correlator", error = %err, "lookup failed"),
					}
				},
				_ = timers.fired() => return Ok(None),
			}
		}
	}

	async fn lookup(&self, pending: PendingAction, cancel: CancellationToken) -> Result<Option<CapturedObject>> {
		tokio::select! {
			_ = cancel.cancelled() => return Err(Error::Cancelled),
			_ = tokio::time::sleep(self.config.fallback_delay()) => {}
		}

		let channel_id = pending.expectation.channel_id.as_str();
		let scope = channel_scope(channel_id);
		let limit = self.config.fallback_limit;
		let messages = self.executor.execute(&scope, &cancel, || self.side.recent_messages(channel_id, limit)).await?;
		Ok(pending.find_recent(&messages.value, LOOKUP_CLOCK_SKEW_MS))
	}

	async fn act_from(
		&self,
		session: &Session,
		phase: WorkflowPhase,
		captured: CapturedObject,
		click: &ClickSpec,
		cancel: &CancellationToken,
	) -> Result<ClickOutcome> {
		let phase = advance(phase, WorkflowPhase::Acting)?;
		let session_id = session.require_session_id()?;
		let target = captured.target();
		let scope = channel_scope(&captured.channel_id);
		let mut report = ActReport::default();

		for repetition in 0..click.repetitions {
			if repetition > 0 && !click.interval.is_zero() {
				tokio::select! {
					_ = cancel.cancelled() => return finish_cancelled(phase, captured, report),
					_ = tokio::time::sleep(click.interval) => {}
				}
			}

			let request = InteractionRequest::button(&target, session_id.clone(), nonce::generate());
			let result = self.executor.execute(&scope, cancel, || self.side.interact(&request)).await;
			// The executor only reports cancellation before a click is sent.
			if matches!(result, Err(Error::Cancelled)) {
				return finish_cancelled(phase, captured, report);
			}
			report.attempted += 1;
			match result {
				Ok(executed) => {
					report.succeeded += 1;
					report.retries += executed.retries();
				}
				Err(err) => {
					warn!(target = "cordwire.correlator", repetition, error = %err, "click failed");
					report.failed += 1;
					report.last_error = Some(err.to_string());
				}
			}
		}

		advance(phase, WorkflowPhase::Finished)?;
		info!(
			target = "cordwire.correlator",
			message = %captured.message_id,
			succeeded = report.succeeded,
			attempted = report.attempted,
			retries = report.retries,
			"act finished"
		);
		Ok(ClickOutcome::Completed { captured, report })
	}
}

fn cancelled(triggered: bool, captured: Option<CapturedObject>, report: ActReport) -> ClickOutcome {
	info!(target = "cordwire.correlator", triggered, clicks = report.attempted, "workflow cancelled");
	ClickOutcome::Cancelled { triggered, captured, report }
}

fn finish_cancelled(phase: WorkflowPhase, captured: CapturedObject, report: ActReport) -> Result<ClickOutcome> {
	advance(phase, WorkflowPhase::Finished)?;
	Ok(cancelled(true, Some(captured), report))
}

fn advance(phase: WorkflowPhase, next: WorkflowPhase) -> Result<WorkflowPhase> {
	let next = phase.transition(next)?;
	debug!(target = "cordwire.correlator", from = %phase, to = %next, "workflow phase");
	Ok(next)
}

/// Rate-limit scope shared by every interaction in one channel.
pub fn channel_scope(channel_id: &str) -> String {
	format!("channel:{channel_id}")
}
