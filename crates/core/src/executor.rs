//! Rate-limited execution of side-channel calls.
//!
//! Every side-channel call goes through [`Executor::execute`], which
//!
//! - waits until the call's scope (and any global cool-down) allows it,
//! - retries on [`Error::RateLimited`] after the server's hint plus a fixed
//!   safety margin, up to a bounded number of retries,
//! - returns any other error immediately,
//! - cools a scope down preemptively when a response reports its remaining
//!   quota at or below the low-water mark.
//!
//! Budgets live in a [`BudgetRegistry`] owned by the executor, so unrelated
//! clients never share cool-downs.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::error::{Error, Result};

/// Quota metadata attached to a side-channel response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuotaHint {
	pub remaining: Option<u32>,
	pub reset_after: Option<Duration>,
}

/// Successful side-channel response.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
	pub value: T,
	pub quota: QuotaHint,
}

impl<T> Reply<T> {
	pub fn new(value: T) -> Self {
		Self {
			value,
			quota: QuotaHint::default(),
		}
	}

	pub fn with_quota(mut self, quota: QuotaHint) -> Self {
		self.quota = quota;
		self
	}
}

/// Value returned by [`Executor::execute`] with the number of attempts made.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed<T> {
	pub value: T,
	pub attempts: u32,
}

impl<T> Executed<T> {
	/// Attempts beyond the first.
	pub fn retries(&self) -> u32 {
		self.attempts.saturating_sub(1)
	}
}

/// Rate-limit state of one scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Budget {
	/// Earliest instant the next call may be issued.
	pub next_allowed: Option<Instant>,
	/// Last remaining-quota hint.
	pub remaining: Option<u32>,
}

/// Per-scope budgets plus the global cool-down.
///
/// Every update is a read-modify-write under one lock, so concurrent calls
/// never lose each other's deferrals.
#[derive(Debug, Default)]
pub struct BudgetRegistry {
	inner: Mutex<Budgets>,
}

#[derive(Debug, Default)]
struct Budgets {
	scopes: HashMap<String, Budget>,
	global: Option<Instant>,
}

impl BudgetRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn budget(&self, scope: &str) -> Budget {
		self.inner.lock().scopes.get(scope).copied().unwrap_or_default()
	}

	/// Instant the scope opens again, if that is still in the future.
	pub fn ready_at(&self, scope: &str) -> Option<Instant> {
		let inner = self.inner.lock();
		let scoped = inner.scopes.get(scope).and_then(|b| b.next_allowed);
		let at = scoped.max(inner.global)?;
		(at > Instant::now()).then_some(at)
	}

	/// Pushes the scope's next-allowed instant to at least `until`.
	pub fn defer(&self, scope: &str, until: Instant) {
		let mut inner = self.inner.lock();
		let budget = inner.scopes.entry(scope.to_string()).or_default();
		budget.next_allowed = budget.next_allowed.max(Some(until));
	}

	pub fn defer_global(&self, until: Instant) {
		let mut inner = self.inner.lock();
		inner.global = inner.global.max(Some(until));
	}

	/// Records quota metadata, deferring the scope when it runs low.
	///
	/// Returns the deferral instant when one was applied.
	pub fn observe(&self, scope: &str, quota: &QuotaHint, low_water: u32) -> Option<Instant> {
		let mut inner = self.inner.lock();
		let budget = inner.scopes.entry(scope.to_string()).or_default();
		if quota.remaining.is_some() {
			budget.remaining = quota.remaining;
		}

		let remaining = quota.remaining?;
		let reset_after = quota.reset_after?;
		if remaining > low_water {
			return None;
		}
		let until = Instant::now() + reset_after;
		budget.next_allowed = budget.next_allowed.max(Some(until));
		Some(until)
	}
}

/// Wraps side-channel calls with budget checks and 429 retries.
#[derive(Debug)]
pub struct Executor {
	budgets: BudgetRegistry,
	config: RateLimitConfig,
}

impl Executor {
	pub fn new(config: RateLimitConfig) -> Self {
		Self {
			budgets: BudgetRegistry::new(),
			config,
		}
	}

	pub fn budgets(&self) -> &BudgetRegistry {
		&self.budgets
	}

	/// Runs `call` against `scope`, retrying rate-limited attempts.
	///
	/// `call` is invoked once per attempt. Cancellation is honoured before
	/// every attempt and while waiting; an attempt that already started always
	/// runs to completion.
	///
	/// # Errors
	///
	/// * the last [`Error::RateLimited`] once `max_retries` is exhausted
	/// * any other error from `call`, unchanged and without retry
	/// * [`Error::Cancelled`] if `cancel` fires between attempts
	pub async fn execute<T, F, Fut>(&self, scope: &str, cancel: &CancellationToken, mut call: F) -> Result<Executed<T>>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<Reply<T>>>,
	{
		let mut attempts = 0;
		loop {
			self.wait_turn(scope, cancel).await?;
			if cancel.is_cancelled() {
				return Err(Error::Cancelled);
			}

			attempts += 1;
			match call().await {
				Ok(reply) => {
					if let Some(until) = self.budgets.observe(scope, &reply.quota, self.config.low_water) {
						debug!(
							target = "cordwire.executor",
							scope,
							remaining = reply.quota.remaining,
							cooldown_ms = until.saturating_duration_since(Instant::now()).as_millis() as u64,
							"quota low; cooling scope down"
						);
					}
					return Ok(Executed { value: reply.value, attempts });
				}
				Err(Error::RateLimited { retry_after, global, .. }) if attempts <= self.config.max_retries => {
					let wait = retry_after + self.config.safety_margin();
					let until = Instant::now() + wait;
					if global {
						self.budgets.defer_global(until);
					} else {
						self.budgets.defer(scope, until);
					}
					warn!(
						target = "cordwire.executor",
						scope,
						global,
						attempt = attempts,
						wait_ms = wait.as_millis() as u64,
						"rate limited; retrying"
					);
				}
				Err(err) => return Err(err),
			}
		}
	}

	async fn wait_turn(&self, scope: &str, cancel: &CancellationToken) -> Result<()> {
		while let Some(at) = self.budgets.ready_at(scope) {
			debug!(
				target = "cordwire.executor",
				scope,
				wait_ms = at.saturating_duration_since(Instant::now()).as_millis() as u64,
				"waiting for budget"
			);
			tokio::select! {
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				_ = sleep_until(at) => {}
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;

	fn config() -> RateLimitConfig {
		RateLimitConfig {
			max_retries: 2,
			safety_margin_ms: 100,
			low_water: 0,
		}
	}

	fn limited(ms: u64) -> Error {
		Error::RateLimited {
			scope: "route".into(),
			retry_after: Duration::from_millis(ms),
			global: false,
		}
	}

	#[tokio::test(start_paused = true)]
	async fn retries_after_hint_plus_margin() {
		let executor = Executor::new(config());
		let cancel = CancellationToken::new();
		let calls = AtomicU32::new(0);
		let start = Instant::now();

		let executed = executor
			.execute("channel:1", &cancel, || {
				let n = calls.fetch_add(1, Ordering::SeqCst);
				async move { if n == 0 { Err(limited(1200)) } else { Ok(Reply::new(Instant::now())) } }
			})
			.await
			.unwrap();

		assert_eq!(executed.attempts, 2);
		assert_eq!(executed.retries(), 1);
		assert!(executed.value - start >= Duration::from_millis(1300));
	}

	#[tokio::test(start_paused = true)]
	async fn gives_up_after_max_retries_with_last_error() {
		let executor = Executor::new(config());
		let cancel = CancellationToken::new();
		let calls = AtomicU32::new(0);

		let result: Result<Executed<()>> = executor
			.execute("channel:1", &cancel, || {
				calls.fetch_add(1, Ordering::SeqCst);
				async { Err(limited(10)) }
			})
			.await;

		assert!(matches!(result, Err(Error::RateLimited { .. })));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn other_errors_are_not_retried() {
		let executor = Executor::new(config());
		let cancel = CancellationToken::new();
		let calls = AtomicU32::new(0);

		let result: Result<Executed<()>> = executor
			.execute("channel:1", &cancel, || {
				calls.fetch_add(1, Ordering::SeqCst);
				async {
					Err(Error::Http {
						status: 403,
						body: "missing access".into(),
					})
				}
			})
			.await;

		assert!(matches!(result, Err(Error::Http { status: 403, .. })));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn cooldown_applies_to_same_scope_only() {
		let executor = Arc::new(Executor::new(config()));
		let cancel = CancellationToken::new();
		let start = Instant::now();
		executor.budgets().defer("channel:1", start + Duration::from_secs(2));

		let other = executor.execute("channel:2", &cancel, || async { Ok(Reply::new(Instant::now())) }).await.unwrap();
		assert_eq!(other.value, start);

		let same = executor.execute("channel:1", &cancel, || async { Ok(Reply::new(Instant::now())) }).await.unwrap();
		assert!(same.value - start >= Duration::from_secs(2));
	}

	#[tokio::test(start_paused = true)]
	async fn limited_scope_cools_down_while_other_scopes_proceed() {
		let executor = Executor::new(config());
		let cancel = CancellationToken::new();
		let calls = AtomicU32::new(0);
		let start = Instant::now();
		let now = || async { Ok(Reply::new(Instant::now())) };

		let limited_call = executor.execute("channel:1", &cancel, || {
			let n = calls.fetch_add(1, Ordering::SeqCst);
			async move { if n == 0 { Err(limited(1200)) } else { Ok(Reply::new(Instant::now())) } }
		});
		let same_scope = async {
			tokio::time::sleep(Duration::from_millis(10)).await;
			executor.execute("channel:1", &cancel, now).await
		};
		let other_scope = async {
			tokio::time::sleep(Duration::from_millis(10)).await;
			executor.execute("channel:2", &cancel, now).await
		};
		let (limited_call, same_scope, other_scope) = tokio::join!(limited_call, same_scope, other_scope);

		assert_eq!(other_scope.unwrap().value - start, Duration::from_millis(10));
		assert!(same_scope.unwrap().value - start >= Duration::from_millis(1300));
		let retried = limited_call.unwrap();
		assert_eq!(retried.attempts, 2);
		assert!(retried.value - start >= Duration::from_millis(1300));
	}

	#[tokio::test(start_paused = true)]
	async fn low_quota_defers_next_call_preemptively() {
		let executor = Executor::new(RateLimitConfig {
			low_water: 1,
			..config()
		});
		let cancel = CancellationToken::new();
		let start = Instant::now();

		executor
			.execute("channel:1", &cancel, || async {
				Ok(Reply::new(()).with_quota(QuotaHint {
					remaining: Some(1),
					reset_after: Some(Duration::from_millis(800)),
				}))
			})
			.await
			.unwrap();
		assert_eq!(executor.budgets().budget("channel:1").remaining, Some(1));

		let next = executor.execute("channel:1", &cancel, || async { Ok(Reply::new(Instant::now())) }).await.unwrap();
		assert!(next.value - start >= Duration::from_millis(800));
	}

	#[tokio::test(start_paused = true)]
	async fn global_limit_defers_every_scope() {
		let executor = Executor::new(config());
		let cancel = CancellationToken::new();
		let start = Instant::now();
		let calls = AtomicU32::new(0);

		executor
			.execute("channel:1", &cancel, || {
				let n = calls.fetch_add(1, Ordering::SeqCst);
				async move {
					if n == 0 {
						Err(Error::RateLimited {
							scope: "route".into(),
							retry_after: Duration::from_secs(1),
							global: true,
						})
					} else {
						Ok(Reply::new(()))
					}
				}
			})
			.await
			.unwrap();

		let other = executor.execute("channel:2", &cancel, || async { Ok(Reply::new(Instant::now())) }).await.unwrap();
		assert!(other.value - start >= Duration::from_millis(1100));
	}

	#[tokio::test(start_paused = true)]
	async fn cancellation_interrupts_budget_wait() {
		let executor = Executor::new(config());
		let cancel = CancellationToken::new();
		executor.budgets().defer("channel:1", Instant::now() + Duration::from_secs(60));

		let canceller = cancel.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_secs(1)).await;
			canceller.cancel();
		});

		let result: Result<Executed<()>> = executor.execute("channel:1", &cancel, || async { Ok(Reply::new(())) }).await;
		assert!(matches!(result, Err(Error::Cancelled)));
	}

	#[test]
	fn deferrals_never_move_backwards() {
		let registry = BudgetRegistry::new();
		let now = Instant::now();
		registry.defer("s", now + Duration::from_secs(5));
		registry.defer("s", now + Duration::from_secs(1));
		assert_eq!(registry.budget("s").next_allowed, Some(now + Duration::from_secs(5)));
	}
}
