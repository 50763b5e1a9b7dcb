//! One-shot entry points composing session, collector and correlator.

use std::sync::Arc;

use cordwire_runtime::TransportParts;
use tokio_util::sync::CancellationToken;

use crate::collector::{CollectOutcome, CollectRequest, Collector};
use crate::config::ClientConfig;
use crate::correlator::{ClickOutcome, ClickSpec, Correlator, TriggerSpec};
use crate::error::Result;
use crate::executor::Executor;
use crate::gateway::Session;
use crate::rest::{RestClient, SideChannel};

/// Credential, configuration, side channel and rate-limit budgets of one
/// account.
///
/// The executor is shared by every workflow the client runs, so cool-downs
/// learned in one workflow apply to the next.
pub struct Client {
	credential: String,
	config: ClientConfig,
	side: Arc<dyn SideChannel>,
	executor: Arc<Executor>,
}

impl Client {
	/// Client backed by the REST side channel at `config.api_base`.
	pub fn new(credential: impl Into<String>, config: ClientConfig) -> Result<Self> {
		let credential = credential.into();
		let rest = RestClient::new(&credential, &config)?;
		Ok(Self::with_side_channel(credential, config, Arc::new(rest)))
	}

	pub fn with_side_channel(credential: impl Into<String>, config: ClientConfig, side: Arc<dyn SideChannel>) -> Self {
		let executor = Arc::new(Executor::new(config.rate_limit.clone()));
		Self {
			credential: credential.into(),
			config,
			side,
			executor,
		}
	}

	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	pub fn executor(&self) -> &Arc<Executor> {
		&self.executor
	}

	/// Opens a websocket session and waits for READY.
	pub async fn connect(&self) -> Result<Session> {
		Session::connect_url(&self.credential, &self.config).await
	}

	/// Negotiates a session over caller-supplied transport parts.
	pub async fn connect_with(&self, parts: TransportParts) -> Result<Session> {
		Session::connect(parts, &self.credential, &self.config).await
	}

	pub fn collector(&self) -> Collector {
		Collector::new(self.config.collector.clone())
	}

	pub fn correlator(&self) -> Correlator {
		Correlator::new(Arc::clone(&self.side), Arc::clone(&self.executor), self.config.correlator.clone())
	}

	/// Connects, collects one member list and closes the session.
	pub async fn collect_members(&self, request: &CollectRequest, cancel: &CancellationToken) -> Result<CollectOutcome> {
		let session = self.connect().await?;
		let outcome = self.collector().collect(&session, request, cancel).await;
		session.close().await;
		outcome
	}

	/// Connects, runs one trigger/detect/act workflow and closes the session.
	pub async fn trigger_and_act(&self, trigger: &TriggerSpec, click: &ClickSpec, cancel: &CancellationToken) -> Result<ClickOutcome> {
		let session = self.connect().await?;
		let outcome = self.correlator().trigger_and_act(&session, trigger, click, cancel).await;
		session.close().await;
		outcome
	}

	/// Connects, runs a two-phase batch over `targets` and closes the session.
	pub async fn run_batch(&self, targets: &[TriggerSpec], click: &ClickSpec, cancel: &CancellationToken) -> Result<Vec<ClickOutcome>> {
		let session = self.connect().await?;
		let outcomes = self.correlator().run_batch(&session, targets, click, cancel).await;
		session.close().await;
		Ok(outcomes)
	}
}
