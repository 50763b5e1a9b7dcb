//! Session transport.
//!
//! A [`Session`] owns one push-channel connection. A background driver task
//! reads frames in order, answers Hello with Identify, keeps the heartbeat
//! going, records the last sequence number and fans every dispatch out to the
//! subscribers returned by [`Session::subscribe`].
//!
//! # Message Flow
//!
//! 1. `connect()` spawns the transport receiver and the driver
//! 2. Hello arrives: the driver arms the heartbeat timer and sends Identify
//! 3. READY arrives: the session id is stored and `connect()` returns
//! 4. Dispatches are decoded once and shared with every subscriber
//! 5. On transport failure every subscriber receives [`SessionEvent::Closed`]

use std::sync::Arc;
use std::time::Duration;

use cordwire_protocol::{DispatchEvent, GatewayFrame, HelloPayload, IdentifyPayload, OpCode};
use cordwire_runtime::{Transport, TransportParts, WebSocketTransport};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::state::SessionState;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::timers::{TimerName, Timers};

/// Item delivered to subscribers, in arrival order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
	Dispatch(Arc<DispatchEvent>),
	/// The connection is gone; carries the reason. Always the last item.
	Closed(String),
}

/// Ordered stream of session events for one subscriber.
pub struct DispatchStream {
	rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl DispatchStream {
	/// Next event, or `None` once the session has been closed and drained.
	pub async fn next(&mut self) -> Option<SessionEvent> {
		self.rx.recv().await
	}
}

#[derive(Default)]
struct Subscribers {
	list: Vec<mpsc::UnboundedSender<SessionEvent>>,
	closed: Option<String>,
}

struct Shared {
	state: watch::Sender<SessionState>,
	sequence: Mutex<Option<u64>>,
	session_id: RwLock<Option<String>>,
	user_id: RwLock<Option<String>>,
	heartbeat_interval: Mutex<Option<Duration>>,
	subscribers: Mutex<Subscribers>,
	sender: AsyncMutex<Box<dyn Transport>>,
	shutdown: CancellationToken,
}

impl Shared {
	fn state(&self) -> SessionState {
		*self.state.borrow()
	}

	fn set_state(&self, next: SessionState) -> Result<()> {
		let mut outcome = Ok(());
		self.state.send_if_modified(|current| match current.transition(next) {
			Ok(state) => {
				debug!(target = "cordwire.gateway", from = %current, to = %state, "session state");
				*current = state;
				true
			}
			Err(err) => {
				outcome = Err(err);
				false
			}
		});
		outcome
	}

	fn record_sequence(&self, sequence: u64) {
		let mut current = self.sequence.lock();
		if current.is_none_or(|seen| sequence > seen) {
			*current = Some(sequence);
		}
	}

	async fn send(&self, frame: GatewayFrame) -> Result<()> {
		trace!(target = "cordwire.gateway", op = frame.op, "send frame");
		self.sender.lock().await.send(frame).await.map_err(Error::from)
	}

	fn broadcast(&self, event: SessionEvent) {
		let mut subscribers = self.subscribers.lock();
		subscribers.list.retain(|tx| tx.send(event.clone()).is_ok());
	}

	async fn finish(&self, failure: Option<String>) {
		let reason = failure.clone().unwrap_or_else(|| "session closed".to_string());

		let _ = self.sender.lock().await.close().await;

		let list = {
			let mut subscribers = self.subscribers.lock();
			subscribers.closed = Some(reason.clone());
			std::mem::take(&mut subscribers.list)
		};
		if self.state() != SessionState::Closed {
			let _ = self.set_state(SessionState::Closed);
		}
		for tx in list {
			let _ = tx.send(SessionEvent::Closed(reason.clone()));
		}

		match failure {
			Some(reason) => warn!(target = "cordwire.gateway", %reason, "session terminated"),
			None => info!(target = "cordwire.gateway", "session closed"),
		}
	}
}

/// One live push-channel session.
pub struct Session {
	shared: Arc<Shared>,
	driver: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
	/// Opens a websocket to `config.gateway_url` and negotiates a session.
	pub async fn connect_url(credential: &str, config: &ClientConfig) -> Result<Self> {
		let (transport, message_rx) = WebSocketTransport::connect(&config.gateway_url).await?;
		Self::connect(transport.into_transport_parts(message_rx), credential, config).await
	}

	/// Drives `parts` through Hello and Identify, returning once READY arrives.
	///
	/// # Errors
	///
	/// * [`Error::ProtocolTimeout`] if Hello or READY do not arrive in time
	/// * [`Error::Transport`] if the connection drops during negotiation
	pub async fn connect(parts: TransportParts, credential: &str, config: &ClientConfig) -> Result<Self> {
		let TransportParts {
			sender,
			receiver,
			message_rx,
		} = parts;

		let (state, _) = watch::channel(SessionState::Disconnected);
		let shared = Arc::new(Shared {
			state,
			sequence: Mutex::new(None),
			session_id: RwLock::new(None),
			user_id: RwLock::new(None),
			heartbeat_interval: Mutex::new(None),
			subscribers: Mutex::new(Subscribers::default()),
			sender: AsyncMutex::new(sender),
			shutdown: CancellationToken::new(),
		});
		shared.set_state(SessionState::AwaitingHello)?;

		let driver = Driver {
			shared: Arc::clone(&shared),
			identify: IdentifyPayload::new(credential, config.capabilities, config.properties.clone()),
			message_rx,
			receiver: tokio::spawn(receiver.run()),
			timers: Timers::new(),
			awaiting_ack: false,
			missed_acks: 0,
			max_missed_acks: config.max_missed_acks,
		};
		let session = Session {
			shared,
			driver: Mutex::new(Some(tokio::spawn(driver.run()))),
		};

		let negotiated = async {
			session.wait_until("HELLO", config.hello_timeout(), |s| s != SessionState::AwaitingHello).await?;
			session.wait_until("READY", config.ready_timeout(), |s| s == SessionState::Ready).await
		};
		if let Err(err) = negotiated.await {
			session.close().await;
			return Err(err);
		}

		let session_id = session.session_id().unwrap_or_default();
		let user_id = session.user_id().unwrap_or_default();
		info!(target = "cordwire.gateway", %session_id, %user_id, "session ready");
		Ok(session)
	}

	async fn wait_until(&self, stage: &'static str, timeout: Duration, reached: impl Fn(SessionState) -> bool) -> Result<()> {
		let mut rx = self.shared.state.subscribe();
		let waited = tokio::time::timeout(timeout, rx.wait_for(|s| reached(*s) || s.is_terminal())).await;
		let state = match waited {
			Ok(Ok(state)) => *state,
			Ok(Err(_)) => return Err(Error::ChannelClosed),
			Err(_) => return Err(Error::ProtocolTimeout { stage, timeout }),
		};
		if reached(state) {
			return Ok(());
		}
		Err(Error::Transport(self.closed_reason().unwrap_or_else(|| format!("session {state} before {stage}"))))
	}

	pub fn state(&self) -> SessionState {
		self.shared.state()
	}

	/// Opaque id issued with READY.
	pub fn session_id(&self) -> Option<String> {
		self.shared.session_id.read().clone()
	}

	/// Session id, or [`Error::NotReady`] if READY was never received.
	pub fn require_session_id(&self) -> Result<String> {
		self.session_id().ok_or(Error::NotReady)
	}

	pub fn user_id(&self) -> Option<String> {
		self.shared.user_id.read().clone()
	}

	/// Last sequence number seen on the push channel.
	pub fn sequence(&self) -> Option<u64> {
		*self.shared.sequence.lock()
	}

	pub fn heartbeat_interval(&self) -> Option<Duration> {
		*self.shared.heartbeat_interval.lock()
	}

	/// Reason the session ended, once it has.
	pub fn closed_reason(&self) -> Option<String> {
		self.shared.subscribers.lock().closed.clone()
	}

	/// Writes a frame on the push channel.
	pub async fn send(&self, frame: GatewayFrame) -> Result<()> {
		if !self.state().is_live() {
			return Err(Error::NotReady);
		}
		self.shared.send(frame).await
	}

	/// Subscribes to dispatches received from now on.
	///
	/// Subscribing to a closed session yields a single [`SessionEvent::Closed`].
	pub fn subscribe(&self) -> DispatchStream {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut subscribers = self.shared.subscribers.lock();
		match &subscribers.closed {
			Some(reason) => {
				let _ = tx.send(SessionEvent::Closed(reason.clone()));
			}
			None => subscribers.list.push(tx),
		}
		DispatchStream { rx }
	}

	/// Tears the session down.
	///
	/// Cancels the heartbeat, closes the socket best-effort and notifies every
	/// subscriber. Safe to call repeatedly and after a transport failure.
	pub async fn close(&self) {
		if self.state().is_live() {
			let _ = self.shared.set_state(SessionState::Closing);
		}
		self.shared.shutdown.cancel();
		let driver = self.driver.lock().take();
		if let Some(driver) = driver {
			let _ = driver.await;
		}
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		self.shared.shutdown.cancel();
	}
}

struct Driver {
	shared: Arc<Shared>,
	identify: IdentifyPayload,
	message_rx: mpsc::UnboundedReceiver<GatewayFrame>,
	receiver: JoinHandle<cordwire_runtime::Result<()>>,
	timers: Timers,
	awaiting_ack: bool,
	missed_acks: u32,
	max_missed_acks: u32,
}

impl Driver {
	async fn run(mut self) {
		let shutdown = self.shared.shutdown.clone();
		let failure = loop {
			tokio::select! {
				biased;
				_ = shutdown.cancelled() => break None,
				frame = self.message_rx.recv() => match frame {
					Some(frame) => {
						if let Err(err) = self.handle_frame(frame).await {
							break Some(err.to_string());
						}
					}
					None => break Some(self.receiver_outcome().await),
				},
				name = self.timers.fired() => {
					if let Err(err) = self.on_timer(name).await {
						break Some(err.to_string());
					}
				}
			}
		};

		self.timers.cancel_all();
		self.receiver.abort();
		self.shared.finish(failure).await;
	}

	async fn receiver_outcome(&mut self) -> String {
		match (&mut self.receiver).await {
			Ok(Ok(())) => "connection closed by peer".to_string(),
			Ok(Err(err)) => err.to_string(),
			Err(err) => format!("receiver task failed: {err}"),
		}
	}

	async fn handle_frame(&mut self, frame: GatewayFrame) -> Result<()> {
		if let Some(sequence) = frame.s {
			self.shared.record_sequence(sequence);
		}

		match frame.opcode() {
			OpCode::Hello => self.on_hello(serde_json::from_value(frame.d)?).await?,
			OpCode::HeartbeatAck => {
				trace!(target = "cordwire.gateway", "heartbeat acknowledged");
				self.awaiting_ack = false;
				self.missed_acks = 0;
			}
			OpCode::Heartbeat => self.send_heartbeat().await?,
			OpCode::Reconnect => return Err(Error::Transport("server requested reconnect".to_string())),
			OpCode::InvalidSession => return Err(Error::Transport("session invalidated by server".to_string())),
			OpCode::Dispatch => self.on_dispatch(frame),
			other => debug!(target = "cordwire.gateway", op = other.code(), "ignoring frame"),
		}
		Ok(())
	}

	async fn on_hello(&mut self, hello: HelloPayload) -> Result<()> {
		let interval = Duration::from_millis(hello.heartbeat_interval);
		*self.shared.heartbeat_interval.lock() = Some(interval);
		self.timers.arm_in(TimerName::Heartbeat, interval);

		if self.shared.state() != SessionState::AwaitingHello {
			warn!(target = "cordwire.gateway", interval_ms = hello.heartbeat_interval, "duplicate hello; heartbeat interval updated");
			return Ok(());
		}

		debug!(target = "cordwire.gateway", interval_ms = hello.heartbeat_interval, "hello received; identifying");
		self.shared.send(GatewayFrame::identify(&self.identify)?).await?;
		self.shared.set_state(SessionState::Identifying)
	}

	fn on_dispatch(&mut self, frame: GatewayFrame) {
		let Some(kind) = frame.t else {
			warn!(target = "cordwire.gateway", "dispatch frame without event type");
			return;
		};

		let event = match DispatchEvent::decode(&kind, frame.d.clone()) {
			Ok(event) => event,
			Err(err) => {
				warn!(target = "cordwire.gateway", event = %kind, error = %err, "undecodable dispatch payload; passing through raw");
				DispatchEvent::Other { kind, data: frame.d }
			}
		};

		if let DispatchEvent::Ready(ready) = &event {
			*self.shared.session_id.write() = Some(ready.session_id.clone());
			*self.shared.user_id.write() = Some(ready.user.id.clone());
			if self.shared.state() == SessionState::Identifying {
				let _ = self.shared.set_state(SessionState::Ready);
			}
		}

		self.shared.broadcast(SessionEvent::Dispatch(Arc::new(event)));
	}

	async fn on_timer(&mut self, name: TimerName) -> Result<()> {
		if name != TimerName::Heartbeat {
			return Ok(());
		}

		if self.awaiting_ack {
			self.missed_acks += 1;
			warn!(target = "cordwire.gateway", missed = self.missed_acks, "heartbeat not acknowledged");
			if self.max_missed_acks > 0 && self.missed_acks >= self.max_missed_acks {
				return Err(Error::Transport(format!("no heartbeat ack for {} intervals", self.missed_acks)));
			}
		}

		self.send_heartbeat().await?;
		if let Some(interval) = *self.shared.heartbeat_interval.lock() {
			self.timers.arm_in(TimerName::Heartbeat, interval);
		}
		Ok(())
	}

	async fn send_heartbeat(&mut self) -> Result<()> {
		let sequence = *self.shared.sequence.lock();
		self.awaiting_ack = true;
		self.shared.send(GatewayFrame::heartbeat(sequence)).await
	}
}
