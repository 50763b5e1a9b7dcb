//! Fake transport for unit testing session negotiation and event dispatch.
//!
//! Provides an in-memory transport for exercising the session layer without
//! a gateway.
//!
//! # Example
//!
//! ```ignore
//! let (parts, controller) = FakeTransportBuilder::new().build();
//! controller.inject_hello(41_250);
//! controller.inject_ready("session-1", "user-1");
//! let session = Session::connect(parts, "token", config).await?;
//!
//! let identify = controller.next_sent().await.unwrap();
//! assert_eq!(identify.op, 2);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cordwire_protocol::GatewayFrame;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};

use crate::transport::{BoxFuture, Transport, TransportParts, TransportReceiver};
use crate::{Result, TransportError};

enum Inbound {
	Frame(GatewayFrame),
	Fail(String),
}

/// Builder for creating fake transport instances.
#[derive(Default)]
pub struct FakeTransportBuilder {
	fail_sends: bool,
}

impl FakeTransportBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every `send` fail as if the socket were gone.
	pub fn fail_sends(mut self) -> Self {
		self.fail_sends = true;
		self
	}

	/// Build the fake transport and return both parts and a controller.
	///
	/// Returns [`TransportParts`] for creating a session and a
	/// [`FakeTransportController`] for injecting frames and inspecting sent ones.
	pub fn build(self) -> (TransportParts, FakeTransportController) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let (sent_tx, sent_rx) = mpsc::unbounded_channel();
		let sent = Arc::new(Mutex::new(Vec::new()));
		let closed = Arc::new(AtomicBool::new(false));

		let sender = FakeTransportSender {
			sent: Arc::clone(&sent),
			sent_tx,
			closed: Arc::clone(&closed),
			fail_sends: self.fail_sends,
		};

		let receiver = FakeTransportReceiver { inbound_rx, message_tx };

		let controller = FakeTransportController {
			inbound_tx,
			sent,
			sent_rx: Mutex::new(sent_rx),
			closed,
			sequence: AtomicU64::new(0),
		};

		let parts = TransportParts {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
			message_rx,
		};

		(parts, controller)
	}
}

/// Controller for injecting server frames and inspecting client frames.
pub struct FakeTransportController {
	inbound_tx: mpsc::UnboundedSender<Inbound>,
	sent: Arc<Mutex<Vec<GatewayFrame>>>,
	sent_rx: Mutex<mpsc::UnboundedReceiver<GatewayFrame>>,
	closed: Arc<AtomicBool>,
	sequence: AtomicU64,
}

impl FakeTransportController {
	/// Inject a raw frame as if the server had sent it.
	pub fn inject(&self, frame: GatewayFrame) {
		let _ = self.inbound_tx.send(Inbound::Frame(frame));
	}

	pub fn inject_hello(&self, heartbeat_interval_ms: u64) {
		self.inject(GatewayFrame::hello(heartbeat_interval_ms));
	}

	pub fn inject_heartbeat_ack(&self) {
		self.inject(GatewayFrame::heartbeat_ack());
	}

	/// Inject a dispatch frame with the next sequence number.
	///
	/// Returns the sequence number used.
	pub fn inject_dispatch(&self, event: &str, data: Value) -> u64 {
		let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
		self.inject(GatewayFrame::dispatch(event, sequence, data));
		sequence
	}

	pub fn inject_ready(&self, session_id: &str, user_id: &str) -> u64 {
		self.inject_dispatch(
			"READY",
			json!({
				"session_id": session_id,
				"user": { "id": user_id, "username": "fake" }
			}),
		)
	}

	/// Drop the connection with an error, as a socket failure would.
	pub fn fail(&self, reason: &str) {
		let _ = self.inbound_tx.send(Inbound::Fail(reason.to_string()));
	}

	/// Wait for the next frame the client writes.
	pub async fn next_sent(&self) -> Option<GatewayFrame> {
		self.sent_rx.lock().await.recv().await
	}

	/// Take all sent frames, clearing the buffer.
	pub async fn take_sent(&self) -> Vec<GatewayFrame> {
		std::mem::take(&mut *self.sent.lock().await)
	}

	/// Whether the client performed a close handshake.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}

struct FakeTransportSender {
	sent: Arc<Mutex<Vec<GatewayFrame>>>,
	sent_tx: mpsc::UnboundedSender<GatewayFrame>,
	closed: Arc<AtomicBool>,
	fail_sends: bool,
}

impl Transport for FakeTransportSender {
	fn send(&mut self, frame: GatewayFrame) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			if self.fail_sends || self.closed.load(Ordering::SeqCst) {
				return Err(TransportError::AlreadyClosed);
			}
			self.sent.lock().await.push(frame.clone());
			let _ = self.sent_tx.send(frame);
			Ok(())
		})
	}

	fn close(&mut self) -> BoxFuture<'_, Result<()>> {
		self.closed.store(true, Ordering::SeqCst);
		Box::pin(async { Ok(()) })
	}
}

struct FakeTransportReceiver {
	inbound_rx: mpsc::UnboundedReceiver<Inbound>,
	message_tx: mpsc::UnboundedSender<GatewayFrame>,
}

impl TransportReceiver for FakeTransportReceiver {
	fn run(mut self: Box<Self>) -> BoxFuture<'static, Result<()>> {
		Box::pin(async move {
			while let Some(inbound) = self.inbound_rx.recv().await {
				match inbound {
					Inbound::Frame(frame) => {
						if self.message_tx.send(frame).is_err() {
							break;
						}
					}
					Inbound::Fail(reason) => return Err(TransportError::Closed { code: None, reason }),
				}
			}
			Ok(())
		})
	}
}
