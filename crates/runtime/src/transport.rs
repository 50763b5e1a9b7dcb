//! Transport traits shared by the websocket and fake transports.

use std::future::Future;
use std::pin::Pin;

use cordwire_protocol::GatewayFrame;
use tokio::sync::mpsc;

use crate::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Writing half of a push-channel connection.
pub trait Transport: Send {
	/// Serializes and writes one frame.
	fn send(&mut self, frame: GatewayFrame) -> BoxFuture<'_, Result<()>>;

	/// Best-effort close handshake. Calling it twice is harmless.
	fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Reading half of a push-channel connection.
pub trait TransportReceiver: Send {
	/// Reads until the connection ends, forwarding decoded frames.
	///
	/// Returns `Ok(())` on a clean end of stream and an error describing why
	/// the connection dropped otherwise.
	fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}

/// Everything the session layer needs to drive one connection.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<GatewayFrame>,
}
