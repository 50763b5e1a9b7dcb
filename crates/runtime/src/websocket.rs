//! Websocket transport built on `tokio-tungstenite`.

use cordwire_protocol::GatewayFrame;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

use crate::transport::{BoxFuture, Transport, TransportParts, TransportReceiver};
use crate::{Result, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected websocket, not yet split into its halves.
pub struct WebSocketTransport {
	stream: WsStream,
	message_tx: mpsc::UnboundedSender<GatewayFrame>,
}

impl WebSocketTransport {
	/// Opens the websocket at `url`.
	///
	/// Returns the transport plus the receiver that will yield decoded frames
	/// once the receiving half runs.
	pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<GatewayFrame>)> {
		let (stream, response) = connect_async(url).await?;
		debug!(target = "cordwire.transport", url, status = %response.status(), "websocket connected");

		let (message_tx, message_rx) = mpsc::unbounded_channel();
		Ok((Self { stream, message_tx }, message_rx))
	}

	/// Splits the socket into the parts consumed by the session layer.
	pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<GatewayFrame>) -> TransportParts {
		let (sink, stream) = self.stream.split();
		TransportParts {
			sender: Box::new(WebSocketSender { sink, closed: false }),
			receiver: Box::new(WebSocketReceiver {
				stream,
				message_tx: self.message_tx,
			}),
			message_rx,
		}
	}
}

struct WebSocketSender {
	sink: SplitSink<WsStream, Message>,
	closed: bool,
}

impl Transport for WebSocketSender {
	fn send(&mut self, frame: GatewayFrame) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			if self.closed {
				return Err(TransportError::AlreadyClosed);
			}
			let text = serde_json::to_string(&frame)?;
			trace!(target = "cordwire.transport", op = frame.op, "send frame");
			self.sink.send(Message::Text(text.into())).await?;
			Ok(())
		})
	}

	fn close(&mut self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			if std::mem::replace(&mut self.closed, true) {
				return Ok(());
			}
			self.sink.close().await?;
			Ok(())
		})
	}
}

struct WebSocketReceiver {
	stream: SplitStream<WsStream>,
	message_tx: mpsc::UnboundedSender<GatewayFrame>,
}

impl TransportReceiver for WebSocketReceiver {
	fn run(mut self: Box<Self>) -> BoxFuture<'static, Result<()>> {
		Box::pin(async move {
			while let Some(message) = self.stream.next().await {
				match message? {
					Message::Text(text) => {
						let frame: GatewayFrame = serde_json::from_str(&text)?;
						if self.message_tx.send(frame).is_err() {
							// Session dropped its end; nothing left to deliver to.
							return Ok(());
						}
					}
					Message::Close(frame) => {
						let (code, reason) = frame.map_or((None, String::new()), |f| (Some(u16::from(f.code)), f.reason.to_string()));
						return Err(TransportError::Closed { code, reason });
					}
					Message::Binary(bytes) => {
						warn!(target = "cordwire.transport", len = bytes.len(), "ignoring binary frame; compression is not negotiated");
					}
					_ => {}
				}
			}

			Err(TransportError::Closed {
				code: None,
				reason: "stream ended".to_string(),
			})
		})
	}
}
