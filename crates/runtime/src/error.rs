use thiserror::Error;

/// Socket-level failures. Every variant is terminal for the connection.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("websocket error: {0}")]
	WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

	#[error("connection closed (code {code:?}): {reason}")]
	Closed { code: Option<u16>, reason: String },

	#[error("malformed frame: {0}")]
	Malformed(#[from] serde_json::Error),

	#[error("transport already closed")]
	AlreadyClosed,
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		TransportError::WebSocket(Box::new(err))
	}
}

pub type Result<T> = std::result::Result<T, TransportError>;
