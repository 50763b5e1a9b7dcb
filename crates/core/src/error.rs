//! Error types for cordwire.

use std::time::Duration;

use cordwire_runtime::TransportError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for cordwire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when driving a session or its side channel.
#[derive(Debug, Error)]
pub enum Error {
	/// Socket-level failure. Terminal for the session and every operation on it.
	#[error("transport error: {0}")]
	Transport(String),

	/// A protocol stage did not complete in time.
	#[error("timed out after {timeout:?} waiting for {stage}")]
	ProtocolTimeout { stage: &'static str, timeout: Duration },

	/// The side channel asked us to back off.
	#[error("rate limited on {scope} (retry after {retry_after:?}, global: {global})")]
	RateLimited { scope: String, retry_after: Duration, global: bool },

	/// Non-success, non-429 side-channel response.
	#[error("HTTP {status}: {body}")]
	Http { status: u16, body: String },

	#[error("request failed: {0}")]
	Request(#[from] reqwest::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// A frame or payload violated the protocol.
	#[error("protocol error: {0}")]
	Protocol(String),

	#[error("invalid transition from {from} to {to}")]
	InvalidTransition { from: String, to: String },

	/// The session has no READY state (or was already torn down).
	#[error("session is not ready")]
	NotReady,

	#[error("operation cancelled")]
	Cancelled,

	#[error("channel closed unexpectedly")]
	ChannelClosed,

	#[error("configuration error: {0}")]
	Config(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl From<TransportError> for Error {
	fn from(err: TransportError) -> Self {
		Error::Transport(err.to_string())
	}
}

/// Flat classification used in structured outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	Transport,
	ProtocolTimeout,
	RateLimited,
	Http,
	Protocol,
	Cancelled,
	Internal,
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Transport(_) | Error::ChannelClosed => ErrorKind::Transport,
			Error::ProtocolTimeout { .. } => ErrorKind::ProtocolTimeout,
			Error::RateLimited { .. } => ErrorKind::RateLimited,
			Error::Http { .. } | Error::Request(_) => ErrorKind::Http,
			Error::Json(_) | Error::Protocol(_) | Error::NotReady => ErrorKind::Protocol,
			Error::Cancelled => ErrorKind::Cancelled,
			Error::InvalidTransition { .. } | Error::Config(_) | Error::Io(_) => ErrorKind::Internal,
		}
	}

	/// Whether the error ends the whole session rather than one operation.
	pub fn is_terminal_for_session(&self) -> bool {
		self.kind() == ErrorKind::Transport
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transport_errors_are_session_terminal() {
		let err: Error = TransportError::Closed {
			code: Some(4004),
			reason: "auth failed".into(),
		}
		.into();
		assert!(err.is_terminal_for_session());
		assert!(err.to_string().contains("auth failed"));
	}

	#[test]
	fn operation_errors_are_scoped() {
		let timeout = Error::ProtocolTimeout {
			stage: "READY",
			timeout: Duration::from_secs(5),
		};
		assert_eq!(timeout.kind(), ErrorKind::ProtocolTimeout);
		assert!(!timeout.is_terminal_for_session());

		let limited = Error::RateLimited {
			scope: "channel:1".into(),
			retry_after: Duration::from_millis(1200),
			global: false,
		};
		assert_eq!(limited.kind(), ErrorKind::RateLimited);
	}
}
