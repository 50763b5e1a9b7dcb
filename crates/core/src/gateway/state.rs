//! Session lifecycle state machine.

use std::fmt;

use crate::error::{Error, Result};

/// Lifecycle of one push-channel connection.
///
/// ```text
/// Disconnected -> AwaitingHello -> Identifying -> Ready -> Closing -> Closed
///                        \______________\____________\________________/
///                                 (transport failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Disconnected,
	AwaitingHello,
	Identifying,
	Ready,
	Closing,
	Closed,
}

impl SessionState {
	pub fn can_transition_to(self, next: SessionState) -> bool {
		use SessionState::*;
		matches!(
			(self, next),
			(Disconnected, AwaitingHello)
				| (AwaitingHello, Identifying)
				| (Identifying, Ready)
				| (AwaitingHello | Identifying | Ready, Closing)
				| (Disconnected | AwaitingHello | Identifying | Ready | Closing, Closed)
		)
	}

	/// Validated transition.
	pub fn transition(self, next: SessionState) -> Result<SessionState> {
		if self.can_transition_to(next) {
			Ok(next)
		} else {
			Err(Error::InvalidTransition {
				from: self.to_string(),
				to: next.to_string(),
			})
		}
	}

	pub fn is_live(self) -> bool {
		matches!(self, SessionState::AwaitingHello | SessionState::Identifying | SessionState::Ready)
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, SessionState::Closing | SessionState::Closed)
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			SessionState::Disconnected => "disconnected",
			SessionState::AwaitingHello => "awaiting_hello",
			SessionState::Identifying => "identifying",
			SessionState::Ready => "ready",
			SessionState::Closing => "closing",
			SessionState::Closed => "closed",
		};
		f.write_str(name)
	}
}
