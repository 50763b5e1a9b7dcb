//! Typed decoding of dispatch (op 0) frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::interaction::InteractionAck;
use crate::member_list::GuildMemberListUpdate;
use crate::message::{Message, User};

pub const EVENT_READY: &str = "READY";
pub const EVENT_GUILD_MEMBER_LIST_UPDATE: &str = "GUILD_MEMBER_LIST_UPDATE";
pub const EVENT_MESSAGE_CREATE: &str = "MESSAGE_CREATE";
pub const EVENT_INTERACTION_SUCCESS: &str = "INTERACTION_SUCCESS";
pub const EVENT_INTERACTION_FAILURE: &str = "INTERACTION_FAILURE";

/// Payload of `READY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ready {
	pub session_id: String,
	pub user: User,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub resume_gateway_url: Option<String>,
}

/// A dispatch event decoded by type.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
	Ready(Ready),
	GuildMemberListUpdate(GuildMemberListUpdate),
	MessageCreate(Box<Message>),
	InteractionSuccess(Box<InteractionAck>),
	InteractionFailure(InteractionAck),
	/// Event types the client does not interpret.
	Other { kind: String, data: Value },
}

impl DispatchEvent {
	/// Decodes the `d` payload according to the `t` event type.
	pub fn decode(kind: &str, data: Value) -> serde_json::Result<Self> {
		Ok(match kind {
			EVENT_READY => DispatchEvent::Ready(serde_json::from_value(data)?),
			EVENT_GUILD_MEMBER_LIST_UPDATE => DispatchEvent::GuildMemberListUpdate(serde_json::from_value(data)?),
			EVENT_MESSAGE_CREATE => DispatchEvent::MessageCreate(Box::new(serde_json::from_value(data)?)),
			EVENT_INTERACTION_SUCCESS => DispatchEvent::InteractionSuccess(Box::new(serde_json::from_value(data)?)),
			EVENT_INTERACTION_FAILURE => DispatchEvent::InteractionFailure(serde_json::from_value(data)?),
			_ => DispatchEvent::Other {
				kind: kind.to_string(),
				data,
			},
		})
	}

	pub fn kind(&self) -> &str {
		match self {
			DispatchEvent::Ready(_) => EVENT_READY,
			DispatchEvent::GuildMemberListUpdate(_) => EVENT_GUILD_MEMBER_LIST_UPDATE,
			DispatchEvent::MessageCreate(_) => EVENT_MESSAGE_CREATE,
			DispatchEvent::InteractionSuccess(_) => EVENT_INTERACTION_SUCCESS,
			DispatchEvent::InteractionFailure(_) => EVENT_INTERACTION_FAILURE,
			DispatchEvent::Other { kind, .. } => kind,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn ready_is_decoded() {
		let event = DispatchEvent::decode(EVENT_READY, json!({"session_id": "s1", "user": {"id": "u1", "username": "me"}})).unwrap();
		match event {
			DispatchEvent::Ready(ready) => {
				assert_eq!(ready.session_id, "s1");
				assert_eq!(ready.user.id, "u1");
			}
			other => panic!("expected READY, got {other:?}"),
		}
	}

	#[test]
	fn unknown_events_pass_through() {
		let event = DispatchEvent::decode("TYPING_START", json!({"x": 1})).unwrap();
		assert_eq!(event.kind(), "TYPING_START");
		assert!(matches!(event, DispatchEvent::Other { .. }));
	}

	#[test]
	fn malformed_known_event_is_an_error() {
		assert!(DispatchEvent::decode(EVENT_MESSAGE_CREATE, json!({"id": 5})).is_err());
	}
}
