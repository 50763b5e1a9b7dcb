//! Gateway frame envelope and opcode table.
//!
//! Every push-channel message has the shape:
//!
//! ```json
//! { "op": 0, "t": "READY", "d": { ... }, "s": 1 }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::identify::IdentifyPayload;
use crate::member_list::{ChannelRanges, MemberListSubscription};

/// Gateway opcodes understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
	/// Server-pushed event (`t` names the event type).
	Dispatch,
	/// Heartbeat, sent by the client or requested by the server.
	Heartbeat,
	/// Session negotiation carrying the credential.
	Identify,
	/// Server asks the client to reconnect.
	Reconnect,
	/// The session was invalidated.
	InvalidSession,
	/// First frame after connect; carries the heartbeat interval.
	Hello,
	/// Acknowledgment of a client heartbeat.
	HeartbeatAck,
	/// Windowed member-list subscription for a single guild.
	GuildSubscriptions,
	/// Broader subscription covering several guilds at once.
	GuildSubscriptionsBulk,
	/// Opcode not known to this client.
	Unknown(u8),
}

impl OpCode {
	pub fn code(self) -> u8 {
		match self {
			OpCode::Dispatch => 0,
			OpCode::Heartbeat => 1,
			OpCode::Identify => 2,
			OpCode::Reconnect => 7,
			OpCode::InvalidSession => 9,
			OpCode::Hello => 10,
			OpCode::HeartbeatAck => 11,
			OpCode::GuildSubscriptions => 14,
			OpCode::GuildSubscriptionsBulk => 37,
			OpCode::Unknown(code) => code,
		}
	}
}

impl From<u8> for OpCode {
	fn from(code: u8) -> Self {
		match code {
			0 => OpCode::Dispatch,
			1 => OpCode::Heartbeat,
			2 => OpCode::Identify,
			7 => OpCode::Reconnect,
			9 => OpCode::InvalidSession,
			10 => OpCode::Hello,
			11 => OpCode::HeartbeatAck,
			14 => OpCode::GuildSubscriptions,
			37 => OpCode::GuildSubscriptionsBulk,
			other => OpCode::Unknown(other),
		}
	}
}

/// A single push-channel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
	pub op: u8,
	/// Event type, present on dispatch frames only.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub t: Option<String>,
	#[serde(default)]
	pub d: Value,
	/// Sequence number, present on dispatch frames only.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub s: Option<u64>,
}

impl GatewayFrame {
	pub fn new(op: OpCode, d: Value) -> Self {
		Self {
			op: op.code(),
			t: None,
			d,
			s: None,
		}
	}

	pub fn opcode(&self) -> OpCode {
		OpCode::from(self.op)
	}

	/// Heartbeat echoing the last sequence seen (`null` before the first dispatch).
	pub fn heartbeat(sequence: Option<u64>) -> Self {
		Self::new(OpCode::Heartbeat, sequence.map_or(Value::Null, Value::from))
	}

	pub fn identify(payload: &IdentifyPayload) -> serde_json::Result<Self> {
		Ok(Self::new(OpCode::Identify, serde_json::to_value(payload)?))
	}

	/// Op 14: request member-list windows for the channels of one guild.
	pub fn guild_subscriptions(subscription: &MemberListSubscription) -> serde_json::Result<Self> {
		Ok(Self::new(OpCode::GuildSubscriptions, serde_json::to_value(subscription)?))
	}

	/// Op 37: subscribe to typing, threads and activities of a guild, optionally
	/// with member-list windows.
	pub fn guild_subscriptions_bulk(guild_id: &str, channels: &ChannelRanges) -> Self {
		Self::new(
			OpCode::GuildSubscriptionsBulk,
			json!({
				"subscriptions": {
					guild_id: {
						"typing": true,
						"threads": true,
						"activities": true,
						"channels": channels,
					}
				}
			}),
		)
	}

	/// Dispatch frame, as the server would push it.
	pub fn dispatch(event: &str, sequence: u64, d: Value) -> Self {
		Self {
			op: OpCode::Dispatch.code(),
			t: Some(event.to_string()),
			d,
			s: Some(sequence),
		}
	}

	pub fn hello(heartbeat_interval_ms: u64) -> Self {
		Self::new(OpCode::Hello, json!({ "heartbeat_interval": heartbeat_interval_ms }))
	}

	pub fn heartbeat_ack() -> Self {
		Self::new(OpCode::HeartbeatAck, Value::Null)
	}
}

/// Payload of a Hello frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
	pub heartbeat_interval: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn opcode_table_round_trips_known_codes() {
		for code in [0u8, 1, 2, 7, 9, 10, 11, 14, 37] {
			assert_eq!(OpCode::from(code).code(), code);
		}
		assert_eq!(OpCode::from(42), OpCode::Unknown(42));
	}

	#[test]
	fn heartbeat_echoes_sequence_or_null() {
		assert_eq!(GatewayFrame::heartbeat(Some(7)).d, json!(7));
		assert_eq!(GatewayFrame::heartbeat(None).d, Value::Null);
	}

	#[test]
	fn frame_without_dispatch_fields_omits_them() {
		let text = serde_json::to_string(&GatewayFrame::heartbeat(Some(3))).unwrap();
		assert_eq!(text, r#"{"op":1,"d":3}"#);
	}

	#[test]
	fn dispatch_frame_deserializes() {
		let frame: GatewayFrame = serde_json::from_str(r#"{"op":0,"t":"READY","s":1,"d":{"session_id":"abc"}}"#).unwrap();
		assert_eq!(frame.opcode(), OpCode::Dispatch);
		assert_eq!(frame.t.as_deref(), Some("READY"));
		assert_eq!(frame.s, Some(1));
		assert_eq!(frame.d["session_id"], "abc");
	}

	#[test]
	fn hello_frame_tolerates_null_fields() {
		let frame: GatewayFrame = serde_json::from_str(r#"{"op":10,"t":null,"s":null,"d":{"heartbeat_interval":41250}}"#).unwrap();
		let hello: HelloPayload = serde_json::from_value(frame.d).unwrap();
		assert_eq!(hello.heartbeat_interval, 41250);
	}

	#[test]
	fn bulk_subscription_nests_under_guild() {
		let mut channels = ChannelRanges::new();
		channels.insert("c1".into(), vec![[0, 99]]);
		let frame = GatewayFrame::guild_subscriptions_bulk("g1", &channels);
		assert_eq!(frame.op, 37);
		assert_eq!(frame.d["subscriptions"]["g1"]["channels"]["c1"], json!([[0, 99]]));
		assert_eq!(frame.d["subscriptions"]["g1"]["typing"], true);
	}
}
