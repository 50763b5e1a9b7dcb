//! Side-channel interaction requests and their push-channel acknowledgments.

use serde::{Deserialize, Serialize};

use crate::message::{COMPONENT_BUTTON, Message};

/// Interaction type invoking an application command.
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;
/// Interaction type activating a message component.
pub const INTERACTION_MESSAGE_COMPONENT: u8 = 3;

/// Registered command metadata supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRef {
	pub application_id: String,
	pub id: String,
	pub version: String,
	pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandData {
	pub version: String,
	pub id: String,
	pub name: String,
	#[serde(rename = "type")]
	pub kind: u8,
	pub options: Vec<serde_json::Value>,
	pub attachments: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentData {
	pub component_type: u8,
	pub custom_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InteractionData {
	Command(CommandData),
	Component(ComponentData),
}

/// JSON carried in the `payload_json` multipart field of an interaction POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRequest {
	#[serde(rename = "type")]
	pub kind: u8,
	pub application_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub guild_id: Option<String>,
	pub channel_id: String,
	pub session_id: String,
	pub nonce: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message_flags: Option<u64>,
	pub data: InteractionData,
}

impl InteractionRequest {
	/// Invocation of a registered application command (`type = 2`).
	pub fn command(
		command: &CommandRef,
		guild_id: Option<String>,
		channel_id: impl Into<String>,
		session_id: impl Into<String>,
		nonce: impl Into<String>,
	) -> Self {
		Self {
			kind: INTERACTION_APPLICATION_COMMAND,
			application_id: command.application_id.clone(),
			guild_id,
			channel_id: channel_id.into(),
			session_id: session_id.into(),
			nonce: nonce.into(),
			message_id: None,
			message_flags: None,
			data: InteractionData::Command(CommandData {
				version: command.version.clone(),
				id: command.id.clone(),
				name: command.name.clone(),
				kind: 1,
				options: Vec::new(),
				attachments: Vec::new(),
			}),
		}
	}

	/// Button activation on an existing message (`type = 3`).
	pub fn button(target: &ComponentTarget, session_id: impl Into<String>, nonce: impl Into<String>) -> Self {
		Self {
			kind: INTERACTION_MESSAGE_COMPONENT,
			application_id: target.application_id.clone(),
			guild_id: target.guild_id.clone(),
			channel_id: target.channel_id.clone(),
			session_id: session_id.into(),
			nonce: nonce.into(),
			message_id: Some(target.message_id.clone()),
			message_flags: Some(target.message_flags),
			data: InteractionData::Component(ComponentData {
				component_type: COMPONENT_BUTTON,
				custom_id: target.custom_id.clone(),
			}),
		}
	}
}

/// Addressing information for a component activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentTarget {
	pub application_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub guild_id: Option<String>,
	pub channel_id: String,
	pub message_id: String,
	pub message_flags: u64,
	pub custom_id: String,
}

/// Payload of `INTERACTION_CREATE`, `INTERACTION_SUCCESS` and `INTERACTION_FAILURE`.
///
/// Responses only visible to the invoking identity may embed the resulting
/// message directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionAck {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<Message>,
}
