//! Correlation of push-channel events with one triggered interaction.

use cordwire_protocol::{COMPONENT_BUTTON, ComponentTarget, DispatchEvent, InteractionAck, Message};
use serde::{Deserialize, Serialize};

use crate::nonce;

/// Route by which the resulting message was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPath {
	MessageCreate,
	InteractionSuccess,
	Fallback,
}

/// The message produced by a trigger, addressed for component activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedObject {
	pub message_id: String,
	pub channel_id: String,
	pub guild_id: Option<String>,
	pub application_id: String,
	/// Custom id of the matched component.
	pub custom_id: String,
	pub message_flags: u64,
	pub path: DetectionPath,
}

impl CapturedObject {
	pub fn target(&self) -> ComponentTarget {
		ComponentTarget {
			application_id: self.application_id.clone(),
			guild_id: self.guild_id.clone(),
			channel_id: self.channel_id.clone(),
			message_id: self.message_id.clone(),
			message_flags: self.message_flags,
			custom_id: self.custom_id.clone(),
		}
	}
}

/// Which messages count as the result of a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
	pub application_id: String,
	pub guild_id: Option<String>,
	pub channel_id: String,
	pub custom_id_prefix: String,
	/// Invoking user; messages answering someone else's interaction are skipped.
	pub invoker_id: Option<String>,
}

impl Expectation {
	/// Captures `message` if it is in the target channel, authored by the
	/// expected application and carries an enabled button with the prefix.
	pub fn capture(&self, message: &Message, path: DetectionPath) -> Option<CapturedObject> {
		if message.channel_id != self.channel_id || message.author_application() != self.application_id {
			return None;
		}
		if let (Some(expected), Some(invoker)) = (&self.invoker_id, message.interaction.as_ref().and_then(|i| i.user.as_ref())) {
			if invoker.id != *expected {
				return None;
			}
		}

		let custom_id = message
			.all_components()
			.filter(|c| c.kind == COMPONENT_BUTTON && !c.disabled)
			.filter_map(|c| c.custom_id.as_deref())
			.find(|id| id.starts_with(&self.custom_id_prefix))?;

		Some(CapturedObject {
			message_id: message.id.clone(),
			channel_id: message.channel_id.clone(),
			guild_id: message.guild_id.clone().or_else(|| self.guild_id.clone()),
			application_id: self.application_id.clone(),
			custom_id: custom_id.to_string(),
			message_flags: message.flags,
			path,
		})
	}
}

/// What a push-channel event means for a pending action.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
	Captured(CapturedObject),
	/// The server rejected the trigger.
	Failed,
	/// The trigger succeeded privately without embedding the message.
	NeedsLookup,
	Ignore,
}

/// A triggered interaction awaiting its resulting message.
#[derive(Debug, Clone)]
pub struct PendingAction {
	pub nonce: String,
	pub expectation: Expectation,
	lookup_requested: bool,
}

impl PendingAction {
	pub fn new(nonce: String, expectation: Expectation) -> Self {
		Self {
			nonce,
			expectation,
			lookup_requested: false,
		}
	}

	/// Classifies one dispatch. A lookup is requested at most once.
	pub fn observe(&mut self, event: &DispatchEvent) -> Signal {
		match event {
			DispatchEvent::MessageCreate(message) => match self.expectation.capture(message, DetectionPath::MessageCreate) {
				Some(captured) => Signal::Captured(captured),
				None => Signal::Ignore,
			},
			DispatchEvent::InteractionSuccess(ack) if self.owns(ack) => {
				let embedded = ack.message.as_ref().and_then(|m| self.expectation.capture(m, DetectionPath::InteractionSuccess));
				match embedded {
					Some(captured) => Signal::Captured(captured),
					None if !self.lookup_requested => {
						self.lookup_requested = true;
						Signal::NeedsLookup
					}
					None => Signal::Ignore,
				}
			}
			DispatchEvent::InteractionFailure(ack) if self.owns(ack) => Signal::Failed,
			_ => Signal::Ignore,
		}
	}

	fn owns(&self, ack: &InteractionAck) -> bool {
		ack.nonce.as_deref() == Some(self.nonce.as_str())
	}

	/// First message among `messages` that satisfies the expectation and was
	/// created no earlier than `skew_ms` before the trigger.
	pub fn find_recent(&self, messages: &[Message], skew_ms: u64) -> Option<CapturedObject> {
		let since = nonce::timestamp_ms(&self.nonce).map(|ms| ms.saturating_sub(skew_ms));
		messages
			.iter()
			.filter(|m| match (since, nonce::timestamp_ms(&m.id)) {
				(Some(since), Some(created)) => created >= since,
				_ => true,
			})
			.find_map(|m| self.expectation.capture(m, DetectionPath::Fallback))
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn expectation() -> Expectation {
		Expectation {
			application_id: "app".into(),
			guild_id: Some("g".into()),
			channel_id: "c".into(),
			custom_id_prefix: "claim".into(),
			invoker_id: Some("me".into()),
		}
	}

	fn message(id: &str, author: &str, custom_id: &str, invoker: Option<&str>) -> Message {
		let mut value = json!({
			"id": id,
			"channel_id": "c",
			"author": { "id": author, "username": "bot", "bot": true },
			"components": [{ "type": 1, "components": [
				{ "type": 2, "custom_id": "other", "label": "No" },
				{ "type": 2, "custom_id": custom_id, "label": "Yes" }
			]}]
		});
		if let Some(invoker) = invoker {
			value["interaction"] = json!({ "id": "i", "name": "drop", "user": { "id": invoker, "username": "x" } });
		}
		serde_json::from_value(value).unwrap()
	}

	#[test]
	fn captures_matching_button_in_nested_rows() {
		let captured = expectation().capture(&message("m1", "app", "claim:42", None), DetectionPath::MessageCreate).unwrap();
		assert_eq!(captured.custom_id, "claim:42");
		assert_eq!(captured.guild_id.as_deref(), Some("g"));
		assert_eq!(captured.target().message_id, "m1");
	}

	#[test]
	fn rejects_wrong_author_prefix_or_invoker() {
		let expectation = expectation();
		assert!(expectation.capture(&message("m", "someone", "claim:1", None), DetectionPath::MessageCreate).is_none());
		assert!(expectation.capture(&message("m", "app", "vote:1", None), DetectionPath::MessageCreate).is_none());
		assert!(expectation.capture(&message("m", "app", "claim:1", Some("them")), DetectionPath::MessageCreate).is_none());
		assert!(expectation.capture(&message("m", "app", "claim:1", Some("me")), DetectionPath::MessageCreate).is_some());
	}

	#[test]
	fn private_success_without_message_requests_one_lookup() {
		let mut pending = PendingAction::new("n1".into(), expectation());
		let ack = |nonce: &str| {
			DispatchEvent::InteractionSuccess(Box::new(InteractionAck {
				id: "i".into(),
				nonce: Some(nonce.into()),
				message: None,
			}))
		};

		assert_eq!(pending.observe(&ack("other")), Signal::Ignore);
		assert_eq!(pending.observe(&ack("n1")), Signal::NeedsLookup);
		assert_eq!(pending.observe(&ack("n1")), Signal::Ignore);
	}

	#[test]
	fn failure_for_own_nonce_ends_detection() {
		let mut pending = PendingAction::new("n1".into(), expectation());
		let failure = DispatchEvent::InteractionFailure(InteractionAck {
			id: "i".into(),
			nonce: Some("n1".into()),
			message: None,
		});
		assert_eq!(pending.observe(&failure), Signal::Failed);
	}

	#[test]
	fn lookup_skips_messages_older_than_trigger() {
		let trigger = nonce::generate();
		let pending = PendingAction::new(trigger, expectation());
		let old = message("1000", "app", "claim:old", None);
		let fresh = message(&nonce::generate(), "app", "claim:new", None);

		let captured = pending.find_recent(&[old, fresh], 0).unwrap();
		assert_eq!(captured.custom_id, "claim:new");
		assert_eq!(captured.path, DetectionPath::Fallback);
	}
}
