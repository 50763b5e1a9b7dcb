//! Users, messages and message components.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub id: String,
	#[serde(default)]
	pub username: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub global_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub discriminator: Option<String>,
	#[serde(default)]
	pub bot: bool,
}

/// Component type of a button.
pub const COMPONENT_BUTTON: u8 = 2;

/// A message component. Action rows (type 1) nest further components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
	#[serde(rename = "type")]
	pub kind: u8,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub custom_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	#[serde(default)]
	pub disabled: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub components: Vec<Component>,
}

impl Component {
	/// Depth-first walk over this component and its children.
	pub fn walk(&self) -> Vec<&Component> {
		let mut out = vec![self];
		for child in &self.components {
			out.extend(child.walk());
		}
		out
	}
}

/// Summary of the interaction a message responds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInteraction {
	pub id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
	pub id: String,
	pub channel_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub guild_id: Option<String>,
	pub author: User,
	#[serde(default)]
	pub content: String,
	#[serde(default)]
	pub components: Vec<Component>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub application_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub interaction: Option<MessageInteraction>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<serde_json::Value>,
	#[serde(default)]
	pub flags: u64,
}

impl Message {
	/// Every component in the message, flattened depth-first.
	pub fn all_components(&self) -> impl Iterator<Item = &Component> {
		self.components.iter().flat_map(Component::walk)
	}

	/// Id of the application that authored the message.
	pub fn author_application(&self) -> &str {
		self.application_id.as_deref().unwrap_or(&self.author.id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn nested_components_are_flattened() {
		let message: Message = serde_json::from_value(json!({
			"id": "m1",
			"channel_id": "c1",
			"author": {"id": "app", "username": "bot", "bot": true},
			"components": [
				{"type": 1, "components": [
					{"type": 2, "custom_id": "claim:1", "label": "Claim"},
					{"type": 2, "custom_id": "skip:1"}
				]}
			]
		}))
		.unwrap();

		let ids: Vec<_> = message.all_components().filter_map(|c| c.custom_id.as_deref()).collect();
		assert_eq!(ids, vec!["claim:1", "skip:1"]);
		assert_eq!(message.author_application(), "app");
		assert_eq!(message.flags, 0);
	}
}
