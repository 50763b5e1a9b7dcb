//! Identify payload (op 2) and the client metadata it carries.

use serde::{Deserialize, Serialize};

/// Capability bitmask advertised by default.
pub const DEFAULT_CAPABILITIES: u64 = 16381;

/// Client properties sent with Identify and mirrored into the
/// `X-Super-Properties` header of side-channel requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProperties {
	pub os: String,
	pub browser: String,
	pub device: String,
	pub system_locale: String,
	pub browser_user_agent: String,
	pub browser_version: String,
	pub os_version: String,
	pub referrer: String,
	pub referring_domain: String,
	pub release_channel: String,
	pub client_build_number: u64,
}

impl Default for ClientProperties {
	fn default() -> Self {
		Self {
			os: "Windows".into(),
			browser: "Chrome".into(),
			device: String::new(),
			system_locale: "en-US".into(),
			browser_user_agent: DEFAULT_USER_AGENT.into(),
			browser_version: "120.0.0.0".into(),
			os_version: "10".into(),
			referrer: String::new(),
			referring_domain: String::new(),
			release_channel: "stable".into(),
			client_build_number: 254_573,
		}
	}
}

/// User agent matching the default [`ClientProperties`].
pub const DEFAULT_USER_AGENT: &str =
	"Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Presence announced at identify time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceStub {
	pub status: String,
	pub since: u64,
	pub activities: Vec<serde_json::Value>,
	pub afk: bool,
}

impl Default for PresenceStub {
	fn default() -> Self {
		Self {
			status: "online".into(),
			since: 0,
			activities: Vec::new(),
			afk: false,
		}
	}
}

/// Body of an Identify frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyPayload {
	pub token: String,
	pub capabilities: u64,
	pub properties: ClientProperties,
	pub presence: PresenceStub,
	pub compress: bool,
	pub client_state: ClientState,
}

impl IdentifyPayload {
	pub fn new(token: impl Into<String>, capabilities: u64, properties: ClientProperties) -> Self {
		Self {
			token: token.into(),
			capabilities,
			properties,
			presence: PresenceStub::default(),
			compress: false,
			client_state: ClientState::default(),
		}
	}
}

/// Cached-state hints; an empty state asks the server for a full READY.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
	pub guild_versions: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identify_carries_credential_and_capabilities() {
		let payload = IdentifyPayload::new("secret", DEFAULT_CAPABILITIES, ClientProperties::default());
		let value = serde_json::to_value(&payload).unwrap();
		assert_eq!(value["token"], "secret");
		assert_eq!(value["capabilities"], 16381);
		assert_eq!(value["properties"]["browser"], "Chrome");
		assert_eq!(value["presence"]["status"], "online");
		assert_eq!(value["compress"], false);
		assert!(value["client_state"]["guild_versions"].as_object().unwrap().is_empty());
	}
}
