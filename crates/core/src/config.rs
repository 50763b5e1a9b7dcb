//! Client configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! { "collector": { "idleTimeoutMs": 8000 }, "rateLimit": { "maxRetries": 5 } }
//! ```

use std::path::Path;
use std::time::Duration;

use cordwire_protocol::{ClientProperties, DEFAULT_CAPABILITIES, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=9&encoding=json";
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v9";

/// Top-level configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
	pub gateway_url: String,
	pub api_base: String,
	pub user_agent: String,
	pub capabilities: u64,
	pub properties: ClientProperties,
	pub hello_timeout_ms: u64,
	pub ready_timeout_ms: u64,
	/// Consecutive unacknowledged heartbeats tolerated before the connection
	/// is declared dead.
	pub max_missed_acks: u32,
	pub collector: CollectorConfig,
	pub correlator: CorrelatorConfig,
	pub rate_limit: RateLimitConfig,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			gateway_url: DEFAULT_GATEWAY_URL.to_string(),
			api_base: DEFAULT_API_BASE.to_string(),
			user_agent: DEFAULT_USER_AGENT.to_string(),
			capabilities: DEFAULT_CAPABILITIES,
			properties: ClientProperties::default(),
			hello_timeout_ms: 10_000,
			ready_timeout_ms: 15_000,
			max_missed_acks: 2,
			collector: CollectorConfig::default(),
			correlator: CorrelatorConfig::default(),
			rate_limit: RateLimitConfig::default(),
		}
	}
}

impl ClientConfig {
	pub fn from_json_str(text: &str) -> Result<Self> {
		serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
	}

	pub fn from_path(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path)?;
		Self::from_json_str(&text)
	}

	pub fn hello_timeout(&self) -> Duration {
		Duration::from_millis(self.hello_timeout_ms)
	}

	pub fn ready_timeout(&self) -> Duration {
		Duration::from_millis(self.ready_timeout_ms)
	}
}

/// Windowed collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectorConfig {
	pub window_size: u32,
	pub initial_windows: u32,
	/// Completion after this long without a batch that adds records.
	pub idle_timeout_ms: u64,
	/// Absolute ceiling for one collection.
	pub hard_timeout_ms: u64,
}

impl Default for CollectorConfig {
	fn default() -> Self {
		Self {
			window_size: 100,
			initial_windows: 3,
			idle_timeout_ms: 5_000,
			hard_timeout_ms: 60_000,
		}
	}
}

impl CollectorConfig {
	pub fn idle_timeout(&self) -> Duration {
		Duration::from_millis(self.idle_timeout_ms)
	}

	pub fn hard_timeout(&self) -> Duration {
		Duration::from_millis(self.hard_timeout_ms)
	}
}

/// Trigger/detect/act settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorrelatorConfig {
	pub detect_timeout_ms: u64,
	/// Pause before the side-channel lookup that backs up a private response.
	pub fallback_delay_ms: u64,
	/// Number of recent channel messages the fallback lookup inspects.
	pub fallback_limit: u8,
	/// Send an op 37 guild subscription before triggering, so channel
	/// messages of large guilds are pushed to this session.
	pub subscribe_guild: bool,
}

impl Default for CorrelatorConfig {
	fn default() -> Self {
		Self {
			detect_timeout_ms: 15_000,
			fallback_delay_ms: 1_500,
			fallback_limit: 10,
			subscribe_guild: true,
		}
	}
}

impl CorrelatorConfig {
	pub fn detect_timeout(&self) -> Duration {
		Duration::from_millis(self.detect_timeout_ms)
	}

	pub fn fallback_delay(&self) -> Duration {
		Duration::from_millis(self.fallback_delay_ms)
	}
}

/// Rate-limited executor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitConfig {
	pub max_retries: u32,
	/// Added to every server-supplied wait hint.
	pub safety_margin_ms: u64,
	/// Remaining-quota level at which a scope is cooled down preemptively.
	pub low_water: u32,
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			max_retries: 3,
			safety_margin_ms: 250,
			low_water: 0,
		}
	}
}

impl RateLimitConfig {
	pub fn safety_margin(&self) -> Duration {
		Duration::from_millis(self.safety_margin_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_object_yields_defaults() {
		let config = ClientConfig::from_json_str("{}").unwrap();
		assert_eq!(config.gateway_url, DEFAULT_GATEWAY_URL);
		assert_eq!(config.collector.window_size, 100);
		assert_eq!(config.collector.initial_windows, 3);
		assert_eq!(config.correlator.detect_timeout(), Duration::from_secs(15));
		assert_eq!(config.rate_limit.max_retries, 3);
		assert_eq!(config.max_missed_acks, 2);
		assert!(config.correlator.subscribe_guild);
	}

	#[test]
	fn nested_fields_override_individually() {
		let config = ClientConfig::from_json_str(r#"{"collector":{"idleTimeoutMs":8000},"rateLimit":{"lowWater":1}}"#).unwrap();
		assert_eq!(config.collector.idle_timeout(), Duration::from_secs(8));
		assert_eq!(config.collector.hard_timeout_ms, 60_000);
		assert_eq!(config.rate_limit.low_water, 1);
		assert_eq!(config.rate_limit.safety_margin_ms, 250);
	}

	#[test]
	fn invalid_json_is_a_config_error() {
		assert!(matches!(ClientConfig::from_json_str("{"), Err(Error::Config(_))));
	}

	#[test]
	fn loads_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cordwire.json");
		std::fs::write(&path, r#"{"apiBase":"http://localhost:9999"}"#).unwrap();
		let config = ClientConfig::from_path(&path).unwrap();
		assert_eq!(config.api_base, "http://localhost:9999");
	}
}
