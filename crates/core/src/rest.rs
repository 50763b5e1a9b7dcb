//! HTTP side channel.
//!
//! Interactions are posted here and their effects arrive later on the push
//! channel. [`SideChannel`] is the seam the correlator talks to, so tests can
//! substitute a scripted implementation for [`RestClient`].

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use cordwire_protocol::{InteractionRequest, Message};
use cordwire_runtime::transport::BoxFuture;
use reqwest::header::{AUTHORIZATION, HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::executor::{QuotaHint, Reply};

const SUPER_PROPERTIES: &str = "x-super-properties";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET_AFTER: &str = "x-ratelimit-reset-after";
const RATE_LIMIT_GLOBAL: &str = "x-ratelimit-global";

/// Wait applied when a 429 carries no usable hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
/// Ceiling for server-supplied wait hints.
pub const MAX_WAIT_HINT: Duration = Duration::from_secs(3600);

/// Request/response calls issued alongside the push channel.
pub trait SideChannel: Send + Sync {
	/// Posts an interaction (command invocation or component activation).
	fn interact<'a>(&'a self, request: &'a InteractionRequest) -> BoxFuture<'a, Result<Reply<()>>>;

	/// Most recent messages of a channel, newest first.
	fn recent_messages<'a>(&'a self, channel_id: &'a str, limit: u8) -> BoxFuture<'a, Result<Reply<Vec<Message>>>>;
}

/// [`SideChannel`] over the platform's REST API.
#[derive(Debug, Clone)]
pub struct RestClient {
	http: reqwest::Client,
	api_base: String,
	credential: String,
	super_properties: String,
}

impl RestClient {
	pub fn new(credential: &str, config: &ClientConfig) -> Result<Self> {
		let http = reqwest::Client::builder().user_agent(config.user_agent.as_str()).timeout(Duration::from_secs(30)).build()?;
		Self::with_client(http, credential, config)
	}

	pub fn with_client(http: reqwest::Client, credential: &str, config: &ClientConfig) -> Result<Self> {
		let properties = serde_json::to_vec(&config.properties)?;
		Ok(Self {
			http,
			api_base: config.api_base.trim_end_matches('/').to_string(),
			credential: credential.to_string(),
			super_properties: BASE64_STANDARD.encode(properties),
		})
	}

	fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
		builder.header(AUTHORIZATION, &self.credential).header(SUPER_PROPERTIES, &self.super_properties)
	}

	async fn post_interaction(&self, request: &InteractionRequest) -> Result<Reply<()>> {
		let url = format!("{}/interactions", self.api_base);
		let payload = serde_json::to_string(request)?;
		trace!(target = "cordwire.rest", %url, kind = request.kind, nonce = %request.nonce, "POST interaction");

		let form = reqwest::multipart::Form::new().text("payload_json", payload);
		let response = self.authorized(self.http.post(&url)).multipart(form).send().await?;
		let quota = quota_hint(response.headers());
		check_status(response, "interactions").await?;
		Ok(Reply::new(()).with_quota(quota))
	}

	async fn fetch_messages(&self, channel_id: &str, limit: u8) -> Result<Reply<Vec<Message>>> {
		let url = format!("{}/channels/{channel_id}/messages", self.api_base);
		trace!(target = "cordwire.rest", %url, limit, "GET messages");

		let response = self.authorized(self.http.get(&url)).query(&[("limit", limit)]).send().await?;
		let quota = quota_hint(response.headers());
		let response = check_status(response, "messages").await?;
		let messages: Vec<Message> = response.json().await?;
		Ok(Reply::new(messages).with_quota(quota))
	}
}

impl SideChannel for RestClient {
	fn interact<'a>(&'a self, request: &'a InteractionRequest) -> BoxFuture<'a, Result<Reply<()>>> {
		Box::pin(self.post_interaction(request))
	}

	fn recent_messages<'a>(&'a self, channel_id: &'a str, limit: u8) -> BoxFuture<'a, Result<Reply<Vec<Message>>>> {
		Box::pin(self.fetch_messages(channel_id, limit))
	}
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
	retry_after: f64,
	#[serde(default)]
	global: bool,
}

/// Passes successful responses through and maps failures to [`Error`].
async fn check_status(response: Response, route: &str) -> Result<Response> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}

	if status == StatusCode::TOO_MANY_REQUESTS {
		let headers = response.headers();
		let header_hint = header_f64(headers, RETRY_AFTER.as_str());
		let header_global = headers.contains_key(RATE_LIMIT_GLOBAL);
		let body = response.json::<RateLimitBody>().await.ok();

		let retry_after = body.as_ref().map(|b| b.retry_after).or(header_hint).and_then(seconds).unwrap_or(DEFAULT_RETRY_AFTER);
		let global = header_global || body.is_some_and(|b| b.global);
		debug!(target = "cordwire.rest", route, retry_after_ms = retry_after.as_millis() as u64, global, "429 received");
		return Err(Error::RateLimited {
			scope: route.to_string(),
			retry_after,
			global,
		});
	}

	let body = response.text().await.unwrap_or_default();
	Err(Error::Http { status: status.as_u16(), body })
}

fn quota_hint(headers: &HeaderMap) -> QuotaHint {
	QuotaHint {
		remaining: headers.get(RATE_LIMIT_REMAINING).and_then(|v| v.to_str().ok()).and_then(|v| v.trim().parse().ok()),
		reset_after: header_f64(headers, RATE_LIMIT_RESET_AFTER).and_then(seconds),
	}
}

fn header_f64(headers: &HeaderMap, name: &str) -> Option<f64> {
	headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn seconds(value: f64) -> Option<Duration> {
	if value.is_nan() || value < 0.0 {
		return None;
	}
	Some(Duration::try_from_secs_f64(value).map_or(MAX_WAIT_HINT, |hint| hint.min(MAX_WAIT_HINT)))
}
