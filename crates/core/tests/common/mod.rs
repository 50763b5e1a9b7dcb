//! Shared fixtures: a ready session over the fake transport and a scripted
//! side channel.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use cordwire::protocol::{GatewayFrame, InteractionRequest, Message};
use cordwire::runtime::transport::BoxFuture;
use cordwire::runtime::{FakeTransportBuilder, FakeTransportController};
use cordwire::{ClientConfig, Error, Reply, Result, Session, SideChannel};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Mutex as AsyncMutex, mpsc};

pub const HEARTBEAT_MS: u64 = 41_250;
pub const SESSION_ID: &str = "session-1";
pub const USER_ID: &str = "user-1";

/// Session that has completed Hello/Identify/READY over a fake transport.
pub async fn ready_session(config: &ClientConfig) -> (Session, FakeTransportController) {
	let (parts, controller) = FakeTransportBuilder::new().build();
	controller.inject_hello(HEARTBEAT_MS);
	controller.inject_ready(SESSION_ID, USER_ID);
	let session = Session::connect(parts, "token", config).await.unwrap();
	(session, controller)
}

/// Next frame the client wrote with opcode `op`, skipping others.
pub async fn next_op(controller: &FakeTransportController, op: u8) -> GatewayFrame {
	loop {
		let frame = controller.next_sent().await.expect("client stopped writing");
		if frame.op == op {
			return frame;
		}
	}
}

pub fn member(id: u32) -> Value {
	json!({ "member": { "user": { "id": id.to_string(), "username": format!("user{id}") }, "roles": [] } })
}

pub fn members(ids: std::ops::Range<u32>) -> Vec<Value> {
	ids.map(member).collect()
}

pub fn sync(range: [u32; 2], items: Vec<Value>) -> Value {
	json!({ "op": "SYNC", "range": range, "items": items })
}

pub fn list_update(guild_id: &str, member_count: u64, ops: Vec<Value>) -> Value {
	json!({ "guild_id": guild_id, "id": "everyone", "member_count": member_count, "online_count": 0, "groups": [], "ops": ops })
}

/// A bot message with one action row holding a single button.
pub fn bot_message(id: &str, channel_id: &str, application_id: &str, custom_id: &str, flags: u64) -> Value {
	json!({
		"id": id,
		"channel_id": channel_id,
		"guild_id": "guild-1",
		"author": { "id": application_id, "username": "dropbot", "bot": true },
		"content": "",
		"flags": flags,
		"components": [{ "type": 1, "components": [{ "type": 2, "custom_id": custom_id, "label": "Claim" }] }]
	})
}

pub fn message(value: Value) -> Message {
	serde_json::from_value(value).unwrap()
}

/// Side channel that records every call and answers from a script.
pub struct ScriptedSide {
	interactions: Mutex<Vec<InteractionRequest>>,
	seen_tx: mpsc::UnboundedSender<InteractionRequest>,
	seen_rx: AsyncMutex<mpsc::UnboundedReceiver<InteractionRequest>>,
	responses: Mutex<VecDeque<Result<Reply<()>>>>,
	messages: Mutex<Vec<Message>>,
	lookups: AtomicU32,
}

impl ScriptedSide {
	pub fn new() -> Arc<Self> {
		let (seen_tx, seen_rx) = mpsc::unbounded_channel();
		Arc::new(Self {
			interactions: Mutex::new(Vec::new()),
			seen_tx,
			seen_rx: AsyncMutex::new(seen_rx),
			responses: Mutex::new(VecDeque::new()),
			messages: Mutex::new(Vec::new()),
			lookups: AtomicU32::new(0),
		})
	}

	/// Queues the answer for the next interaction; unscripted calls succeed.
	pub fn respond(&self, response: Result<Reply<()>>) {
		self.responses.lock().push_back(response);
	}

	pub fn rate_limit(&self, retry_after_ms: u64) {
		self.respond(Err(Error::RateLimited {
			scope: "interactions".into(),
			retry_after: std::time::Duration::from_millis(retry_after_ms),
			global: false,
		}));
	}

	pub fn set_messages(&self, messages: Vec<Message>) {
		*self.messages.lock() = messages;
	}

	/// Waits for the next interaction posted.
	pub async fn next_interaction(&self) -> InteractionRequest {
		self.seen_rx.lock().await.recv().await.expect("side channel dropped")
	}

	pub fn interactions(&self) -> Vec<InteractionRequest> {
		self.interactions.lock().clone()
	}

	pub fn lookups(&self) -> u32 {
		self.lookups.load(Ordering::SeqCst)
	}
}

impl SideChannel for ScriptedSide {
	fn interact<'a>(&'a self, request: &'a InteractionRequest) -> BoxFuture<'a, Result<Reply<()>>> {
		self.interactions.lock().push(request.clone());
		let _ = self.seen_tx.send(request.clone());
		let response = self.responses.lock().pop_front().unwrap_or_else(|| Ok(Reply::new(())));
		Box::pin(async move { response })
	}

	fn recent_messages<'a>(&'a self, _channel_id: &'a str, _limit: u8) -> BoxFuture<'a, Result<Reply<Vec<Message>>>> {
		self.lookups.fetch_add(1, Ordering::SeqCst);
		let messages = self.messages.lock().clone();
		Box::pin(async move { Ok(Reply::new(messages)) })
	}
}
