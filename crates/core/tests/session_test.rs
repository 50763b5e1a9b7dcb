//! Session negotiation, heartbeat and teardown over the fake transport.

mod common;

use std::time::Duration;

use common::{HEARTBEAT_MS, SESSION_ID, USER_ID, next_op, ready_session};
use cordwire::protocol::{DispatchEvent, GatewayFrame, OpCode};
use cordwire::runtime::FakeTransportBuilder;
use cordwire::{ClientConfig, Error, Session, SessionEvent, SessionState};
use serde_json::json;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn hello_identify_ready_then_heartbeats_with_latest_sequence() {
	let config = ClientConfig::default();
	let (parts, controller) = FakeTransportBuilder::new().build();
	controller.inject_hello(HEARTBEAT_MS);
	controller.inject_ready(SESSION_ID, USER_ID);

	let session = Session::connect(parts, "secret-token", &config).await.unwrap();
	let start = Instant::now();
	assert_eq!(session.state(), SessionState::Ready);
	assert_eq!(session.session_id().as_deref(), Some(SESSION_ID));
	assert_eq!(session.user_id().as_deref(), Some(USER_ID));
	assert_eq!(session.heartbeat_interval(), Some(Duration::from_millis(HEARTBEAT_MS)));

	let identify = controller.next_sent().await.unwrap();
	assert_eq!(identify.opcode(), OpCode::Identify);
	assert_eq!(identify.d["token"], "secret-token");
	assert_eq!(identify.d["capabilities"], config.capabilities);

	let first = next_op(&controller, 1).await;
	assert!(start.elapsed() >= Duration::from_millis(HEARTBEAT_MS) - Duration::from_millis(10));
	assert_eq!(first.d, json!(1));

	controller.inject_heartbeat_ack();
	controller.inject_dispatch("PRESENCE_UPDATE", json!({}));
	let second = next_op(&controller, 1).await;
	assert_eq!(second.d, json!(2));
	assert_eq!(session.sequence(), Some(2));
	assert_eq!(session.state(), SessionState::Ready);

	session.close().await;
}

#[tokio::test(start_paused = true)]
async fn missing_hello_is_a_protocol_timeout() {
	let config = ClientConfig::default();
	let (parts, controller) = FakeTransportBuilder::new().build();

	let err = Session::connect(parts, "token", &config).await.err().unwrap();
	assert!(matches!(err, Error::ProtocolTimeout { stage: "HELLO", .. }), "{err}");
	assert!(controller.is_closed());
}

#[tokio::test(start_paused = true)]
async fn missing_ready_is_a_protocol_timeout() {
	let config = ClientConfig::default();
	let (parts, controller) = FakeTransportBuilder::new().build();
	controller.inject_hello(HEARTBEAT_MS);

	let err = Session::connect(parts, "token", &config).await.err().unwrap();
	assert!(matches!(err, Error::ProtocolTimeout { stage: "READY", .. }), "{err}");
}

#[tokio::test(start_paused = true)]
async fn connection_drop_during_negotiation_is_a_transport_error() {
	let config = ClientConfig::default();
	let (parts, controller) = FakeTransportBuilder::new().build();
	controller.inject_hello(HEARTBEAT_MS);
	controller.fail("authentication failed");

	let err = Session::connect(parts, "token", &config).await.err().unwrap();
	assert!(err.is_terminal_for_session());
	assert!(err.to_string().contains("authentication failed"), "{err}");
}

#[tokio::test(start_paused = true)]
async fn transport_failure_closes_every_subscriber() {
	let (session, controller) = ready_session(&ClientConfig::default()).await;
	let mut first = session.subscribe();
	let mut second = session.subscribe();

	controller.fail("socket reset");

	for stream in [&mut first, &mut second] {
		match stream.next().await {
			Some(SessionEvent::Closed(reason)) => assert!(reason.contains("socket reset"), "{reason}"),
			other => panic!("expected Closed, got {other:?}"),
		}
		assert!(stream.next().await.is_none());
	}
	assert_eq!(session.state(), SessionState::Closed);
	assert!(matches!(session.send(GatewayFrame::heartbeat(None)).await, Err(Error::NotReady)));

	let mut late = session.subscribe();
	assert!(matches!(late.next().await, Some(SessionEvent::Closed(_))));
}

#[tokio::test(start_paused = true)]
async fn dispatches_reach_subscribers_in_order() {
	let (session, controller) = ready_session(&ClientConfig::default()).await;
	let mut stream = session.subscribe();

	controller.inject_dispatch("TYPING_START", json!({ "n": 1 }));
	controller.inject_dispatch("TYPING_START", json!({ "n": 2 }));
	// Undecodable payloads pass through instead of ending the session.
	controller.inject_dispatch("MESSAGE_CREATE", json!({ "id": 5 }));

	for expected in [1, 2] {
		match stream.next().await {
			Some(SessionEvent::Dispatch(event)) => match &*event {
				DispatchEvent::Other { kind, data } => {
					assert_eq!(kind, "TYPING_START");
					assert_eq!(data["n"], expected);
				}
				other => panic!("unexpected {other:?}"),
			},
			other => panic!("unexpected {other:?}"),
		}
	}
	match stream.next().await {
		Some(SessionEvent::Dispatch(event)) => assert!(matches!(&*event, DispatchEvent::Other { kind, .. } if kind == "MESSAGE_CREATE")),
		other => panic!("unexpected {other:?}"),
	}
	assert_eq!(session.sequence(), Some(4));
	assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn server_heartbeat_request_is_answered_immediately() {
	let (session, controller) = ready_session(&ClientConfig::default()).await;
	let start = Instant::now();

	controller.inject(GatewayFrame::new(OpCode::Heartbeat, json!(null)));
	let heartbeat = next_op(&controller, 1).await;
	assert_eq!(heartbeat.d, json!(1));
	assert!(start.elapsed() < Duration::from_millis(HEARTBEAT_MS));
	session.close().await;
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_heartbeats_end_the_session() {
	let (session, _controller) = ready_session(&ClientConfig::default()).await;
	let mut stream = session.subscribe();
	let start = Instant::now();

	match stream.next().await {
		Some(SessionEvent::Closed(reason)) => assert!(reason.contains("heartbeat"), "{reason}"),
		other => panic!("expected Closed, got {other:?}"),
	}
	// First beat at 1x, missed at 2x, declared dead at 3x.
	assert!(start.elapsed() >= Duration::from_millis(HEARTBEAT_MS * 3) - Duration::from_millis(10));
	assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn reconnect_request_ends_the_session() {
	let (session, controller) = ready_session(&ClientConfig::default()).await;
	let mut stream = session.subscribe();

	controller.inject(GatewayFrame::new(OpCode::Reconnect, json!(null)));
	assert!(matches!(stream.next().await, Some(SessionEvent::Closed(reason)) if reason.contains("reconnect")));
	assert!(controller.is_closed());
}

#[tokio::test(start_paused = true)]
async fn close_is_idempotent() {
	let (session, controller) = ready_session(&ClientConfig::default()).await;
	let mut stream = session.subscribe();

	session.close().await;
	session.close().await;

	assert_eq!(session.state(), SessionState::Closed);
	assert!(controller.is_closed());
	assert!(matches!(stream.next().await, Some(SessionEvent::Closed(_))));
	assert_eq!(session.closed_reason().as_deref(), Some("session closed"));
}
