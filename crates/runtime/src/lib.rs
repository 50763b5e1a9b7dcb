//! Push-channel transports.
//!
//! A transport is split into a [`Transport`] half that writes frames, a
//! [`TransportReceiver`] half that pumps decoded frames into a channel, and
//! that channel's receiving end. The session layer in `cordwire` owns all
//! three through [`TransportParts`].

pub mod error;
pub mod fake;
pub mod transport;
pub mod websocket;

pub use error::{Result, TransportError};
pub use fake::{FakeTransportBuilder, FakeTransportController};
pub use transport::{Transport, TransportParts, TransportReceiver};
pub use websocket::WebSocketTransport;
