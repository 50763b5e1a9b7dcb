//! Wire types for the gateway and interaction protocol.
//!
//! This crate contains the serde-serializable types exchanged with the
//! server over the push channel (gateway frames) and the side channel
//! (interaction requests). These types represent the "protocol layer" - the
//! shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and frame builders
//! * 1:1 with protocol: Field names match the JSON the server speaks
//! * Stable: Changes only when the wire protocol changes
//!
//! Session handling, correlation and rate limiting are built on top of these
//! types in `cordwire`.

pub mod dispatch;
pub mod frame;
pub mod identify;
pub mod interaction;
pub mod member_list;
pub mod message;

pub use dispatch::*;
pub use frame::*;
pub use identify::*;
pub use interaction::*;
pub use member_list::*;
pub use message::*;
