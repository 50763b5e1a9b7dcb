// cordwire: stateful client for a hybrid push-channel / side-channel protocol
//
// Wire types live in `cordwire-protocol` and socket plumbing in
// `cordwire-runtime`; this crate holds the session and the workflows built
// on top of it.

pub mod client;
pub mod collector;
pub mod config;
pub mod correlator;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod nonce;
pub mod rest;
pub mod timers;

pub use client::Client;
pub use collector::{CollectOutcome, CollectRequest, Collector, FinishReason};
pub use config::{ClientConfig, CollectorConfig, CorrelatorConfig, RateLimitConfig};
pub use correlator::{ActReport, CapturedObject, ClickOutcome, ClickSpec, Correlator, DetectionPath, TriggerSpec, WorkflowPhase};
pub use error::{Error, ErrorKind, Result};
pub use executor::{Executed, Executor, QuotaHint, Reply};
pub use gateway::{DispatchStream, Session, SessionEvent, SessionState};
pub use rest::{RestClient, SideChannel};

pub use cordwire_protocol as protocol;
pub use cordwire_runtime as runtime;
pub use tokio_util::sync::CancellationToken;
