//! JSON result envelope written to stdout by every command.

use std::io::{self, Write};
use std::time::Instant;

use cordwire::{Error, ErrorKind};
use serde::Serialize;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	Transport,
	ProtocolTimeout,
	RateLimited,
	Http,
	Protocol,
	Cancelled,
	NotFound,
	InvalidInput,
	Internal,
}

impl From<ErrorKind> for ErrorCode {
	fn from(kind: ErrorKind) -> Self {
		match kind {
			ErrorKind::Transport => ErrorCode::Transport,
			ErrorKind::ProtocolTimeout => ErrorCode::ProtocolTimeout,
			ErrorKind::RateLimited => ErrorCode::RateLimited,
			ErrorKind::Http => ErrorCode::Http,
			ErrorKind::Protocol => ErrorCode::Protocol,
			ErrorKind::Cancelled => ErrorCode::Cancelled,
			ErrorKind::Internal => ErrorCode::Internal,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

impl From<&Error> for CommandError {
	fn from(err: &Error) -> Self {
		let code = match err {
			Error::Config(_) => ErrorCode::InvalidInput,
			other => other.kind().into(),
		};
		Self {
			code,
			message: err.to_string(),
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub schema_version: u32,
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	pub duration_ms: u64,
}

impl<T: Serialize> CommandResult<T> {
	pub fn write_to(&self, mut out: impl Write, pretty: bool) -> io::Result<()> {
		if pretty {
			serde_json::to_writer_pretty(&mut out, self)?;
		} else {
			serde_json::to_writer(&mut out, self)?;
		}
		writeln!(out)
	}

	pub fn print(&self, pretty: bool) -> io::Result<()> {
		self.write_to(io::stdout().lock(), pretty)
	}
}

/// Builder for constructing command results.
pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
		});
		self
	}

	pub fn failure(mut self, err: &Error) -> Self {
		self.error = Some(err.into());
		self
	}

	/// A result carrying data can still fail, e.g. a partial batch.
	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			schema_version: SCHEMA_VERSION,
			ok: self.error.is_none() && self.data.is_some(),
			command: self.command,
			data: self.data,
			error: self.error,
			duration_ms: self.start_time.elapsed().as_millis() as u64,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use serde_json::{Value, json};

	use super::*;

	fn render<T: Serialize>(result: &CommandResult<T>) -> Value {
		let mut buf = Vec::new();
		result.write_to(&mut buf, false).unwrap();
		assert!(buf.ends_with(b"\n"));
		serde_json::from_slice(&buf).unwrap()
	}

	#[test]
	fn success_envelope_omits_error() {
		let result = ResultBuilder::new("members").data(json!({ "total": 3 })).build();
		let value = render(&result);
		assert_eq!(value["ok"], true);
		assert_eq!(value["command"], "members");
		assert_eq!(value["schemaVersion"], 1);
		assert_eq!(value["data"]["total"], 3);
		assert!(value.get("error").is_none());
		assert!(value["durationMs"].is_u64());
	}

	#[test]
	fn failure_envelope_carries_code() {
		let err = Error::RateLimited {
			scope: "channel:1".into(),
			retry_after: Duration::from_secs(2),
			global: false,
		};
		let result = ResultBuilder::<Value>::new("click").failure(&err).build();
		let value = render(&result);
		assert_eq!(value["ok"], false);
		assert_eq!(value["error"]["code"], "RATE_LIMITED");
		assert!(value.get("data").is_none());
	}

	#[test]
	fn config_errors_are_invalid_input() {
		let err = Error::Config("expected value".into());
		assert_eq!(CommandError::from(&err).code, ErrorCode::InvalidInput);
		let err = Error::Cancelled;
		assert_eq!(CommandError::from(&err).code, ErrorCode::Cancelled);
	}

	#[test]
	fn data_with_error_is_not_ok() {
		let result = ResultBuilder::new("click").data(json!([])).error(ErrorCode::NotFound, "nothing captured").build();
		let value = render(&result);
		assert_eq!(value["ok"], false);
		assert_eq!(value["error"]["code"], "NOT_FOUND");
		assert_eq!(value["data"], json!([]));
	}
}
