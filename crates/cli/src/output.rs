//! Structured output envelope for CLI commands.
//!
//! Every command produces a result envelope on stdout:
//!
//! ```json
//! {
//!   "ok": true,
//!   "command": "address",
//!   "data": { "address": "link1...", "chain": "finschia-1" },
//!   "timings": { "durationMs": 12 }
//! }
//! ```
//!
//! On failure `data` is replaced by `error: { code, message }`.

use std::io::{self, Write};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable `key: value` lines
	#[default]
	Text,
	/// JSON envelope
	Json,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
		}
	}
}

/// The result envelope returned by all commands.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,

	/// Command name (e.g., "pair", "sign")
	pub command: String,

	/// Command-specific result data (only present on success)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	/// Error information (only present on failure)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

/// Error information for failed commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

/// Standardized error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// The relay could not create a pairing session
	PairingFailed,
	/// The wallet refused or broke the pairing
	ConnectFailed,
	/// The wallet answered a custom request with an error or a bad shape
	WalletError,
	/// No connected session
	NotConnected,
	Timeout,
	/// Configuration file missing or invalid
	ConfigError,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let code = match self {
			ErrorCode::PairingFailed => "PAIRING_FAILED",
			ErrorCode::ConnectFailed => "CONNECT_FAILED",
			ErrorCode::WalletError => "WALLET_ERROR",
			ErrorCode::NotConnected => "NOT_CONNECTED",
			ErrorCode::Timeout => "TIMEOUT",
			ErrorCode::ConfigError => "CONFIG_ERROR",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(code)
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

/// Builder for constructing command results
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

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			ok: self.error.is_none(),
			command: self.command,
			data: self.data,
			error: self.error,
			timings: Some(Timings {
				duration_ms: self.start_time.elapsed().as_millis() as u64,
			}),
		}
	}
}

/// Print a command result to stdout in the specified format
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => {
			let mut stdout = io::stdout().lock();
			let _ = stdout.write_all(render_text(result).as_bytes());
		}
	}
}

/// Renders a result as `key: value` lines.
///
/// Nested values are printed as compact JSON.
pub fn render_text<T: Serialize>(result: &CommandResult<T>) -> String {
	let mut out = String::new();

	if let Some(error) = &result.error {
		out.push_str(&format!("Error [{}]: {}\n", error.code, error.message));
		return out;
	}

	match result.data.as_ref().map(serde_json::to_value) {
		Some(Ok(Value::Object(fields))) => {
			for (key, value) in fields {
				match value {
					Value::Null => {}
					Value::String(s) => out.push_str(&format!("{key}: {s}\n")),
					other => out.push_str(&format!("{key}: {other}\n")),
				}
			}
		}
		Some(Ok(Value::String(s))) => out.push_str(&format!("{s}\n")),
		Some(Ok(other)) => out.push_str(&format!("{other}\n")),
		Some(Err(e)) => out.push_str(&format!("Error [{}]: {e}\n", ErrorCode::InternalError)),
		None => {}
	}
	out
}

/// Print an error to stderr in human-readable format
pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}

/// Result of `pair`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairData {
	pub uri: String,
	/// URI percent-encoded for use as a query parameter
	pub uri_encoded: String,
	pub chain: String,
	pub client_id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddressData {
	pub address: String,
	pub chain: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignData {
	pub address: String,
	pub chain: String,
	pub message: String,
	pub signature: Value,
}
