use thiserror::Error;
use vault_connect::CorrelationError;

use crate::config::ConfigError;
use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Session(#[from] vault_connect::Error),

	#[error(transparent)]
	Relay(#[from] vc_runtime::Error),

	#[error("timeout after {ms}ms waiting for: {condition}")]
	Timeout { ms: u64, condition: String },

	#[error("wallet did not report an address: {0}")]
	Wallet(String),

	#[error("session dispatcher failed: {0}")]
	Dispatcher(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl CliError {
	/// Convert this error to a CommandError for structured output
	pub fn to_command_error(&self) -> CommandError {
		let code = match self {
			CliError::Config(_) => ErrorCode::ConfigError,
			CliError::Session(err) => session_code(err),
			CliError::Relay(err) if err.is_timeout() => ErrorCode::Timeout,
			CliError::Relay(vc_runtime::Error::NotConnected) => ErrorCode::NotConnected,
			CliError::Relay(_) => ErrorCode::InternalError,
			CliError::Timeout { .. } => ErrorCode::Timeout,
			CliError::Wallet(_) => ErrorCode::WalletError,
			CliError::Dispatcher(_) => ErrorCode::InternalError,
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Json(_) => ErrorCode::InternalError,
		};

		CommandError {
			code,
			message: self.to_string(),
		}
	}
}

fn session_code(err: &vault_connect::Error) -> ErrorCode {
	use vault_connect::Error as SessionError;

	if err.is_timeout() {
		return ErrorCode::Timeout;
	}
	match err {
		SessionError::PairingCreation(_) => ErrorCode::PairingFailed,
		SessionError::Connect(_) => ErrorCode::ConnectFailed,
		SessionError::NotConnected
		| SessionError::NoSession
		| SessionError::Correlation(CorrelationError::NotConnected) => ErrorCode::NotConnected,
		SessionError::Correlation(_) => ErrorCode::WalletError,
		_ => ErrorCode::InternalError,
	}
}
