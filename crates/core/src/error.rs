//! Error types for the session layer.

use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`SessionManager`](crate::SessionManager) operations.
#[derive(Debug, Error)]
pub enum Error {
	/// The transport could not create a pairing session. The URI stays unset.
	#[error("Failed to create pairing session: {0}")]
	PairingCreation(#[source] vc_runtime::Error),

	/// The transport reported an error on connect. The pairing attempt is over.
	#[error("Wallet connection failed: {0}")]
	Connect(String),

	/// A custom request failed or returned an unexpected shape.
	#[error(transparent)]
	Correlation(#[from] CorrelationError),

	/// An operation needed a pairing session and there is none.
	#[error("No pairing session, initialize one first")]
	NoSession,

	/// An operation needed a connected wallet.
	#[error("Not connected to a wallet")]
	NotConnected,

	/// Transport failure outside of a custom request (e.g. killing a session).
	#[error("Transport error: {0}")]
	Transport(#[from] vc_runtime::Error),

	/// Timeout waiting for a session event.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// The dispatcher loop is already running.
	#[error("Session dispatcher is already running")]
	AlreadyRunning,

	/// The manager was disposed or its event channel closed.
	#[error("Session manager disposed")]
	Disposed,
}

impl Error {
	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		match self {
			Error::Timeout(_) => true,
			Error::Correlation(CorrelationError::Transport(e)) | Error::Transport(e) => e.is_timeout(),
			_ => false,
		}
	}
}

/// Failure of a single custom request.
///
/// A correlation error never mutates session state.
#[derive(Debug, Error)]
pub enum CorrelationError {
	/// The request was issued without a connected session.
	#[error("No connected session")]
	NotConnected,

	/// Network, timeout or protocol failure reported by the transport.
	#[error("Transport error: {0}")]
	Transport(#[source] vc_runtime::Error),

	/// The wallet answered with a JSON-RPC error object.
	#[error("Wallet error {code}: {message}")]
	Remote { code: i64, message: String },

	/// The transport resolved a call with somebody else's response.
	#[error("Response id {actual} does not match request id {expected}")]
	IdMismatch { expected: u64, actual: u64 },

	/// The wallet returned an empty result list.
	#[error("Empty response to '{method}'")]
	EmptyResponse { method: String },

	/// The result did not have the expected shape.
	#[error("Malformed response to '{method}': {source}")]
	Decode {
		method: String,
		#[source]
		source: serde_json::Error,
	},
}

impl From<vc_runtime::Error> for CorrelationError {
	fn from(error: vc_runtime::Error) -> Self {
		match error {
			vc_runtime::Error::NotConnected => CorrelationError::NotConnected,
			other => CorrelationError::Transport(other),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transport_not_connected_maps_to_correlation_not_connected() {
		let err: CorrelationError = vc_runtime::Error::NotConnected.into();
		assert!(matches!(err, CorrelationError::NotConnected));

		let err: CorrelationError = vc_runtime::Error::SessionClosed.into();
		assert!(matches!(err, CorrelationError::Transport(vc_runtime::Error::SessionClosed)));
	}

	#[test]
	fn timeout_detection_looks_through_transport_errors() {
		let err = Error::Correlation(CorrelationError::Transport(vc_runtime::Error::Timeout(
			"relay".to_string(),
		)));
		assert!(err.is_timeout());
		assert!(!Error::NoSession.is_timeout());
	}

	#[test]
	fn remote_error_message() {
		let err = CorrelationError::Remote {
			code: -32000,
			message: "Request rejected".to_string(),
		};
		assert_eq!(err.to_string(), "Wallet error -32000: Request rejected");
	}
}
