//! Error types for the session transport runtime.

use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the transport runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// The relay could not create a pairing session.
	#[error("Failed to create session: {0}")]
	SessionCreation(String),

	/// A request was issued without a connected session.
	#[error("No connected session")]
	NotConnected,

	/// The session ended while a request was waiting for its response.
	#[error("Session closed before the response arrived")]
	SessionClosed,

	/// A wallet-side operation referenced a session the relay does not know.
	#[error("Unknown session: {0}")]
	UnknownSession(String),

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// Protocol-level error (unexpected message shape or state).
	#[error("Protocol error: {0}")]
	Protocol(String),

	/// Relay did not answer in time.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_))
	}

	/// Returns true if the failure means the session is gone.
	pub fn is_session_closed(&self) -> bool {
		matches!(self, Error::SessionClosed | Error::NotConnected | Error::ChannelClosed)
	}
}
