//! Session transport contract.

use async_trait::async_trait;
use tokio::sync::broadcast;
use vc_protocol::{CustomRequest, LifecycleEvent, PairingUri, RpcResponse};

use crate::error::Result;

/// Persistent relay connection able to host one pairing session.
///
/// The pairing handshake and the relay wire format live behind this trait.
/// Implementations are responsible for demultiplexing responses by request
/// ID, so [`send_custom_request`](Self::send_custom_request) may be called
/// concurrently.
#[async_trait]
pub trait SessionTransport: Send + Sync + 'static {
	/// Creates a new pairing session and returns its shareable URI.
	///
	/// The session is pairing-ready but not connected until the wallet
	/// accepts it.
	async fn create_session(&self) -> Result<PairingUri>;

	/// Tears down the current session. Does nothing when there is none.
	async fn kill_session(&self) -> Result<()>;

	/// Subscribes to lifecycle events. Dropping the receiver unsubscribes.
	fn events(&self) -> broadcast::Receiver<LifecycleEvent>;

	/// Sends a custom request and waits for the response carrying its ID.
	async fn send_custom_request(&self, request: CustomRequest) -> Result<RpcResponse>;

	/// Whether the wallet has accepted the current session.
	fn connected(&self) -> bool;

	/// URI of the current session, if any.
	fn uri(&self) -> Option<PairingUri>;

	/// Stable identifier of this client on the relay.
	fn client_id(&self) -> &str;

	/// Key material of the current session; `Some` whenever a session exists.
	fn session_key(&self) -> Option<String>;
}
