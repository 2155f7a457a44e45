use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vc_protocol::{ClientMeta, ConnectPayload, CustomRequest, LifecycleEvent, Message, PairingUri, RpcError, RpcResponse};

use super::Link;
use crate::error::{Error, Result};

/// Wallet side of a loopback link.
///
/// Drives the session from the wallet's point of view: accepting or rejecting
/// the pending pairing, answering custom requests, and hanging up. Cloning
/// yields another handle to the same wallet.
#[derive(Clone)]
pub struct WalletPeer {
	link: Arc<Link>,
	to_dapp: mpsc::UnboundedSender<Value>,
	requests: Arc<TokioMutex<mpsc::UnboundedReceiver<Value>>>,
}

impl WalletPeer {
	pub(super) fn new(
		link: Arc<Link>,
		to_dapp: mpsc::UnboundedSender<Value>,
		requests: mpsc::UnboundedReceiver<Value>,
	) -> Self {
		Self {
			link,
			to_dapp,
			requests: Arc::new(TokioMutex::new(requests)),
		}
	}

	/// URI of the session waiting to be scanned, if any.
	pub fn pending_uri(&self) -> Option<PairingUri> {
		let slot = self.link.session.lock();
		if slot.connected { None } else { slot.uri.clone() }
	}

	/// Metadata the application announced with its session request.
	pub fn client_meta(&self) -> &ClientMeta {
		&self.link.client_meta
	}

	/// Accepts the pending session identified by `uri`.
	pub fn approve(&self, uri: &PairingUri, payload: ConnectPayload) -> Result<()> {
		{
			let mut slot = self.link.session.lock();
			let known = slot.uri.as_ref().is_some_and(|current| current.topic() == uri.topic());
			if !known {
				return Err(Error::UnknownSession(uri.topic().to_string()));
			}
			if slot.connected {
				return Err(Error::Protocol(format!("Session {} already connected", uri.topic())));
			}
			slot.connected = true;
		}

		self.link.emit(LifecycleEvent::Connect {
			topic: uri.topic().to_string(),
			payload,
		});
		Ok(())
	}

	/// Rejects the pending session identified by `uri`.
	pub fn reject(&self, uri: &PairingUri, message: impl Into<String>) -> Result<()> {
		{
			let mut slot = self.link.session.lock();
			let pending = !slot.connected
				&& slot.uri.as_ref().is_some_and(|current| current.topic() == uri.topic());
			if !pending {
				return Err(Error::UnknownSession(uri.topic().to_string()));
			}
			slot.uri = None;
		}

		self.link.emit(LifecycleEvent::ConnectFailed {
			topic: uri.topic().to_string(),
			message: message.into(),
		});
		Ok(())
	}

	/// Ends the current session from the wallet side.
	pub async fn disconnect(&self, message: impl Into<String>) -> Result<()> {
		let topic = self
			.link
			.clear_session()
			.ok_or_else(|| Error::UnknownSession("no active session".to_string()))?;

		self.link.fail_pending().await;
		self.link.emit(LifecycleEvent::Disconnect {
			topic,
			message: message.into(),
		});
		Ok(())
	}

	/// Waits for the next custom request from the application.
	///
	/// Returns `None` once the application side is gone.
	pub async fn next_request(&self) -> Option<CustomRequest> {
		let mut requests = self.requests.lock().await;
		while let Some(value) = requests.recv().await {
			match serde_json::from_value::<Message>(value) {
				Ok(Message::Request(request)) => return Some(request),
				Ok(other) => tracing::debug!(?other, "Wallet ignoring non-request message"),
				Err(e) => tracing::error!("Wallet failed to parse message: {}", e),
			}
		}
		None
	}

	/// Sends a response back to the application.
	pub fn respond(&self, response: RpcResponse) -> Result<()> {
		let value = serde_json::to_value(&response)?;
		self.to_dapp.send(value).map_err(|_| Error::ChannelClosed)
	}

	/// Answers every incoming request with `handler` until the application
	/// transport is dropped.
	pub fn serve<F>(&self, handler: F) -> JoinHandle<()>
	where
		F: Fn(&CustomRequest) -> std::result::Result<Value, RpcError> + Send + Sync + 'static,
	{
		let peer = self.clone();
		tokio::spawn(async move {
			while let Some(request) = peer.next_request().await {
				let response = match handler(&request) {
					Ok(result) => RpcResponse::success(request.id, result),
					Err(error) => RpcResponse::failure(request.id, error),
				};
				if let Err(e) = peer.respond(response) {
					tracing::warn!(id = request.id, error = %e, "Wallet failed to respond");
					break;
				}
			}
		})
	}
}
