//! In-process relay implementing [`SessionTransport`].
//!
//! The loopback relay connects one application-side [`RelayTransport`] with
//! one wallet-side [`WalletPeer`] over in-memory channels. Messages cross the
//! link as JSON values, exactly as they would cross a bridge server, so the
//! correlation path is the same one a networked transport would take.
//!
//! # Message Flow
//!
//! 1. Client calls `send_custom_request()` with an ID-carrying request
//! 2. Transport registers a oneshot callback under that ID
//! 3. Request is serialized and queued for the wallet
//! 4. Client awaits on the oneshot receiver
//! 5. Reader task receives the wallet's reply
//! 6. Reply is correlated by ID and sent via the oneshot channel
//! 7. Client receives the response

mod wallet;


use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use vc_protocol::{ClientMeta, CustomRequest, LifecycleEvent, Message, PairingUri, RpcResponse};

use crate::error::{Error, Result};
use crate::transport::SessionTransport;

pub use wallet::WalletPeer;

/// Protocol version written into pairing URIs.
const PROTOCOL_VERSION: u32 = 1;

/// Pending request callbacks keyed by request ID.
type CallbackMap = Arc<TokioMutex<HashMap<u64, oneshot::Sender<Result<RpcResponse>>>>>;

/// Settings of a loopback link.
#[derive(Debug, Clone)]
pub struct LoopbackOptions {
	/// Bridge URL written into pairing URIs
	pub bridge: String,
	/// Metadata announced to the wallet
	pub client_meta: ClientMeta,
	/// Capacity of the lifecycle event channel
	pub event_capacity: usize,
}

impl Default for LoopbackOptions {
	fn default() -> Self {
		Self {
			bridge: "https://bridge.walletconnect.org".to_string(),
			client_meta: ClientMeta::default(),
			event_capacity: 32,
		}
	}
}

#[derive(Debug, Default)]
struct SessionSlot {
	uri: Option<PairingUri>,
	connected: bool,
}

/// State shared by both ends of the link.
struct Link {
	session: Mutex<SessionSlot>,
	client_meta: ClientMeta,
	events: broadcast::Sender<LifecycleEvent>,
	callbacks: CallbackMap,
}

impl Link {
	fn emit(&self, event: LifecycleEvent) {
		tracing::debug!(event = event.name(), topic = event.topic(), "Lifecycle event");
		// No subscribers is fine: nobody is listening yet.
		let _ = self.events.send(event);
	}

	/// Clears the session slot and returns the topic that was live, if any.
	fn clear_session(&self) -> Option<String> {
		let mut slot = self.session.lock();
		slot.connected = false;
		slot.uri.take().map(|uri| uri.topic().to_string())
	}

	/// Fails every pending request with [`Error::SessionClosed`].
	async fn fail_pending(&self) {
		let pending: Vec<_> = self.callbacks.lock().await.drain().collect();
		for (id, callback) in pending {
			tracing::debug!(id, "Failing pending request: session closed");
			let _ = callback.send(Err(Error::SessionClosed));
		}
	}
}

/// Creates a connected pair of application transport and wallet peer.
///
/// Must be called from within a Tokio runtime: the transport's reader task is
/// spawned here and ends once every [`WalletPeer`] handle is dropped.
pub fn loopback(options: LoopbackOptions) -> (Arc<RelayTransport>, WalletPeer) {
	let (events, _) = broadcast::channel(options.event_capacity.max(1));
	let (to_wallet, wallet_rx) = mpsc::unbounded_channel();
	let (to_dapp, dapp_rx) = mpsc::unbounded_channel();

	let link = Arc::new(Link {
		session: Mutex::new(SessionSlot::default()),
		client_meta: options.client_meta.clone(),
		events,
		callbacks: Arc::new(TokioMutex::new(HashMap::new())),
	});

	tokio::spawn(run_reader(dapp_rx, Arc::clone(&link.callbacks)));

	let transport = Arc::new(RelayTransport {
		client_id: uuid::Uuid::new_v4().to_string(),
		bridge: options.bridge,
		link: Arc::clone(&link),
		to_wallet,
	});
	let peer = WalletPeer::new(link, to_dapp, wallet_rx);

	(transport, peer)
}

/// Reader loop dispatching wallet replies to their callbacks.
async fn run_reader(mut inbound: mpsc::UnboundedReceiver<Value>, callbacks: CallbackMap) {
	while let Some(value) = inbound.recv().await {
		match serde_json::from_value::<Message>(value) {
			Ok(Message::Response(response)) => {
				let Some(callback) = callbacks.lock().await.remove(&response.id) else {
					tracing::warn!(id = response.id, "Cannot find request to respond");
					continue;
				};
				let _ = callback.send(Ok(response));
			}
			Ok(Message::Request(request)) => {
				tracing::debug!(method = %request.method, "Ignoring wallet-initiated request");
			}
			Ok(Message::Unknown(value)) => {
				tracing::debug!(
					"Unknown message type (forward-compatible, ignored): {}",
					serde_json::to_string(&value).unwrap_or_else(|_| "<serialization failed>".to_string())
				);
			}
			Err(e) => tracing::error!("Failed to parse message: {}", e),
		}
	}
	tracing::debug!("Loopback reader stopped");
}

/// RAII guard ensuring callback cleanup when a request future is dropped.
struct CancelGuard {
	id: u64,
	callbacks: CallbackMap,
	completed: bool,
}

impl CancelGuard {
	fn new(id: u64, callbacks: CallbackMap) -> Self {
		Self {
			id,
			callbacks,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}

		let id = self.id;
		let callbacks = Arc::clone(&self.callbacks);

		if let Ok(handle) = tokio::runtime::Handle::try_current() {
			handle.spawn(async move {
				if callbacks.lock().await.remove(&id).is_some() {
					tracing::debug!(id, "CancelGuard: removed orphaned callback");
				}
			});
		}
	}
}

/// Future returned by [`RelayTransport::send_custom_request`] with cancellation cleanup.
struct ResponseFuture {
	rx: oneshot::Receiver<Result<RpcResponse>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<RpcResponse>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Application side of a loopback link.
pub struct RelayTransport {
	client_id: String,
	bridge: String,
	link: Arc<Link>,
	to_wallet: mpsc::UnboundedSender<Value>,
}

impl RelayTransport {
	/// Number of requests still waiting for a response.
	pub async fn pending_requests(&self) -> usize {
		self.link.callbacks.lock().await.len()
	}

	/// Metadata announced to the wallet.
	pub fn client_meta(&self) -> &ClientMeta {
		&self.link.client_meta
	}
}

#[async_trait]
impl SessionTransport for RelayTransport {
	async fn create_session(&self) -> Result<PairingUri> {
		let uri = {
			let mut slot = self.link.session.lock();
			if slot.connected {
				return Err(Error::SessionCreation("Session currently connected".to_string()));
			}
			let topic = uuid::Uuid::new_v4().to_string();
			let key = uuid::Uuid::new_v4().simple().to_string();
			let uri = PairingUri::new(topic, PROTOCOL_VERSION, &self.bridge, key);
			if let Some(stale) = slot.uri.replace(uri.clone()) {
				tracing::debug!(topic = stale.topic(), "Replacing unaccepted session");
			}
			uri
		};

		tracing::debug!(topic = uri.topic(), client_id = %self.client_id, "Created session");
		Ok(uri)
	}

	async fn kill_session(&self) -> Result<()> {
		let Some(topic) = self.link.clear_session() else {
			return Ok(());
		};

		self.link.fail_pending().await;
		self.link.emit(LifecycleEvent::Disconnect {
			topic,
			message: "Session disconnected".to_string(),
		});
		Ok(())
	}

	fn events(&self) -> broadcast::Receiver<LifecycleEvent> {
		self.link.events.subscribe()
	}

	async fn send_custom_request(&self, request: CustomRequest) -> Result<RpcResponse> {
		if !self.connected() {
			return Err(Error::NotConnected);
		}

		let id = request.id;
		tracing::debug!(id, method = %request.method, "Sending custom request");

		let (tx, rx) = oneshot::channel();
		{
			let mut callbacks = self.link.callbacks.lock().await;
			if callbacks.contains_key(&id) {
				return Err(Error::Protocol(format!("Request id {id} is already in flight")));
			}
			callbacks.insert(id, tx);
		}

		let guard = CancelGuard::new(id, Arc::clone(&self.link.callbacks));

		let value = serde_json::to_value(&request)?;
		if self.to_wallet.send(value).is_err() {
			tracing::error!("Failed to queue request: wallet channel closed");
			return Err(Error::ChannelClosed);
		}

		ResponseFuture { rx, guard }.await
	}

	fn connected(&self) -> bool {
		self.link.session.lock().connected
	}

	fn uri(&self) -> Option<PairingUri> {
		self.link.session.lock().uri.clone()
	}

	fn client_id(&self) -> &str {
		&self.client_id
	}

	fn session_key(&self) -> Option<String> {
		self.link.session.lock().uri.as_ref().map(|uri| uri.key().to_string())
	}
}
