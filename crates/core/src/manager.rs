//! Pairing session lifecycle.
//!
//! [`SessionManager`] owns the one pairing session an application may hold
//! and walks it through `Idle → Pairing → Connected → Idle`. Lifecycle events
//! from the transport are consumed by a single dispatcher loop
//! ([`SessionManager::run`]) and republished as [`SessionEvent`]s.
//!
//! Entry points that mutate the session are serialized, and any existing
//! session is killed before a new one is created, so two sessions are never
//! open at the same time.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as TokioMutex, MutexGuard};
use tokio::sync::{broadcast, oneshot, watch};
use vc_protocol::{ChainId, DEFAULT_VENDOR, LifecycleEvent, PairingUri, WalletMethods};
use vc_runtime::SessionTransport;

use crate::correlator::{RequestCorrelator, Signature};
use crate::error::{Error, Result};
use crate::events::{ConnectInfo, EventBus, EventStream, EventWaiter, SessionEvent, Subscription};

/// Settings of a [`SessionManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
	/// Vendor prefix of the wallet's custom methods
	pub vendor: String,
	/// Chain recorded before the first session is created
	pub default_chain: ChainId,
	/// Capacity of the session event channel
	pub event_capacity: usize,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			vendor: DEFAULT_VENDOR.to_string(),
			default_chain: ChainId::default(),
			event_capacity: 64,
		}
	}
}

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	/// No session.
	Idle,
	/// A URI was issued and the wallet has not accepted yet.
	Pairing,
	/// The wallet accepted the session.
	Connected,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
	pub phase: Phase,
	pub uri: Option<PairingUri>,
	pub chain: ChainId,
	pub address: Option<String>,
}

impl SessionSnapshot {
	pub fn connected(&self) -> bool {
		self.phase == Phase::Connected
	}
}

/// Outcome of [`SessionManager::reconnect_if_needed`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reconnect {
	/// Still connected; the address was re-fetched.
	Address(String),
	/// Not connected; the pairing URI should be shown again.
	ShowPairing(PairingUri),
}

/// Outcome of [`SessionManager::switch_chain`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChainSwitch {
	/// The connected session stays; the address under the new chain.
	Refetched(String),
	/// The unaccepted session was replaced; the new URI.
	Repaired(PairingUri),
}

#[derive(Debug)]
struct SessionState {
	phase: Phase,
	uri: Option<PairingUri>,
	chain: ChainId,
	address: Option<String>,
}

impl SessionState {
	fn clear(&mut self) {
		self.phase = Phase::Idle;
		self.uri = None;
		self.address = None;
	}
}

/// Owner of the single pairing session.
///
/// Construct one per application and share it by reference (`Arc`). Dropping
/// the manager, or calling [`dispose`](Self::dispose), stops the dispatcher
/// loop and every handler registered through it.
pub struct SessionManager<T: SessionTransport + ?Sized> {
	transport: Arc<T>,
	correlator: RequestCorrelator<T>,
	state: Mutex<SessionState>,
	/// Serializes entry points that mutate the session.
	ops: TokioMutex<()>,
	events: EventBus<SessionEvent>,
	/// Transport subscription, held here while the dispatcher is not running.
	lifecycle: Mutex<Option<broadcast::Receiver<LifecycleEvent>>>,
	shutdown: watch::Sender<bool>,
	/// Bumped whenever the current session is cleared or replaced.
	epoch: watch::Sender<u64>,
}

impl<T: SessionTransport + ?Sized> SessionManager<T> {
	pub fn new(transport: Arc<T>, config: ManagerConfig) -> Self {
		let correlator = RequestCorrelator::new(Arc::clone(&transport), WalletMethods::for_vendor(&config.vendor));
		Self::with_correlator(transport, correlator, config)
	}

	/// Creates a manager around an existing correlator.
	///
	/// The correlator must talk to the same transport.
	pub fn with_correlator(transport: Arc<T>, correlator: RequestCorrelator<T>, config: ManagerConfig) -> Self {
		// Subscribe now so events emitted before run() starts are not lost.
		let lifecycle = transport.events();
		let (shutdown, _) = watch::channel(false);
		let (epoch, _) = watch::channel(0);

		Self {
			transport,
			correlator,
			state: Mutex::new(SessionState {
				phase: Phase::Idle,
				uri: None,
				chain: config.default_chain,
				address: None,
			}),
			ops: TokioMutex::new(()),
			events: EventBus::new(config.event_capacity),
			lifecycle: Mutex::new(Some(lifecycle)),
			shutdown,
			epoch,
		}
	}

	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	pub fn correlator(&self) -> &RequestCorrelator<T> {
		&self.correlator
	}

	pub fn snapshot(&self) -> SessionSnapshot {
		let state = self.state.lock();
		SessionSnapshot {
			phase: state.phase,
			uri: state.uri.clone(),
			chain: state.chain.clone(),
			address: state.address.clone(),
		}
	}

	pub fn phase(&self) -> Phase {
		self.state.lock().phase
	}

	pub fn is_connected(&self) -> bool {
		self.phase() == Phase::Connected
	}

	pub fn uri(&self) -> Option<PairingUri> {
		self.state.lock().uri.clone()
	}

	pub fn address(&self) -> Option<String> {
		self.state.lock().address.clone()
	}

	pub fn chain(&self) -> ChainId {
		self.state.lock().chain.clone()
	}

	/// Whether the transport holds session key material.
	pub fn session_exists(&self) -> bool {
		self.transport.session_key().is_some()
	}

	pub fn client_id(&self) -> &str {
		self.transport.client_id()
	}

	/// Subscribes to session events.
	pub fn subscribe(&self) -> EventStream<SessionEvent> {
		EventStream::new(self.events.subscribe())
	}

	/// Waits for the first event matching `predicate`, up to `timeout`.
	///
	/// The waiter is registered immediately; an event emitted between this
	/// call and the first poll of the returned waiter is still delivered.
	pub fn wait_for<F>(&self, predicate: F, timeout: Duration) -> EventWaiter<SessionEvent>
	where
		F: Fn(&SessionEvent) -> bool + Send + Sync + 'static,
	{
		EventWaiter::new(self.events.register_waiter(predicate), timeout)
	}

	/// Creates a new pairing session for `chain`, killing any existing one first.
	pub async fn initialize_session(&self, chain: &ChainId) -> Result<PairingUri> {
		let _ops = self.ops.lock().await;
		self.initialize_locked(chain).await
	}

	async fn initialize_locked(&self, chain: &ChainId) -> Result<PairingUri> {
		if self.session_live() {
			self.kill_locked().await?;
		}

		match self.transport.create_session().await {
			Ok(uri) => {
				{
					let mut state = self.state.lock();
					state.phase = Phase::Pairing;
					state.uri = Some(uri.clone());
					state.chain = chain.clone();
					state.address = None;
				}
				self.bump_epoch();
				tracing::info!(topic = uri.topic(), %chain, "Pairing session created");
				self.events.emit(SessionEvent::UriIssued {
					uri: uri.clone(),
					chain: chain.clone(),
				});
				Ok(uri)
			}
			Err(e) => {
				{
					let mut state = self.state.lock();
					state.clear();
					state.chain = chain.clone();
				}
				self.bump_epoch();
				tracing::warn!(error = %e, "Failed to create pairing session");
				Err(Error::PairingCreation(e))
			}
		}
	}

	fn bump_epoch(&self) {
		self.epoch.send_modify(|epoch| *epoch += 1);
	}

	fn clear_state(&self) {
		self.state.lock().clear();
		self.bump_epoch();
	}

	fn current_topic(&self) -> Option<String> {
		self.state.lock().uri.as_ref().map(|uri| uri.topic().to_string())
	}

	fn session_live(&self) -> bool {
		let live = {
			let state = self.state.lock();
			state.phase != Phase::Idle || state.uri.is_some()
		};
		live || self.transport.connected() || self.transport.session_key().is_some()
	}

	/// Tears down the active session. Does nothing when there is none.
	pub async fn kill_session(&self) -> Result<()> {
		let _ops = self.ops.lock().await;
		self.kill_locked().await
	}

	async fn kill_locked(&self) -> Result<()> {
		if !self.session_live() {
			return Ok(());
		}

		// Clear first: the transport's disconnect event for this topic is
		// then recognized as stale by the dispatcher.
		self.clear_state();
		self.transport.kill_session().await?;

		tracing::info!("Session killed");
		self.events.emit(SessionEvent::Killed);
		Ok(())
	}

	/// Resets the session state to `Idle` without touching the transport.
	///
	/// This is what a disconnect does; applications call it to start over
	/// from a clean state.
	pub fn reset(&self) {
		self.clear_state();
		tracing::debug!("Session state reset");
		self.events.emit(SessionEvent::Reset);
	}

	/// Re-fetches the address when connected, otherwise re-exposes the pairing URI.
	pub async fn reconnect_if_needed(&self, chain: &ChainId) -> Result<Reconnect> {
		let ops = self.ops.lock().await;

		let (phase, uri) = {
			let state = self.state.lock();
			(state.phase, state.uri.clone())
		};

		if phase == Phase::Connected {
			let address = self.refetch_address(ops, chain).await?;
			return Ok(Reconnect::Address(address));
		}

		let uri = uri.ok_or(Error::NoSession)?;
		tracing::debug!(client_id = self.transport.client_id(), "Showing pairing URI");
		self.events.emit(SessionEvent::ShowPairing { uri: uri.clone() });
		Ok(Reconnect::ShowPairing(uri))
	}

	/// Moves the session to another chain.
	///
	/// A connected session keeps its identity and only re-fetches the address;
	/// a session the wallet has not accepted yet is replaced.
	pub async fn switch_chain(&self, chain: &ChainId) -> Result<ChainSwitch> {
		let ops = self.ops.lock().await;

		if self.phase() == Phase::Connected {
			let address = self.refetch_address(ops, chain).await?;
			return Ok(ChainSwitch::Refetched(address));
		}

		let uri = self.initialize_locked(chain).await?;
		Ok(ChainSwitch::Repaired(uri))
	}

	/// Fetches the address without holding `ops` across the wallet round trip.
	///
	/// Fails with [`Error::NotConnected`] if the session ends meanwhile.
	async fn refetch_address(&self, ops: MutexGuard<'_, ()>, chain: &ChainId) -> Result<String> {
		let mut epoch = self.epoch.subscribe();
		drop(ops);

		let address = tokio::select! {
			biased;
			_ = epoch.changed() => return Err(Error::NotConnected),
			fetched = self.correlator.fetch_address(chain) => fetched?,
		};

		let _ops = self.ops.lock().await;
		if epoch.has_changed().unwrap_or(true) || !self.is_connected() {
			return Err(Error::NotConnected);
		}
		{
			let mut state = self.state.lock();
			state.chain = chain.clone();
			state.address = Some(address.clone());
		}
		self.events.emit(SessionEvent::AddressChanged {
			address: address.clone(),
			chain: chain.clone(),
		});
		Ok(address)
	}

	/// Fetches the address for the session's chain and caches it.
	pub async fn fetch_address(&self) -> Result<String> {
		if !self.is_connected() {
			return Err(Error::NotConnected);
		}
		let chain = self.chain();
		let ops = self.ops.lock().await;
		self.refetch_address(ops, &chain).await
	}

	/// Signs `message` with the connected address on the session's chain.
	pub async fn sign_message(&self, message: &str) -> Result<Signature> {
		let (phase, chain, address) = {
			let state = self.state.lock();
			(state.phase, state.chain.clone(), state.address.clone())
		};
		let address = match (phase, address) {
			(Phase::Connected, Some(address)) => address,
			_ => return Err(Error::NotConnected),
		};

		Ok(self.correlator.sign_message(&chain, &address, message).await?)
	}

	/// Processes one lifecycle event from the transport.
	///
	/// Events for a topic other than the current session's are dropped. The
	/// post-connect address fetch runs without holding the entry-point lock,
	/// so a wallet that never answers does not block [`kill_session`](Self::kill_session);
	/// the fetch is abandoned once the session is cleared or replaced.
	pub async fn handle_event(&self, event: LifecycleEvent) -> Result<()> {
		let ops = self.ops.lock().await;

		if self.current_topic().as_deref() != Some(event.topic()) {
			tracing::debug!(
				event = event.name(),
				topic = event.topic(),
				"Ignoring event for stale session"
			);
			return Ok(());
		}

		match event {
			LifecycleEvent::Connect { payload, .. } => {
				if self.is_connected() {
					tracing::debug!(peer_id = %payload.peer_id, "Ignoring repeated connect");
					return Ok(());
				}
				tracing::debug!(peer_id = %payload.peer_id, "Wallet connected");
				self.handle_connect(ops).await
			}
			LifecycleEvent::ConnectFailed { message, .. } => {
				self.clear_state();
				tracing::warn!(%message, "Wallet connection failed");
				self.events.emit(SessionEvent::ConnectFailed {
					message: message.clone(),
				});
				Err(Error::Connect(message))
			}
			LifecycleEvent::Disconnect { message, .. } => {
				tracing::info!(%message, "Session disconnected");
				self.reset();
				self.events.emit(SessionEvent::Disconnected { message });
				Ok(())
			}
		}
	}

	async fn handle_connect(&self, ops: MutexGuard<'_, ()>) -> Result<()> {
		self.events.emit(SessionEvent::PairingDisplayClosed);

		let (chain, topic) = {
			let mut state = self.state.lock();
			state.phase = Phase::Connected;
			(state.chain.clone(), state.uri.as_ref().map(|uri| uri.topic().to_string()))
		};
		let mut epoch = self.epoch.subscribe();
		drop(ops);

		// Address-dependent actions unblock only once this completes.
		let fetched = tokio::select! {
			biased;
			_ = epoch.changed() => {
				tracing::debug!(?topic, "Session ended before the wallet address arrived");
				return Ok(());
			}
			fetched = self.correlator.fetch_address(&chain) => fetched,
		};

		let _ops = self.ops.lock().await;
		if epoch.has_changed().unwrap_or(true) || self.current_topic() != topic || !self.is_connected() {
			tracing::debug!(?topic, "Discarding address fetched for a replaced session");
			return Ok(());
		}

		match fetched {
			Ok(address) => {
				self.state.lock().address = Some(address.clone());
				tracing::info!(%address, %chain, "Wallet address ready");
				self.events.emit(SessionEvent::Connected { address, chain });
				Ok(())
			}
			Err(e) => {
				tracing::warn!(error = %e, %chain, "Failed to fetch wallet address after connect");
				self.events.emit(SessionEvent::AddressFetchFailed {
					message: e.to_string(),
					chain,
				});
				Err(e.into())
			}
		}
	}

	/// Reconciles local state with the transport after lifecycle events were dropped.
	async fn resync(&self) -> Result<()> {
		let ops = self.ops.lock().await;

		let (phase, topic) = {
			let state = self.state.lock();
			(state.phase, state.uri.as_ref().map(|uri| uri.topic().to_string()))
		};
		let Some(topic) = topic else {
			return Ok(());
		};
		let live_topic = self.transport.uri().map(|uri| uri.topic().to_string());
		let connected = self.transport.connected();

		if live_topic.as_deref() != Some(topic.as_str()) || (phase == Phase::Connected && !connected) {
			tracing::warn!(%topic, "Session ended while lifecycle events were dropped");
			self.reset();
			self.events.emit(SessionEvent::Disconnected {
				message: "Session ended while lifecycle events were dropped".to_string(),
			});
			return Ok(());
		}
		if phase == Phase::Pairing && connected {
			tracing::warn!(%topic, "Connect recovered after lifecycle events were dropped");
			return self.handle_connect(ops).await;
		}
		Ok(())
	}

	/// Runs the dispatcher loop until [`dispose`](Self::dispose) or a connect error.
	///
	/// A failed connect ([`Error::Connect`]) ends the loop. Other event
	/// processing errors, such as a failed address fetch after connecting,
	/// are published as events and the loop keeps going so a following
	/// disconnect still resets the session. The transport subscription
	/// survives the return, so `run` can be called again.
	pub async fn run(&self) -> Result<()> {
		let mut lifecycle = self.lifecycle.lock().take().ok_or(Error::AlreadyRunning)?;
		let mut shutdown = self.shutdown.subscribe();

		let result = if *shutdown.borrow_and_update() {
			Ok(())
		} else {
			loop {
				let received = tokio::select! {
					_ = shutdown.changed() => break Ok(()),
					received = lifecycle.recv() => received,
				};
				let outcome = match received {
					Ok(event) => tokio::select! {
						_ = shutdown.changed() => break Ok(()),
						outcome = self.handle_event(event) => outcome,
					},
					Err(broadcast::error::RecvError::Lagged(n)) => {
						tracing::warn!(dropped = n, "Lifecycle events lagged, resyncing with transport");
						self.resync().await
					}
					Err(broadcast::error::RecvError::Closed) => break Ok(()),
				};
				match outcome {
					Ok(()) => {}
					Err(e @ Error::Connect(_)) => {
						tracing::error!(error = %e, "Session dispatcher stopped");
						break Err(e);
					}
					Err(e) => tracing::warn!(error = %e, "Lifecycle event processing failed"),
				}
			}
		};

		*self.lifecycle.lock() = Some(lifecycle);
		result
	}

	/// Registers `handler` to run after each successful connect.
	///
	/// The handler sees the address fetched during connect processing.
	pub fn on_connect<F>(&self, handler: F) -> Subscription
	where
		F: Fn(ConnectInfo) + Send + Sync + 'static,
	{
		self.spawn_handler(move |event| {
			if let SessionEvent::Connected { address, chain } = event {
				handler(ConnectInfo { address, chain });
			}
		})
	}

	/// Registers `handler` to run after each disconnect, with the disconnect reason.
	///
	/// State has already been reset when the handler runs.
	pub fn on_disconnect<F>(&self, handler: F) -> Subscription
	where
		F: Fn(String) + Send + Sync + 'static,
	{
		self.spawn_handler(move |event| {
			if let SessionEvent::Disconnected { message } = event {
				handler(message);
			}
		})
	}

	fn spawn_handler<F>(&self, handler: F) -> Subscription
	where
		F: Fn(SessionEvent) + Send + Sync + 'static,
	{
		let mut rx = self.events.subscribe();
		let mut shutdown = self.shutdown.subscribe();
		let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

		tokio::spawn(async move {
			if *shutdown.borrow_and_update() {
				return;
			}
			loop {
				tokio::select! {
					biased;
					_ = &mut cancel_rx => break,
					_ = shutdown.changed() => break,
					result = rx.recv() => {
						match result {
							Ok(event) => handler(event),
							Err(broadcast::error::RecvError::Lagged(n)) => {
								tracing::warn!(dropped = n, "Session handler lagged");
							}
							Err(broadcast::error::RecvError::Closed) => break,
						}
					}
				}
			}
		});

		Subscription::new(cancel_tx)
	}

	/// Stops the dispatcher loop and every registered handler.
	///
	/// The session itself is left alone; call [`kill_session`](Self::kill_session)
	/// first to tear it down.
	pub fn dispose(&self) {
		if !self.shutdown.send_replace(true) {
			tracing::debug!("Session manager disposed");
		}
		self.events.clear_waiters();
	}
}

impl<T: SessionTransport + ?Sized> Drop for SessionManager<T> {
	fn drop(&mut self) {
		self.dispose();
	}
}
