//! Session event infrastructure.
//!
//! The session manager republishes every lifecycle transition as a
//! [`SessionEvent`] so that presentation code can follow along:
//!
//! - [`EventBus`] - internal dispatcher combining a broadcast channel with predicate-based waiters
//! - [`EventStream`] - wrapper around [`broadcast::Receiver`] with lag handling
//! - [`EventWaiter`] - one-shot event capture with timeout support
//! - [`Subscription`] - RAII handle for callback-style handlers
//!
//! [`broadcast::Receiver`]: tokio::sync::broadcast::Receiver

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use vc_protocol::{ChainId, PairingUri};

use crate::error::{Error, Result};

/// Lifecycle transition published by the session manager.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
	/// A new pairing session was created; display this URI.
	UriIssued { uri: PairingUri, chain: ChainId },
	/// The pairing URI should be displayed again.
	ShowPairing { uri: PairingUri },
	/// The wallet accepted; any open pairing display should close.
	PairingDisplayClosed,
	/// Connect processing finished and the active address is known.
	Connected { address: String, chain: ChainId },
	/// The active address was re-fetched (reconnect or chain switch).
	AddressChanged { address: String, chain: ChainId },
	/// The wallet connected but its address could not be fetched.
	///
	/// The session stays connected without an address.
	AddressFetchFailed { message: String, chain: ChainId },
	/// The pairing attempt failed; a new session is needed.
	ConnectFailed { message: String },
	/// The session ended; state has been reset.
	Disconnected { message: String },
	/// The session was torn down locally.
	Killed,
	/// State was reset explicitly.
	Reset,
}

/// Details handed to [`on_connect`](crate::SessionManager::on_connect) handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectInfo {
	pub address: String,
	pub chain: ChainId,
}

/// RAII handle that cancels an event callback when dropped.
///
/// Returned by [`SessionManager::on_connect`] and
/// [`SessionManager::on_disconnect`]. The background task that invokes the
/// callback stops when this handle is dropped, when
/// [`unsubscribe`](Self::unsubscribe) is called, or when the manager is
/// disposed.
///
/// [`SessionManager::on_connect`]: crate::SessionManager::on_connect
/// [`SessionManager::on_disconnect`]: crate::SessionManager::on_disconnect
pub struct Subscription {
	cancel_tx: Option<oneshot::Sender<()>>,
}

impl Subscription {
	pub(crate) fn new(cancel_tx: oneshot::Sender<()>) -> Self {
		Self {
			cancel_tx: Some(cancel_tx),
		}
	}

	/// Explicitly cancels the subscription, equivalent to dropping it.
	pub fn unsubscribe(mut self) {
		if let Some(tx) = self.cancel_tx.take() {
			let _ = tx.send(());
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(tx) = self.cancel_tx.take() {
			let _ = tx.send(());
		}
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("active", &self.cancel_tx.is_some())
			.finish()
	}
}

struct WaiterEntry<E> {
	predicate: Box<dyn Fn(&E) -> bool + Send + Sync>,
	complete_tx: oneshot::Sender<E>,
}

/// Internal event bus combining a broadcast channel with predicate-based waiters.
///
/// Waiters are checked first during [`emit`](Self::emit), so `wait_for`
/// callers get the event even when broadcast receivers are lagging.
pub(crate) struct EventBus<E: Clone + Send + 'static> {
	tx: broadcast::Sender<E>,
	waiters: Mutex<Vec<WaiterEntry<E>>>,
}

impl<E: Clone + Send + 'static> EventBus<E> {
	/// Creates a new [`EventBus`] with the specified broadcast channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self {
			tx,
			waiters: Mutex::new(Vec::new()),
		}
	}

	/// Emits an event to matching waiters, then to all subscribers.
	pub fn emit(&self, event: E) {
		{
			let mut waiters = self.waiters.lock();
			let mut i = 0;
			while i < waiters.len() {
				if (waiters[i].predicate)(&event) {
					let entry = waiters.swap_remove(i);
					let _ = entry.complete_tx.send(event.clone());
				} else {
					i += 1;
				}
			}
		}
		let _ = self.tx.send(event);
	}

	/// Subscribes to future events.
	pub fn subscribe(&self) -> broadcast::Receiver<E> {
		self.tx.subscribe()
	}

	/// Registers a waiter that receives the first matching event.
	pub fn register_waiter<F>(&self, predicate: F) -> oneshot::Receiver<E>
	where
		F: Fn(&E) -> bool + Send + Sync + 'static,
	{
		let (complete_tx, complete_rx) = oneshot::channel();
		self.waiters.lock().push(WaiterEntry {
			predicate: Box::new(predicate),
			complete_tx,
		});
		complete_rx
	}

	/// Drops every pending waiter; their receivers resolve with an error.
	pub fn clear_waiters(&self) {
		self.waiters.lock().clear();
	}

	#[cfg(test)]
	pub fn waiter_count(&self) -> usize {
		self.waiters.lock().len()
	}
}

/// Wrapper around [`broadcast::Receiver`] that handles lag by logging and continuing.
///
/// [`broadcast::Receiver`]: tokio::sync::broadcast::Receiver
pub struct EventStream<E: Clone + Send + 'static> {
	rx: broadcast::Receiver<E>,
}

impl<E: Clone + Send + 'static> EventStream<E> {
	pub(crate) fn new(rx: broadcast::Receiver<E>) -> Self {
		Self { rx }
	}

	/// Receives the next event.
	///
	/// Returns `None` once the source manager is dropped.
	pub async fn recv(&mut self) -> Option<E> {
		loop {
			match self.rx.recv().await {
				Ok(event) => return Some(event),
				Err(broadcast::error::RecvError::Lagged(n)) => {
					tracing::warn!(dropped = n, "Event stream lagged, dropped events");
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}

	/// Returns an event if one is immediately available.
	pub fn try_recv(&mut self) -> Option<E> {
		loop {
			match self.rx.try_recv() {
				Ok(event) => return Some(event),
				Err(broadcast::error::TryRecvError::Lagged(n)) => {
					tracing::warn!(dropped = n, "Event stream lagged, dropped events");
				}
				Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {
					return None;
				}
			}
		}
	}
}

/// One-shot event waiter with timeout support.
///
/// Use [`wait()`](Self::wait) for the configured timeout, or `.await` it
/// directly to wait without one.
pub struct EventWaiter<E> {
	rx: oneshot::Receiver<E>,
	timeout: Duration,
}

impl<E: Send + 'static> EventWaiter<E> {
	pub(crate) fn new(rx: oneshot::Receiver<E>, timeout: Duration) -> Self {
		Self { rx, timeout }
	}

	/// Waits for the event with the configured timeout.
	///
	/// # Errors
	///
	/// - [`Error::Timeout`] if no matching event arrives in time
	/// - [`Error::Disposed`] if the manager goes away first
	pub async fn wait(self) -> Result<E> {
		tokio::time::timeout(self.timeout, self.rx)
			.await
			.map_err(|_| Error::Timeout("Timeout waiting for session event".to_string()))?
			.map_err(|_| Error::Disposed)
	}
}

impl<E: Send + 'static> Future for EventWaiter<E> {
	type Output = Result<E>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(Ok(event)) => Poll::Ready(Ok(event)),
			Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Disposed)),
			Poll::Pending => Poll::Pending,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn uri() -> PairingUri {
		PairingUri::new("topic", 1, "https://bridge.example", "00")
	}

	#[tokio::test]
	async fn event_bus_broadcasts_to_all_subscribers() {
		let bus: EventBus<SessionEvent> = EventBus::new(16);
		let mut rx1 = bus.subscribe();
		let mut rx2 = bus.subscribe();

		bus.emit(SessionEvent::Killed);

		assert_eq!(rx1.recv().await.unwrap(), SessionEvent::Killed);
		assert_eq!(rx2.recv().await.unwrap(), SessionEvent::Killed);
	}

	#[test]
	fn try_recv_skips_lagged_events() {
		let bus: EventBus<SessionEvent> = EventBus::new(2);
		let mut stream = EventStream::new(bus.subscribe());
		assert!(stream.try_recv().is_none());

		bus.emit(SessionEvent::Killed);
		bus.emit(SessionEvent::Reset);
		bus.emit(SessionEvent::PairingDisplayClosed);

		assert_eq!(stream.try_recv(), Some(SessionEvent::Reset));
		assert_eq!(stream.try_recv(), Some(SessionEvent::PairingDisplayClosed));
		assert!(stream.try_recv().is_none());
	}

	#[tokio::test]
	async fn waiter_receives_first_matching_event_and_is_removed() {
		let bus: EventBus<SessionEvent> = EventBus::new(16);
		let waiter = bus.register_waiter(|e| matches!(e, SessionEvent::ShowPairing { .. }));
		assert_eq!(bus.waiter_count(), 1);

		bus.emit(SessionEvent::Reset);
		assert_eq!(bus.waiter_count(), 1);

		bus.emit(SessionEvent::ShowPairing { uri: uri() });
		assert_eq!(bus.waiter_count(), 0);
		assert_eq!(waiter.await.unwrap(), SessionEvent::ShowPairing { uri: uri() });
	}

	#[tokio::test]
	async fn cleared_waiter_resolves_as_disposed() {
		let bus: EventBus<SessionEvent> = EventBus::new(16);
		let waiter = EventWaiter::new(bus.register_waiter(|_| true), Duration::from_secs(5));

		bus.clear_waiters();

		assert!(matches!(waiter.wait().await, Err(Error::Disposed)));
	}

	#[tokio::test]
	async fn event_waiter_times_out() {
		let (_tx, rx) = oneshot::channel::<SessionEvent>();
		let waiter = EventWaiter::new(rx, Duration::from_millis(10));

		let result = waiter.wait().await;
		assert!(matches!(result, Err(Error::Timeout(_))));
	}

	#[tokio::test]
	async fn event_stream_returns_none_when_bus_dropped() {
		let bus: EventBus<SessionEvent> = EventBus::new(16);
		let mut stream = EventStream::new(bus.subscribe());

		bus.emit(SessionEvent::Reset);
		drop(bus);

		assert_eq!(stream.recv().await, Some(SessionEvent::Reset));
		assert_eq!(stream.recv().await, None);
	}

	#[test]
	fn subscription_cancels_on_drop() {
		let (tx, mut rx) = oneshot::channel::<()>();
		let sub = Subscription::new(tx);

		drop(sub);

		assert!(rx.try_recv().is_ok());
	}
}
