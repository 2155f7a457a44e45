//! Scripted transport for session manager tests.
//!
//! Replies are queued per method; lifecycle events are injected by the test.
//! Every create/kill is recorded so tests can check that sessions never
//! overlap.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use vault_connect::{ManagerConfig, SessionManager};
use vc_protocol::{ConnectPayload, CustomRequest, LifecycleEvent, PairingUri, RpcError, RpcResponse};
use vc_runtime::{Error, Result, SessionTransport};

/// How the mock answers one request.
#[derive(Debug, Clone)]
pub enum Reply {
	Result(Value),
	Error(RpcError),
	/// Answer after a delay.
	Delayed(Duration, Value),
	/// Answer with an id one higher than the request's.
	WrongId(Value),
	Timeout,
	/// Never answer.
	Hang,
}

/// Transport operation recorded by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
	Create(String),
	Kill(String),
}

#[derive(Default)]
struct MockState {
	uri: Option<PairingUri>,
	connected: bool,
	sessions_created: u32,
	fail_next_create: Option<String>,
	replies: HashMap<String, VecDeque<Reply>>,
	requests: Vec<CustomRequest>,
	ops: Vec<Op>,
	overlaps: u32,
}

pub struct MockTransport {
	client_id: String,
	state: Mutex<MockState>,
	events: broadcast::Sender<LifecycleEvent>,
}

impl MockTransport {
	pub fn new() -> Arc<Self> {
		let (events, _) = broadcast::channel(64);
		Arc::new(Self {
			client_id: "mock-client".to_string(),
			state: Mutex::new(MockState::default()),
			events,
		})
	}

	/// Makes the next `create_session` fail with `message`.
	pub fn fail_next_create(&self, message: &str) {
		self.state.lock().fail_next_create = Some(message.to_string());
	}

	/// Queues a reply for the next request to `method`.
	pub fn script(&self, method: &str, reply: Reply) {
		self.state
			.lock()
			.replies
			.entry(method.to_string())
			.or_default()
			.push_back(reply);
	}

	/// Queues a get-key reply carrying one record with `address`.
	pub fn script_address(&self, address: &str) {
		self.script(GET_KEY, Reply::Result(key_record(address)));
	}

	/// Marks the current session connected and emits `Connect`.
	pub fn connect(&self) -> PairingUri {
		let uri = {
			let mut state = self.state.lock();
			state.connected = true;
			state.uri.clone().expect("no session to connect")
		};
		self.emit(LifecycleEvent::Connect {
			topic: uri.topic().to_string(),
			payload: ConnectPayload::default(),
		});
		uri
	}

	/// Drops the pending session and emits `ConnectFailed`.
	pub fn fail_connect(&self, message: &str) {
		let topic = self.take_topic();
		self.emit(LifecycleEvent::ConnectFailed {
			topic,
			message: message.to_string(),
		});
	}

	/// Ends the session from the wallet side and emits `Disconnect`.
	pub fn disconnect(&self, message: &str) {
		let topic = self.take_topic();
		self.emit(LifecycleEvent::Disconnect {
			topic,
			message: message.to_string(),
		});
	}

	pub fn emit(&self, event: LifecycleEvent) {
		let _ = self.events.send(event);
	}

	pub fn ops(&self) -> Vec<Op> {
		self.state.lock().ops.clone()
	}

	/// Number of times a session was created while another was still open.
	pub fn overlaps(&self) -> u32 {
		self.state.lock().overlaps
	}

	pub fn requests(&self) -> Vec<CustomRequest> {
		self.state.lock().requests.clone()
	}

	fn take_topic(&self) -> String {
		let mut state = self.state.lock();
		state.connected = false;
		state
			.uri
			.take()
			.map(|uri| uri.topic().to_string())
			.expect("no session")
	}
}

#[async_trait]
impl SessionTransport for MockTransport {
	async fn create_session(&self) -> Result<PairingUri> {
		let mut state = self.state.lock();
		if let Some(message) = state.fail_next_create.take() {
			return Err(Error::SessionCreation(message));
		}
		if state.uri.is_some() {
			state.overlaps += 1;
		}
		state.sessions_created += 1;
		let topic = format!("topic-{}", state.sessions_created);
		let uri = PairingUri::new(topic.clone(), 1, "https://bridge.example", format!("key{}", state.sessions_created));
		state.uri = Some(uri.clone());
		state.connected = false;
		state.ops.push(Op::Create(topic));
		Ok(uri)
	}

	async fn kill_session(&self) -> Result<()> {
		let topic = {
			let mut state = self.state.lock();
			state.connected = false;
			let Some(uri) = state.uri.take() else {
				return Ok(());
			};
			let topic = uri.topic().to_string();
			state.ops.push(Op::Kill(topic.clone()));
			topic
		};
		self.emit(LifecycleEvent::Disconnect {
			topic,
			message: "Session disconnected".to_string(),
		});
		Ok(())
	}

	fn events(&self) -> broadcast::Receiver<LifecycleEvent> {
		self.events.subscribe()
	}

	async fn send_custom_request(&self, request: CustomRequest) -> Result<RpcResponse> {
		let reply = {
			let mut state = self.state.lock();
			if !state.connected {
				return Err(Error::NotConnected);
			}
			state.requests.push(request.clone());
			state.replies.get_mut(&request.method).and_then(VecDeque::pop_front)
		};

		match reply {
			Some(Reply::Result(value)) => Ok(RpcResponse::success(request.id, value)),
			Some(Reply::Error(error)) => Ok(RpcResponse::failure(request.id, error)),
			Some(Reply::Delayed(delay, value)) => {
				tokio::time::sleep(delay).await;
				Ok(RpcResponse::success(request.id, value))
			}
			Some(Reply::WrongId(value)) => Ok(RpcResponse::success(request.id + 1, value)),
			Some(Reply::Timeout) => Err(Error::Timeout(format!("request {}", request.id))),
			Some(Reply::Hang) => std::future::pending().await,
			None => Ok(RpcResponse::failure(request.id, RpcError::method_not_found(&request.method))),
		}
	}

	fn connected(&self) -> bool {
		self.state.lock().connected
	}

	fn uri(&self) -> Option<PairingUri> {
		self.state.lock().uri.clone()
	}

	fn client_id(&self) -> &str {
		&self.client_id
	}

	fn session_key(&self) -> Option<String> {
		self.state.lock().uri.as_ref().map(|uri| uri.key().to_string())
	}
}

pub const GET_KEY: &str = "keplr_get_key_wallet_connect_v1";
pub const SIGN: &str = "keplr_sign_free_message_wallet_connect_v1";

pub fn key_record(address: &str) -> Value {
	json!([{
		"name": "demo",
		"algo": "secp256k1",
		"pubKey": "A1b2",
		"bech32Address": address,
		"isNanoLedger": false
	}])
}

pub fn manager(transport: &Arc<MockTransport>) -> Arc<SessionManager<MockTransport>> {
	Arc::new(SessionManager::new(Arc::clone(transport), ManagerConfig::default()))
}

/// Polls `condition` until it holds or a second passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
	for _ in 0..100 {
		if condition() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	panic!("condition not met within 1s");
}
