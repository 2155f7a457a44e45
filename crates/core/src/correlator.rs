//! Custom request correlation.
//!
//! Every call gets a fresh ID from a counter owned by the correlator. The
//! counter starts from the wall clock in microsecond-like units, the same
//! range WalletConnect payload IDs live in, and only ever increases, so two
//! calls from one correlator never share an ID.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vc_protocol::{ChainId, CustomRequest, SignedMessage, WalletKey, WalletMethods};
use vc_runtime::SessionTransport;

use crate::error::CorrelationError;

/// Opaque signature returned by the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub Value);

impl Signature {
	/// The signature as a string, when the wallet encodes it as one.
	pub fn as_str(&self) -> Option<&str> {
		self.0.as_str()
	}

	pub fn into_inner(self) -> Value {
		self.0
	}
}

impl fmt::Display for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.0 {
			Value::String(s) => f.write_str(s),
			other => write!(f, "{other}"),
		}
	}
}

/// Issues custom method calls over the active session.
pub struct RequestCorrelator<T: SessionTransport + ?Sized> {
	transport: Arc<T>,
	methods: WalletMethods,
	next_id: AtomicU64,
}

impl<T: SessionTransport + ?Sized> RequestCorrelator<T> {
	pub fn new(transport: Arc<T>, methods: WalletMethods) -> Self {
		Self::with_first_id(transport, methods, clock_seed())
	}

	/// Creates a correlator whose first request uses `first_id`.
	pub fn with_first_id(transport: Arc<T>, methods: WalletMethods, first_id: u64) -> Self {
		Self {
			transport,
			methods,
			next_id: AtomicU64::new(first_id),
		}
	}

	pub fn methods(&self) -> &WalletMethods {
		&self.methods
	}

	fn next_id(&self) -> u64 {
		self.next_id.fetch_add(1, Ordering::SeqCst)
	}

	/// Sends `method` with `params` and waits for the matching response.
	///
	/// There is no timeout here; a deadline, if needed, belongs to the caller.
	pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, CorrelationError> {
		if !self.transport.connected() {
			return Err(CorrelationError::NotConnected);
		}

		let id = self.next_id();
		tracing::debug!(id, method, "Issuing custom request");

		let response = self
			.transport
			.send_custom_request(CustomRequest::new(id, method, params))
			.await?;

		if response.id != id {
			return Err(CorrelationError::IdMismatch {
				expected: id,
				actual: response.id,
			});
		}

		response.into_result().map_err(|e| {
			tracing::debug!(id, code = e.code, "Wallet returned error");
			CorrelationError::Remote {
				code: e.code,
				message: e.message,
			}
		})
	}

	/// Returns every key record the wallet reports for `chain`.
	pub async fn fetch_keys(&self, chain: &ChainId) -> Result<Vec<WalletKey>, CorrelationError> {
		let method = &self.methods.get_key;
		let result = self.call(method, vec![Value::from(chain.as_str())]).await?;
		let keys: Vec<WalletKey> = decode(method, result)?;
		if keys.is_empty() {
			return Err(CorrelationError::EmptyResponse { method: method.clone() });
		}
		Ok(keys)
	}

	/// Returns the bech32 address of the wallet's active key on `chain`.
	///
	/// The wallet answers with a list that only ever holds the active key.
	pub async fn fetch_address(&self, chain: &ChainId) -> Result<String, CorrelationError> {
		let method = &self.methods.get_key;
		let result = self.call(method, vec![Value::from(chain.as_str())]).await?;
		let key: WalletKey = first_record(method, result)?;
		tracing::debug!(address = %key.bech32_address, %chain, "Fetched wallet address");
		Ok(key.bech32_address)
	}

	/// Asks the wallet to sign an arbitrary message with `address` on `chain`.
	pub async fn sign_message(
		&self,
		chain: &ChainId,
		address: &str,
		message: &str,
	) -> Result<Signature, CorrelationError> {
		let method = &self.methods.sign_free_message;
		let params = vec![
			Value::from(chain.as_str()),
			Value::from(address),
			Value::from(message),
		];
		let result = self.call(method, params).await?;
		let signed: SignedMessage = first_record(method, result)?;
		Ok(Signature(signed.signature))
	}
}

fn decode<R: DeserializeOwned>(method: &str, value: Value) -> Result<R, CorrelationError> {
	serde_json::from_value(value).map_err(|source| CorrelationError::Decode {
		method: method.to_string(),
		source,
	})
}

/// Decodes the first element of a result list.
fn first_record<R: DeserializeOwned>(method: &str, value: Value) -> Result<R, CorrelationError> {
	let records: Vec<Value> = decode(method, value)?;
	let first = records
		.into_iter()
		.next()
		.ok_or_else(|| CorrelationError::EmptyResponse {
			method: method.to_string(),
		})?;
	decode(method, first)
}

fn clock_seed() -> u64 {
	let millis = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or_default();
	millis.saturating_mul(1000).max(1)
}
