//! JSON-RPC messages carried over a pairing session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Application-defined method call sent to the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRequest {
	/// Request ID used to correlate the response
	pub id: u64,
	pub jsonrpc: String,
	/// Method name, e.g. `keplr_get_key_wallet_connect_v1`
	pub method: String,
	/// Positional parameters; the first one is the chain id by convention
	pub params: Vec<Value>,
}

impl CustomRequest {
	pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
		Self {
			id,
			jsonrpc: JSONRPC_VERSION.to_string(),
			method: method.into(),
			params,
		}
	}
}

/// Reply to a [`CustomRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
	/// ID of the request this response answers
	pub id: u64,
	#[serde(default = "default_jsonrpc")]
	pub jsonrpc: String,
	/// Success result (mutually exclusive with error)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Error result (mutually exclusive with result)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<RpcError>,
}

fn default_jsonrpc() -> String {
	JSONRPC_VERSION.to_string()
}

impl RpcResponse {
	pub fn success(id: u64, result: Value) -> Self {
		Self {
			id,
			jsonrpc: default_jsonrpc(),
			result: Some(result),
			error: None,
		}
	}

	pub fn failure(id: u64, error: RpcError) -> Self {
		Self {
			id,
			jsonrpc: default_jsonrpc(),
			result: None,
			error: Some(error),
		}
	}

	/// Splits the response into its result or error.
	///
	/// A response carrying neither resolves to `Value::Null`.
	pub fn into_result(self) -> Result<Value, RpcError> {
		match self.error {
			Some(error) => Err(error),
			None => Ok(self.result.unwrap_or(Value::Null)),
		}
	}
}

/// JSON-RPC error object returned by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl RpcError {
	pub const METHOD_NOT_FOUND: i64 = -32601;
	pub const INTERNAL: i64 = -32000;

	pub fn new(code: i64, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			data: None,
		}
	}

	pub fn method_not_found(method: &str) -> Self {
		Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {method}"))
	}
}

/// Discriminated union of messages travelling over the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	/// Request message (has `method`)
	Request(CustomRequest),
	/// Response message (has `id` and `result` or `error`)
	Response(RpcResponse),
	/// Unknown message type (forward-compatible catch-all)
	Unknown(Value),
}
