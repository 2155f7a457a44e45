//! Loopback wallet answering the two custom methods from configuration.
//!
//! It holds no keys. The "signature" it returns is the base64 of the message
//! bytes, which is enough to exercise the request path end to end.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use vc_protocol::{CustomRequest, RpcError, WalletMethods};
use vc_runtime::WalletPeer;

use crate::config::DemoWalletConfig;

#[derive(Debug, Clone)]
pub struct DemoWallet {
	account: DemoWalletConfig,
	methods: WalletMethods,
}

impl DemoWallet {
	pub fn new(account: DemoWalletConfig, methods: WalletMethods) -> Self {
		Self { account, methods }
	}

	/// Answers every request arriving at `peer` until the application side goes away.
	pub fn serve(self, peer: &WalletPeer) -> JoinHandle<()> {
		peer.serve(move |request| self.answer(request))
	}

	pub fn answer(&self, request: &CustomRequest) -> Result<Value, RpcError> {
		tracing::debug!(id = request.id, method = %request.method, "Demo wallet request");

		if request.method == self.methods.get_key {
			let chain = string_param(request, 0, "chain id")?;
			tracing::debug!(chain, "Demo wallet reporting key");
			Ok(json!([{
				"name": self.account.name,
				"algo": "secp256k1",
				"bech32Address": self.account.address,
				"isNanoLedger": false
			}]))
		} else if request.method == self.methods.sign_free_message {
			string_param(request, 0, "chain id")?;
			let signer = string_param(request, 1, "signer")?;
			let message = string_param(request, 2, "message")?;
			if signer != self.account.address {
				return Err(RpcError::new(RpcError::INTERNAL, format!("Unknown signer {signer}")));
			}
			Ok(json!([{ "signature": STANDARD.encode(message.as_bytes()) }]))
		} else {
			Err(RpcError::method_not_found(&request.method))
		}
	}
}

fn string_param<'a>(request: &'a CustomRequest, index: usize, name: &str) -> Result<&'a str, RpcError> {
	request
		.params
		.get(index)
		.and_then(Value::as_str)
		.ok_or_else(|| RpcError::new(RpcError::INTERNAL, format!("Missing {name} parameter")))
}
