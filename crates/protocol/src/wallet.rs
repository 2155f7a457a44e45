//! Wallet-side custom methods and the records they return.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Vendor prefix of the custom methods understood by the reference wallet.
pub const DEFAULT_VENDOR: &str = "keplr";

/// Method names of the custom requests, derived from a vendor prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletMethods {
	pub get_key: String,
	pub sign_free_message: String,
}

impl WalletMethods {
	pub fn for_vendor(vendor: &str) -> Self {
		Self {
			get_key: format!("{vendor}_get_key_wallet_connect_v1"),
			sign_free_message: format!("{vendor}_sign_free_message_wallet_connect_v1"),
		}
	}
}

impl Default for WalletMethods {
	fn default() -> Self {
		Self::for_vendor(DEFAULT_VENDOR)
	}
}

/// Account record returned by the get-key method.
///
/// Only `bech32Address` is required; the wallet fills the rest as it sees fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletKey {
	pub bech32_address: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub algo: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pub_key: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub is_nano_ledger: Option<bool>,
}

/// Record returned by the sign-free-message method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedMessage {
	/// Opaque signature payload, usually a base64 string
	pub signature: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pub_key: Option<Value>,
}

/// Application metadata announced to the wallet with a session request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMeta {
	pub name: String,
	pub description: String,
	pub url: String,
	#[serde(default)]
	pub icons: Vec<String>,
}

impl Default for ClientMeta {
	fn default() -> Self {
		Self {
			name: "dApp example".to_string(),
			description: "Just another dApp".to_string(),
			url: "https://dapp.example/com".to_string(),
			icons: Vec::new(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn methods_follow_vendor_prefix() {
		let methods = WalletMethods::default();
		assert_eq!(methods.get_key, "keplr_get_key_wallet_connect_v1");
		assert_eq!(methods.sign_free_message, "keplr_sign_free_message_wallet_connect_v1");

		let other = WalletMethods::for_vendor("cosmostation");
		assert_eq!(other.get_key, "cosmostation_get_key_wallet_connect_v1");
	}

	#[test]
	fn wallet_key_ignores_extra_fields() {
		let key: WalletKey = serde_json::from_value(json!({
			"name": "main",
			"algo": "secp256k1",
			"bech32Address": "link1abc",
			"address": [1, 2, 3],
			"isNanoLedger": false,
		}))
		.unwrap();
		assert_eq!(key.bech32_address, "link1abc");
		assert_eq!(key.is_nano_ledger, Some(false));
	}

	#[test]
	fn wallet_key_requires_address() {
		assert!(serde_json::from_value::<WalletKey>(json!({"name": "main"})).is_err());
	}
}
