//! Session lifecycle events emitted by a transport.

use serde::{Deserialize, Serialize};

/// Metadata the wallet reports about itself when it accepts a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMeta {
	pub name: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub url: String,
	#[serde(default)]
	pub icons: Vec<String>,
}

/// Payload attached to a successful connect.
///
/// Wallets speaking the v1 protocol only fill `accounts` for EVM chains, so
/// the session layer fetches the address with a custom request instead of
/// reading it from here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPayload {
	#[serde(default)]
	pub peer_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub peer_meta: Option<PeerMeta>,
	#[serde(default)]
	pub accounts: Vec<String>,
}

/// Lifecycle transition of a pairing session.
///
/// Every event carries the topic of the session it belongs to, so a consumer
/// can drop events from a session it already tore down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
	/// The wallet accepted the pairing.
	Connect { topic: String, payload: ConnectPayload },
	/// The pairing attempt failed (rejected by the wallet or broken handshake).
	ConnectFailed { topic: String, message: String },
	/// The session ended, from either side.
	Disconnect { topic: String, message: String },
}

impl LifecycleEvent {
	pub fn topic(&self) -> &str {
		match self {
			LifecycleEvent::Connect { topic, .. }
			| LifecycleEvent::ConnectFailed { topic, .. }
			| LifecycleEvent::Disconnect { topic, .. } => topic,
		}
	}

	/// Short name used in logs.
	pub fn name(&self) -> &'static str {
		match self {
			LifecycleEvent::Connect { .. } => "connect",
			LifecycleEvent::ConnectFailed { .. } => "connect_failed",
			LifecycleEvent::Disconnect { .. } => "disconnect",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lifecycle_event_is_tagged() {
		let event = LifecycleEvent::Disconnect {
			topic: "t1".into(),
			message: "Session disconnected".into(),
		};
		let value = serde_json::to_value(&event).unwrap();
		assert_eq!(value["event"], "disconnect");
		assert_eq!(value["topic"], "t1");
		assert_eq!(event.topic(), "t1");
		assert_eq!(event.name(), "disconnect");
	}

	#[test]
	fn connect_payload_uses_camel_case() {
		let json = r#"{"peerId": "p", "peerMeta": {"name": "Vault"}, "accounts": []}"#;
		let payload: ConnectPayload = serde_json::from_str(json).unwrap();
		assert_eq!(payload.peer_id, "p");
		assert_eq!(payload.peer_meta.unwrap().name, "Vault");
	}
}
