//! Pairing URI.
//!
//! The URI is the only thing the presentation layer needs to start a pairing:
//! it is rendered as a QR code or embedded in a deep link. Its shape is
//! `wc:{topic}@{version}?bridge={bridge-url}&key={symmetric-key-hex}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use url::form_urlencoded;

pub const SCHEME: &str = "wc";

/// Errors produced while parsing a pairing URI.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UriError {
	#[error("invalid pairing URI: {0}")]
	Malformed(String),

	#[error("unsupported pairing URI scheme '{0}', expected 'wc'")]
	Scheme(String),

	#[error("pairing URI is missing '{0}'")]
	Missing(&'static str),
}

/// Shareable connection string of a pairing session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PairingUri {
	raw: String,
	topic: String,
	version: u32,
	bridge: String,
	key: String,
}

impl PairingUri {
	/// Builds a URI from its parts.
	pub fn new(topic: impl Into<String>, version: u32, bridge: &str, key: impl Into<String>) -> Self {
		let topic = topic.into();
		let key = key.into();
		let query = form_urlencoded::Serializer::new(String::new())
			.append_pair("bridge", bridge)
			.append_pair("key", &key)
			.finish();
		Self {
			raw: format!("{SCHEME}:{topic}@{version}?{query}"),
			topic,
			version,
			bridge: bridge.to_string(),
			key,
		}
	}

	/// Parses and validates a `wc:` URI.
	pub fn parse(input: &str) -> Result<Self, UriError> {
		let url = Url::parse(input).map_err(|e| UriError::Malformed(e.to_string()))?;
		if url.scheme() != SCHEME {
			return Err(UriError::Scheme(url.scheme().to_string()));
		}

		let (topic, version) = url.path().split_once('@').ok_or(UriError::Missing("version"))?;
		if topic.is_empty() {
			return Err(UriError::Missing("topic"));
		}
		let version = version
			.parse::<u32>()
			.map_err(|_| UriError::Malformed(format!("bad version '{version}'")))?;

		let mut bridge = None;
		let mut key = None;
		for (name, value) in url.query_pairs() {
			match name.as_ref() {
				"bridge" => bridge = Some(value.into_owned()),
				"key" => key = Some(value.into_owned()),
				_ => {}
			}
		}

		Ok(Self {
			raw: input.to_string(),
			topic: topic.to_string(),
			version,
			bridge: bridge.ok_or(UriError::Missing("bridge"))?,
			key: key.ok_or(UriError::Missing("key"))?,
		})
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}

	/// Session topic, the identity of the pairing on the relay.
	pub fn topic(&self) -> &str {
		&self.topic
	}

	pub fn version(&self) -> u32 {
		self.version
	}

	pub fn bridge(&self) -> &str {
		&self.bridge
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	/// Percent-encoded form, safe to embed as a URL query parameter value.
	pub fn query_encoded(&self) -> String {
		form_urlencoded::byte_serialize(self.raw.as_bytes()).collect()
	}
}

impl fmt::Display for PairingUri {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.raw)
	}
}

impl std::str::FromStr for PairingUri {
	type Err = UriError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl TryFrom<String> for PairingUri {
	type Error = UriError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(&value)
	}
}

impl From<PairingUri> for String {
	fn from(uri: PairingUri) -> Self {
		uri.raw
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BRIDGE: &str = "https://bridge.walletconnect.org";

	#[test]
	fn built_uri_parses_back_to_same_parts() {
		let uri = PairingUri::new("a1b2", 1, BRIDGE, "deadbeef");
		assert_eq!(
			uri.as_str(),
			"wc:a1b2@1?bridge=https%3A%2F%2Fbridge.walletconnect.org&key=deadbeef"
		);

		let parsed = PairingUri::parse(uri.as_str()).unwrap();
		assert_eq!(parsed, uri);
		assert_eq!(parsed.bridge(), BRIDGE);
	}

	#[test]
	fn query_encoding_escapes_reserved_characters() {
		let uri = PairingUri::new("topic", 1, BRIDGE, "00ff");
		let encoded = uri.query_encoded();
		assert!(!encoded.contains(':'));
		assert!(!encoded.contains('?'));
		assert!(!encoded.contains('&'));
		assert!(!encoded.contains('='));
		assert!(encoded.starts_with("wc%3Atopic%401%3Fbridge%3D"));
	}

	#[test]
	fn rejects_other_schemes() {
		let err = PairingUri::parse("https://example.com/x@1?bridge=a&key=b").unwrap_err();
		assert!(matches!(err, UriError::Scheme(s) if s == "https"));
	}

	#[test]
	fn rejects_missing_parts() {
		assert_eq!(
			PairingUri::parse("wc:topic?bridge=a&key=b").unwrap_err(),
			UriError::Missing("version")
		);
		assert_eq!(
			PairingUri::parse("wc:topic@1?bridge=a").unwrap_err(),
			UriError::Missing("key")
		);
		assert!(matches!(PairingUri::parse("not a uri"), Err(UriError::Malformed(_))));
	}

	#[test]
	fn serde_uses_raw_string() {
		let uri = PairingUri::new("t", 1, BRIDGE, "k");
		let json = serde_json::to_string(&uri).unwrap();
		assert_eq!(json, format!("\"{}\"", uri.as_str()));
		let back: PairingUri = serde_json::from_str(&json).unwrap();
		assert_eq!(back, uri);
	}
}
