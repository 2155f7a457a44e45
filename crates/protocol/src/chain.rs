//! Chain identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the network a wallet request applies to.
///
/// Any string the wallet recognizes is valid; [`ChainId::release`] and
/// [`ChainId::beta`] are the two networks the reference deployment uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
	pub const RELEASE: &'static str = "finschia-1";
	pub const BETA: &'static str = "finschia-beta-1";

	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// The production network.
	pub fn release() -> Self {
		Self::new(Self::RELEASE)
	}

	/// The beta network.
	pub fn beta() -> Self {
		Self::new(Self::BETA)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Default for ChainId {
	fn default() -> Self {
		Self::release()
	}
}

impl fmt::Display for ChainId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ChainId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl From<String> for ChainId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl AsRef<str> for ChainId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
