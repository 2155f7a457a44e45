//! JSON configuration for `vconnect`.
//!
//! Lookup order: `--config FILE`, then
//! `$XDG_CONFIG_HOME/vault-connect/config.json`, then built-in defaults.
//! Missing fields fall back to their defaults, and `--chain`, `--vendor` and
//! `--bridge` override whatever the file says.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vc_protocol::{ChainId, ClientMeta, DEFAULT_VENDOR};

const CONFIG_DIR: &str = "vault-connect";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	pub bridge: String,
	pub client_meta: ClientMeta,
	pub default_chain: ChainId,
	pub wallet_vendor: String,
	pub demo_wallet: DemoWalletConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			bridge: "https://bridge.walletconnect.org".to_string(),
			client_meta: ClientMeta::default(),
			default_chain: ChainId::default(),
			wallet_vendor: DEFAULT_VENDOR.to_string(),
			demo_wallet: DemoWalletConfig::default(),
		}
	}
}

/// Account the loopback demo wallet reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoWalletConfig {
	pub address: String,
	pub name: String,
}

impl Default for DemoWalletConfig {
	fn default() -> Self {
		Self {
			address: "link1demo0wallet0address0000000000000000000".to_string(),
			name: "demo".to_string(),
		}
	}
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	pub chain: Option<String>,
	pub vendor: Option<String>,
	pub bridge: Option<String>,
}

impl Config {
	/// Loads the configuration.
	///
	/// An explicit `path` must exist; the default location is optional.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		match path {
			Some(path) => Self::from_file(path),
			None => match default_path() {
				Some(path) if path.is_file() => Self::from_file(&path),
				_ => Ok(Self::default()),
			},
		}
	}

	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
		tracing::debug!(path = %path.display(), "Loaded config");
		Ok(config)
	}

	pub fn apply(mut self, overrides: Overrides) -> Self {
		if let Some(chain) = overrides.chain {
			self.default_chain = ChainId::from(chain);
		}
		if let Some(vendor) = overrides.vendor {
			self.wallet_vendor = vendor;
		}
		if let Some(bridge) = overrides.bridge {
			self.bridge = bridge;
		}
		self
	}
}

/// `$XDG_CONFIG_HOME/vault-connect/config.json` (or the platform equivalent).
pub fn default_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}
