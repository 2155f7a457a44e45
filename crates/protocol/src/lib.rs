//! Wire types for the wallet pairing session protocol.
//!
//! This crate holds the data shapes shared by the transport runtime and the
//! session layer:
//!
//! - [`CustomRequest`] / [`RpcResponse`] - JSON-RPC messages carried over a pairing session
//! - [`LifecycleEvent`] - connect/disconnect notifications emitted by a transport
//! - [`PairingUri`] - the shareable `wc:` connection string
//! - [`ChainId`] - network selector passed with every wallet request
//! - [`WalletKey`] / [`SignedMessage`] - records returned by the wallet's custom methods

pub mod chain;
pub mod event;
pub mod rpc;
pub mod uri;
pub mod wallet;

pub use chain::ChainId;
pub use event::{ConnectPayload, LifecycleEvent, PeerMeta};
pub use rpc::{CustomRequest, JSONRPC_VERSION, Message, RpcError, RpcResponse};
pub use uri::{PairingUri, UriError};
pub use wallet::{ClientMeta, DEFAULT_VENDOR, SignedMessage, WalletKey, WalletMethods};
