//! Session lifecycle and request correlation for relay-paired mobile wallets.
//!
//! An application pairs with a signing wallet by publishing a [`PairingUri`]
//! (scanned as a QR code or opened through a deep link). Once the wallet
//! accepts, custom JSON-RPC requests flow over the same relay session.
//!
//! - [`SessionManager`] - owns the single pairing session and republishes its lifecycle
//! - [`RequestCorrelator`] - issues ID-correlated custom calls and decodes wallet replies
//! - [`SessionEvent`] / [`EventStream`] / [`Subscription`] - observer surface for the UI
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vault_connect::{ChainId, ManagerConfig, SessionManager};
//!
//! let manager = Arc::new(SessionManager::new(transport, ManagerConfig::default()));
//! let dispatcher = tokio::spawn({
//!     let manager = Arc::clone(&manager);
//!     async move { manager.run().await }
//! });
//!
//! let uri = manager.initialize_session(&ChainId::release()).await?;
//! show_qr(uri.as_str());
//!
//! let _sub = manager.on_connect(|info| println!("connected as {}", info.address));
//! ```

pub mod correlator;
pub mod error;
pub mod events;
pub mod manager;

pub use correlator::{RequestCorrelator, Signature};
pub use error::{CorrelationError, Error, Result};
pub use events::{ConnectInfo, EventStream, EventWaiter, SessionEvent, Subscription};
pub use manager::{ChainSwitch, ManagerConfig, Phase, Reconnect, SessionManager, SessionSnapshot};

pub use vc_protocol::{ChainId, ClientMeta, PairingUri, WalletKey, WalletMethods};
pub use vc_runtime::SessionTransport;
