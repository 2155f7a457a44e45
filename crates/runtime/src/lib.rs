//! Session transport runtime.
//!
//! This crate provides the transport layer the session manager drives:
//!
//! - **Transport contract**: [`SessionTransport`], the persistent relay
//!   connection that creates pairing sessions, emits lifecycle events and
//!   carries correlated custom requests
//! - **Loopback relay**: an in-process implementation of the contract with a
//!   wallet-side [`WalletPeer`] handle, used by tests and the demo CLI
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ vault-connect │  Session manager + request correlator
//! └───────┬───────┘
//!         │ SessionTransport
//! ┌───────▼───────┐
//! │  vc-runtime   │  This crate
//! │  ┌─────────┐  │
//! │  │ Relay   │  │  Callback map, response dispatch
//! │  └─────────┘  │
//! │  ┌─────────┐  │
//! │  │ Wallet  │  │  Loopback peer
//! │  └─────────┘  │
//! └───────────────┘
//! ```

pub mod error;
pub mod loopback;
pub mod transport;

pub use error::{Error, Result};
pub use loopback::{LoopbackOptions, RelayTransport, WalletPeer, loopback};
pub use transport::SessionTransport;
