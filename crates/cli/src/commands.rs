use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use vault_connect::{ChainId, ManagerConfig, PairingUri, SessionEvent, SessionManager, WalletMethods};
use vc_protocol::ConnectPayload;
use vc_runtime::{LoopbackOptions, RelayTransport, WalletPeer, loopback};

use crate::cli::{Cli, Commands};
use crate::config::{Config, Overrides};
use crate::demo_wallet::DemoWallet;
use crate::error::{CliError, Result};
use crate::output::{self, AddressData, OutputFormat, PairData, ResultBuilder, SignData};

const APPROVAL_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn dispatch(cli: Cli, format: OutputFormat) -> Result<()> {
	let config = Config::load(cli.config.as_deref())?.apply(Overrides {
		chain: cli.chain,
		vendor: cli.vendor,
		bridge: cli.bridge,
	});
	let command = cli.command.name();

	match cli.command {
		Commands::Config => emit(command, config, format),
		Commands::Pair { approve } => {
			let mut session = DemoSession::start(&config).await?;
			let address = if approve { Some(session.approve().await?) } else { None };
			let data = PairData {
				uri: session.uri.to_string(),
				uri_encoded: session.uri.query_encoded(),
				chain: config.default_chain.to_string(),
				client_id: session.manager.client_id().to_string(),
				address,
			};
			session.close().await?;
			emit(command, data, format)
		}
		Commands::Address => {
			let mut session = DemoSession::start(&config).await?;
			let address = session.approve().await?;
			session.close().await?;
			emit(
				command,
				AddressData {
					address,
					chain: config.default_chain.to_string(),
				},
				format,
			)
		}
		Commands::Sign { message } => {
			let mut session = DemoSession::start(&config).await?;
			let address = session.approve().await?;
			let signature = session.manager.sign_message(&message).await?;
			session.close().await?;
			emit(
				command,
				SignData {
					address,
					chain: config.default_chain.to_string(),
					message,
					signature: signature.into_inner(),
				},
				format,
			)
		}
	}
}

fn emit<T: Serialize>(command: &str, data: T, format: OutputFormat) -> Result<()> {
	let result = ResultBuilder::new(command).data(data).build();
	output::print_result(&result, format);
	Ok(())
}

/// A pairing session between a session manager and the loopback demo wallet.
struct DemoSession {
	manager: Arc<SessionManager<RelayTransport>>,
	wallet: WalletPeer,
	dispatcher: JoinHandle<vault_connect::Result<()>>,
	uri: PairingUri,
	chain: ChainId,
}

impl DemoSession {
	async fn start(config: &Config) -> Result<Self> {
		let (transport, wallet) = loopback(LoopbackOptions {
			bridge: config.bridge.clone(),
			client_meta: config.client_meta.clone(),
			..LoopbackOptions::default()
		});

		let methods = WalletMethods::for_vendor(&config.wallet_vendor);
		DemoWallet::new(config.demo_wallet.clone(), methods).serve(&wallet);

		let manager = Arc::new(SessionManager::new(
			transport,
			ManagerConfig {
				vendor: config.wallet_vendor.clone(),
				default_chain: config.default_chain.clone(),
				..ManagerConfig::default()
			},
		));
		let dispatcher = tokio::spawn({
			let manager = Arc::clone(&manager);
			async move { manager.run().await }
		});

		let chain = config.default_chain.clone();
		let uri = manager.initialize_session(&chain).await?;
		tracing::info!(uri = %uri, "Pairing URI issued");

		Ok(Self {
			manager,
			wallet,
			dispatcher,
			uri,
			chain,
		})
	}

	/// Lets the demo wallet accept the session and returns the connected address.
	///
	/// Do not [`close`](Self::close) the session after an error: the
	/// dispatcher may already be finished.
	async fn approve(&mut self) -> Result<String> {
		let ready = self
			.manager
			.wait_for(
				|e| matches!(e, SessionEvent::Connected { .. } | SessionEvent::AddressFetchFailed { .. }),
				APPROVAL_TIMEOUT,
			);

		self.wallet.approve(
			&self.uri,
			ConnectPayload {
				peer_id: "vconnect-demo-wallet".to_string(),
				..ConnectPayload::default()
			},
		)?;

		tokio::select! {
			event = ready.wait() => match event {
				Ok(SessionEvent::Connected { address, chain }) => {
					tracing::info!(%address, %chain, "Demo wallet connected");
					Ok(address)
				}
				Ok(SessionEvent::AddressFetchFailed { message, .. }) => Err(CliError::Wallet(message)),
				Ok(other) => Err(CliError::Dispatcher(format!("unexpected event {other:?}"))),
				Err(e) if e.is_timeout() => Err(CliError::Timeout {
					ms: APPROVAL_TIMEOUT.as_millis() as u64,
					condition: "wallet approval".to_string(),
				}),
				Err(e) => Err(e.into()),
			},
			joined = &mut self.dispatcher => Err(match joined {
				Ok(Err(e)) => e.into(),
				Ok(Ok(())) => CliError::Dispatcher("stopped before the wallet connected".to_string()),
				Err(e) => CliError::Dispatcher(e.to_string()),
			}),
		}
	}

	/// Kills the session and stops the dispatcher, surfacing its error if it failed.
	async fn close(self) -> Result<()> {
		tracing::debug!(chain = %self.chain, "Closing demo session");
		self.manager.kill_session().await?;
		self.manager.dispose();
		match self.dispatcher.await {
			Ok(result) => Ok(result?),
			Err(e) => Err(CliError::Dispatcher(e.to_string())),
		}
	}
}
