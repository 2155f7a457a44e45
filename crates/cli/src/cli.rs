use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// Help colors in cargo's style: green bold headers, cyan literals.
fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(name = "vconnect")]
#[command(about = "Pair with a mobile wallet over a relay session and issue custom requests")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default) or json
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Configuration file (default: $XDG_CONFIG_HOME/vault-connect/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Chain id the session targets (e.g. finschia-1, finschia-beta-1)
	#[arg(long, global = true, value_name = "ID")]
	pub chain: Option<String>,

	/// Wallet vendor prefix of the custom methods
	#[arg(long, global = true, value_name = "NAME")]
	pub vendor: Option<String>,

	/// Bridge URL written into pairing URIs
	#[arg(long, global = true, value_name = "URL")]
	pub bridge: Option<String>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Create a pairing session and print its URI
	Pair {
		/// Let the demo wallet accept the session and show the address
		#[arg(long)]
		approve: bool,
	},

	/// Pair with the demo wallet and print the active address
	Address,

	/// Pair with the demo wallet and sign an arbitrary message
	Sign {
		/// Message to sign
		message: String,
	},

	/// Print the effective configuration
	Config,
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Pair { .. } => "pair",
			Commands::Address => "address",
			Commands::Sign { .. } => "sign",
			Commands::Config => "config",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn cli_definition_is_valid() {
		Cli::command().debug_assert();
	}

	#[test]
	fn global_flags_apply_after_subcommand() {
		let cli = Cli::try_parse_from(["vconnect", "sign", "hello", "--chain", "finschia-beta-1", "-f", "json", "-vv"])
			.unwrap();
		assert_eq!(cli.chain.as_deref(), Some("finschia-beta-1"));
		assert_eq!(cli.format, OutputFormat::Json);
		assert_eq!(cli.verbose, 2);
		assert!(matches!(cli.command, Commands::Sign { ref message } if message == "hello"));
	}

	#[test]
	fn pair_defaults_to_not_approving() {
		let cli = Cli::try_parse_from(["vconnect", "pair"]).unwrap();
		assert!(matches!(cli.command, Commands::Pair { approve: false }));
		assert_eq!(cli.format, OutputFormat::Text);
	}

	#[test]
	fn sign_requires_message() {
		assert!(Cli::try_parse_from(["vconnect", "sign"]).is_err());
	}
}
