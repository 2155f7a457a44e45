use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Filter directive for a `-v` count.
pub fn filter_for(verbosity: u8) -> &'static str {
	// 0 = errors only, session chatter stays quiet
	// 1 (-v) = info for session lifecycle, warn for the relay
	// 2+ (-vv) = debug for everything, including message flow
	match verbosity {
		0 => "error",
		1 => "info,vc_runtime=warn",
		_ => "debug",
	}
}

pub fn init_logging(verbosity: u8) {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity)));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
