use tracing_subscriber::EnvFilter;

/// Filter used when RUST_LOG is not set
fn default_filter(debug: bool) -> &'static str {
	if debug {
		"foxlauncher=debug,foxlauncher_auth=debug"
	} else {
		"foxlauncher=info,foxlauncher_auth=info"
	}
}

/// Install the global log subscriber. RUST_LOG takes precedence over the debug flag.
pub fn init_logging(debug: bool) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

	// Fails only if a subscriber is already installed, which is fine
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.try_init();
}
