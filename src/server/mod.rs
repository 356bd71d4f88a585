/// authlib-injector protocol endpoints
pub mod authlib;
/// Per-request caller identification
pub mod caller;
/// Errors returned from handlers
pub mod error;

use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::{middleware, Router};
use foxlauncher_auth::{KeyStore, Signer, TokenKeys};
use tokio::net::TcpListener;

use crate::config::{Config, ServerMeta};
use crate::profile::{JsonProfileStore, ProfileStore};

pub use caller::Caller;
pub use error::ApiError;

/// Everything the handlers share. Immutable once the server has started.
pub struct ServerState {
	/// The server keypair
	pub keys: KeyStore,
	/// Signer over the server private key
	pub signer: Signer,
	/// Keys for validating bearer tokens
	pub tokens: TokenKeys,
	/// Where profiles are looked up
	pub profiles: Box<dyn ProfileStore>,
	/// Advertised metadata
	pub meta: ServerMeta,
	/// Scheme to use when the request does not say which one it came in on
	pub public_scheme: String,
}

impl ServerState {
	/// Assemble the state from already loaded parts
	pub fn new(
		keys: KeyStore,
		tokens: TokenKeys,
		profiles: Box<dyn ProfileStore>,
		meta: ServerMeta,
		public_scheme: String,
	) -> Self {
		let signer = Signer::new(&keys);
		Self {
			keys,
			signer,
			tokens,
			profiles,
			meta,
			public_scheme,
		}
	}

	/// Load the keypair, token keys, and profile store described by the config.
	/// Any failure here means the server must not start.
	pub fn load(config: &Config) -> anyhow::Result<Self> {
		let tokens = TokenKeys::from_base64_secret(&config.jwt_secret)
			.context("Failed to set up token validation")?;
		let keys = KeyStore::initialize(&config.key_dir()).context("Failed to load authlib keys")?;
		let profiles = JsonProfileStore::open(&config.profiles_file)
			.context("Failed to open profile store")?;

		Ok(Self::new(
			keys,
			tokens,
			Box::new(profiles),
			config.meta.clone(),
			config.public_scheme.clone(),
		))
	}
}

/// Create the router for all endpoints
pub fn router(state: Arc<ServerState>) -> Router {
	Router::new()
		.route("/authlib", get(authlib::server_info))
		.route("/authlib/", get(authlib::server_info))
		.route(
			"/authlib/session/minecraft/profile/:uuid",
			get(authlib::profile),
		)
		.route(
			"/authlib/sessionserver/session/minecraft/hasJoined",
			get(authlib::has_joined),
		)
		.route(
			"/authlib/sessionserver/session/minecraft/join",
			post(authlib::join),
		)
		.layer(middleware::from_fn_with_state(
			state.clone(),
			caller::identify,
		))
		.with_state(state)
}

/// Run the server until it is interrupted
pub async fn serve(config: Config) -> anyhow::Result<()> {
	let state = Arc::new(ServerState::load(&config)?);
	tracing::info!(
		fingerprint = state.keys.fingerprint(),
		"Authlib keys ready"
	);

	let listener = TcpListener::bind(config.bind)
		.await
		.with_context(|| format!("Failed to bind to {}", config.bind))?;
	tracing::info!(address = %config.bind, "Authlib server listening");

	axum::serve(listener, router(state))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("Server failed")?;

	tracing::info!("Server stopped");
	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for shutdown signal");
		std::future::pending::<()>().await;
	}
	tracing::info!("Shutting down...");
}
