use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Environment variable that can hold the token secret instead of the config file
pub const JWT_SECRET_ENV: &str = "FOXLAUNCHER_JWT_SECRET";

/// The resolved server configuration
#[derive(Debug, Clone)]
pub struct Config {
	/// Address to listen on
	pub bind: SocketAddr,
	/// Root directory that data paths are relative to
	pub content_root: PathBuf,
	/// Path to the profile store file
	pub profiles_file: PathBuf,
	/// Base64 encoded HS256 secret for bearer tokens
	pub jwt_secret: String,
	/// Scheme advertised when the proxy does not tell us one
	pub public_scheme: String,
	/// Metadata advertised to authlib-injector
	pub meta: ServerMeta,
}

/// Metadata returned by the server info endpoint
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerMeta {
	/// Human readable server name
	pub server_name: String,
	/// Name of this implementation
	pub implementation_name: String,
	/// Version of this implementation
	pub implementation_version: String,
}

impl Default for ServerMeta {
	fn default() -> Self {
		Self {
			server_name: "FoxLauncher Authlib".into(),
			implementation_name: "fox-launcher-authserver".into(),
			implementation_version: env!("CARGO_PKG_VERSION").into(),
		}
	}
}

/// Deserialization struct for the configuration file
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ConfigDeser {
	bind: String,
	content_root: Option<PathBuf>,
	profiles_file: String,
	jwt_secret: Option<String>,
	public_scheme: String,
	meta: ServerMeta,
}

impl Default for ConfigDeser {
	fn default() -> Self {
		Self {
			bind: "0.0.0.0:8080".into(),
			content_root: None,
			profiles_file: "data/profiles.json".into(),
			jwt_secret: None,
			public_scheme: "https".into(),
			meta: ServerMeta::default(),
		}
	}
}

/// Values from the command line that take precedence over the file
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
	/// Override for the listen address
	pub bind: Option<String>,
	/// Override for the content root
	pub content_root: Option<PathBuf>,
	/// Token secret from the command line or environment
	pub jwt_secret: Option<String>,
}

impl ConfigDeser {
	/// Read the config file. A missing file gives the default configuration.
	pub fn read(path: &Path) -> anyhow::Result<Self> {
		if !path.exists() {
			tracing::debug!(path = %path.display(), "Config file not found, using defaults");
			return Ok(Self::default());
		}
		let contents = fs::read_to_string(path).context("Failed to read config file")?;
		Self::parse(&contents)
	}

	/// Parse the config from a string
	pub fn parse(contents: &str) -> anyhow::Result<Self> {
		serde_json::from_str(contents).context("Failed to deserialize config")
	}

	/// The content root from the file, or the working directory
	pub fn content_root(&self) -> &Path {
		self.content_root.as_deref().unwrap_or(Path::new("."))
	}
}

impl Config {
	/// Resolve the configuration from the deserialized file and overrides
	pub fn resolve(deser: ConfigDeser, overrides: ConfigOverrides) -> anyhow::Result<Self> {
		let content_root = match overrides.content_root {
			Some(content_root) => content_root,
			None => deser.content_root().to_owned(),
		};

		let bind = overrides.bind.unwrap_or(deser.bind);
		let bind: SocketAddr = bind
			.parse()
			.with_context(|| format!("Invalid bind address '{bind}'"))?;

		let Some(jwt_secret) = overrides.jwt_secret.or(deser.jwt_secret) else {
			bail!("No token secret configured. Set jwt_secret in the config or {JWT_SECRET_ENV}");
		};

		let public_scheme = deser.public_scheme.to_lowercase();
		if public_scheme != "http" && public_scheme != "https" {
			bail!("Invalid public scheme '{public_scheme}'");
		}

		Ok(Self {
			bind,
			profiles_file: content_root.join(deser.profiles_file),
			content_root,
			jwt_secret,
			public_scheme,
			meta: deser.meta,
		})
	}

	/// Directory where the authlib keypair lives
	pub fn key_dir(&self) -> PathBuf {
		key_dir(&self.content_root)
	}
}

/// Directory where the authlib keypair lives for a content root
pub fn key_dir(content_root: &Path) -> PathBuf {
	content_root.join("data").join("authlib")
}
