mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use color_print::cprintln;

use foxlauncher::config::{key_dir, Config, ConfigDeser, ConfigOverrides, JWT_SECRET_ENV};
use foxlauncher::server;
use foxlauncher_auth::token::generate_secret;
use foxlauncher_auth::{KeyStore, TokenKeys};

use self::output::init_logging;

#[derive(Debug, Subcommand)]
pub enum Command {
	#[command(about = "Run the authlib server")]
	Serve {
		#[command(flatten)]
		config: ConfigArgs,
		/// Address to listen on
		#[arg(short, long)]
		bind: Option<String>,
	},
	#[command(about = "Print a new random token secret")]
	GenSecret,
	#[command(about = "Issue a bearer token for a profile, for testing game clients")]
	IssueToken {
		#[command(flatten)]
		config: ConfigArgs,
		/// UUID of the profile the token is for
		#[arg(long)]
		uuid: String,
		/// Name of the account
		#[arg(long)]
		name: String,
		/// Account id to use as the subject. Defaults to the UUID.
		#[arg(long)]
		sub: Option<String>,
		/// Days until the token expires
		#[arg(long, default_value_t = 7)]
		ttl_days: u64,
	},
	#[command(about = "Print the public key that game servers verify signatures with")]
	PublicKey {
		/// Path to the config file
		#[arg(short, long, default_value = "foxlauncher.json")]
		config: PathBuf,
		/// Root directory for server data
		#[arg(long)]
		content_root: Option<PathBuf>,
	},
	#[command(about = "Print the foxlauncher version")]
	Version,
}

/// Arguments shared by commands that load the configuration
#[derive(Debug, Args)]
pub struct ConfigArgs {
	/// Path to the config file
	#[arg(short, long, default_value = "foxlauncher.json")]
	config: PathBuf,
	/// Root directory for server data
	#[arg(long)]
	content_root: Option<PathBuf>,
	/// Base64 token secret
	#[arg(long, env = JWT_SECRET_ENV, hide_env_values = true)]
	jwt_secret: Option<String>,
}

impl ConfigArgs {
	fn load(self, bind: Option<String>) -> anyhow::Result<Config> {
		let deser = ConfigDeser::read(&self.config)
			.with_context(|| format!("Failed to read config at {}", self.config.display()))?;
		let overrides = ConfigOverrides {
			bind,
			content_root: self.content_root,
			jwt_secret: self.jwt_secret,
		};
		Config::resolve(deser, overrides).context("Invalid configuration")
	}
}

#[derive(Debug, Parser)]
#[command(name = "foxlauncher", version)]
pub struct Cli {
	#[command(subcommand)]
	command: Command,
	#[arg(short, long, global = true)]
	debug: bool,
}

/// Run the command line interface
pub async fn run_cli() -> anyhow::Result<()> {
	// Parse the CLI
	let cli = Cli::try_parse();
	if let Err(e) = &cli {
		if let clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion =
			e.kind()
		{
			println!("{e}");
			return Ok(());
		}
	}
	let cli = cli?;

	init_logging(cli.debug);

	match cli.command {
		Command::Serve { config, bind } => {
			let config = config.load(bind)?;
			server::serve(config).await
		}
		Command::GenSecret => {
			println!("{}", generate_secret());
			Ok(())
		}
		Command::IssueToken {
			config,
			uuid,
			name,
			sub,
			ttl_days,
		} => {
			let config = config.load(None)?;
			let tokens = TokenKeys::from_base64_secret(&config.jwt_secret)
				.context("Failed to set up token signing")?;
			let sub = sub.unwrap_or_else(|| uuid.clone());
			let lifetime = token_lifetime(ttl_days)?;
			let token = tokens
				.issue(&sub, &name, &uuid, lifetime)
				.context("Failed to issue token")?;
			println!("{token}");
			Ok(())
		}
		Command::PublicKey {
			config,
			content_root,
		} => {
			let content_root = match content_root {
				Some(content_root) => content_root,
				None => {
					let deser = ConfigDeser::read(&config).with_context(|| {
						format!("Failed to read config at {}", config.display())
					})?;
					deser.content_root().to_owned()
				}
			};
			let keys = KeyStore::initialize(&key_dir(&content_root))
				.context("Failed to load authlib keys")?;
			println!("{}", keys.export_public_key_pem());
			Ok(())
		}
		Command::Version => {
			print_version();
			Ok(())
		}
	}
}

/// Convert a lifetime in days to a duration, rejecting ones that overflow
fn token_lifetime(days: u64) -> anyhow::Result<Duration> {
	let Some(secs) = days.checked_mul(24 * 60 * 60) else {
		bail!("Token lifetime of {days} days is too long");
	};
	Ok(Duration::from_secs(secs))
}

/// Print the foxlauncher version
fn print_version() {
	let version = env!("CARGO_PKG_VERSION");
	cprintln!("foxlauncher version <g>{}</g>", version);
}
