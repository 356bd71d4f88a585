use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Size of the server keypair in bits
pub const KEY_BITS: usize = 2048;
/// File name of the stored private key
pub const PRIVATE_KEY_FILE: &str = "private.pem";
/// File name of the stored public key
pub const PUBLIC_KEY_FILE: &str = "public.pem";

/// Errors that can occur while loading or creating the server keypair
#[derive(Debug, Error)]
pub enum KeyStoreError {
	/// The key directory or a key file could not be created, read, or written
	#[error("Key storage error at {}: {source}", path.display())]
	Storage {
		/// The path that was being accessed
		path: PathBuf,
		/// The underlying IO error
		#[source]
		source: io::Error,
	},
	/// A stored key could not be parsed
	#[error("Key at {} could not be parsed: {message}", path.display())]
	Format {
		/// The file that held the key
		path: PathBuf,
		/// Description of the parse failure
		message: String,
	},
	/// A fresh key could not be generated or encoded
	#[error("Failed to generate key: {0}")]
	Generation(String),
}

/// The single RSA keypair of a server instance.
///
/// Created once at startup and immutable afterwards. The public key PEM is
/// computed during initialization so exporting it never touches the disk.
pub struct KeyStore {
	private_key: RsaPrivateKey,
	public_key: RsaPublicKey,
	public_key_pem: String,
	fingerprint: String,
}

/// Number of leading SHA-256 bytes shown in a key fingerprint
const FINGERPRINT_BYTES: usize = 8;

impl KeyStore {
	/// Load the keypair from the storage directory, or generate and store a new
	/// one if either key file is missing
	pub fn initialize(dir: &Path) -> Result<Self, KeyStoreError> {
		fs::create_dir_all(dir).map_err(|source| KeyStoreError::Storage {
			path: dir.to_owned(),
			source,
		})?;

		let private_path = dir.join(PRIVATE_KEY_FILE);
		let public_path = dir.join(PUBLIC_KEY_FILE);

		if private_path.exists() && public_path.exists() {
			let bytes = fs::read(&private_path).map_err(|source| KeyStoreError::Storage {
				path: private_path.clone(),
				source,
			})?;
			let private_key =
				RsaPrivateKey::from_pkcs1_der(&bytes).map_err(|e| KeyStoreError::Format {
					path: private_path.clone(),
					message: e.to_string(),
				})?;
			tracing::info!(path = %private_path.display(), "Loaded existing authlib keys");

			Self::from_private_key(private_key)
		} else {
			tracing::info!(dir = %dir.display(), "Generating new authlib keys");
			let private_key = generate_private_key()?;
			let out = Self::from_private_key(private_key)?;
			out.write(&private_path, &public_path)?;
			tracing::info!(
				private = %private_path.display(),
				public = %public_path.display(),
				"New authlib keys generated and saved"
			);

			Ok(out)
		}
	}

	/// Wrap an already loaded private key
	pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, KeyStoreError> {
		let public_key = private_key.to_public_key();
		let public_key_pem = public_key
			.to_public_key_pem(LineEnding::LF)
			.map_err(|e| KeyStoreError::Generation(format!("Failed to encode public key: {e}")))?
			.trim_end()
			.to_string();
		let fingerprint = fingerprint(&public_key)?;

		Ok(Self {
			private_key,
			public_key,
			public_key_pem,
			fingerprint,
		})
	}

	/// Write both keys as raw PKCS#1 DER
	fn write(&self, private_path: &Path, public_path: &Path) -> Result<(), KeyStoreError> {
		let private_der = self
			.private_key
			.to_pkcs1_der()
			.map_err(|e| KeyStoreError::Generation(format!("Failed to encode private key: {e}")))?;
		let public_der = self
			.public_key
			.to_pkcs1_der()
			.map_err(|e| KeyStoreError::Generation(format!("Failed to encode public key: {e}")))?;

		fs::write(private_path, private_der.as_bytes()).map_err(|source| {
			KeyStoreError::Storage {
				path: private_path.to_owned(),
				source,
			}
		})?;
		fs::write(public_path, public_der.as_bytes()).map_err(|source| KeyStoreError::Storage {
			path: public_path.to_owned(),
			source,
		})?;

		Ok(())
	}

	/// Get the public key as a PEM string with 64 character lines and no trailing newline
	pub fn export_public_key_pem(&self) -> &str {
		&self.public_key_pem
	}

	/// Get a short hex identifier of the public key, safe to log
	pub fn fingerprint(&self) -> &str {
		&self.fingerprint
	}

	/// Get the public key
	pub fn public_key(&self) -> &RsaPublicKey {
		&self.public_key
	}

	/// Get the private key
	pub(crate) fn private_key(&self) -> &RsaPrivateKey {
		&self.private_key
	}
}

impl std::fmt::Debug for KeyStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KeyStore")
			.field("fingerprint", &self.fingerprint)
			.finish_non_exhaustive()
	}
}

/// Hex prefix of the SHA-256 hash of the SPKI DER public key
fn fingerprint(public_key: &RsaPublicKey) -> Result<String, KeyStoreError> {
	let der = public_key
		.to_public_key_der()
		.map_err(|e| KeyStoreError::Generation(format!("Failed to encode public key: {e}")))?;
	let digest = Sha256::digest(der.as_bytes());
	Ok(digest[..FINGERPRINT_BYTES]
		.iter()
		.map(|byte| format!("{byte:02x}"))
		.collect())
}

/// Generate a new private key of the server key size
pub fn generate_private_key() -> Result<RsaPrivateKey, KeyStoreError> {
	let mut rng = rand::thread_rng();
	RsaPrivateKey::new(&mut rng, KEY_BITS).map_err(|e| KeyStoreError::Generation(e.to_string()))
}
