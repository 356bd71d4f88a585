use base64::prelude::{Engine, BASE64_STANDARD};
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer as _};
use sha2::Sha256;
use thiserror::Error;

use crate::keys::KeyStore;

/// Errors from signing data
#[derive(Debug, Error)]
pub enum SignError {
	/// Empty input was given
	#[error("Data to sign cannot be empty")]
	InvalidInput,
	/// The key could not produce a signature
	#[error("Failed to sign data: {0}")]
	Signing(String),
}

/// Produces RSASSA-PKCS1-v1_5 SHA-256 signatures with the server private key
#[derive(Clone)]
pub struct Signer {
	key: SigningKey<Sha256>,
}

impl Signer {
	/// Create a signer from the loaded keypair
	pub fn new(keys: &KeyStore) -> Self {
		Self {
			key: SigningKey::<Sha256>::new(keys.private_key().clone()),
		}
	}

	/// Sign the data and return the signature encoded as standard base64
	pub fn sign(&self, data: &[u8]) -> Result<String, SignError> {
		if data.is_empty() {
			return Err(SignError::InvalidInput);
		}
		let signature = self
			.key
			.try_sign(data)
			.map_err(|e| SignError::Signing(e.to_string()))?;

		Ok(BASE64_STANDARD.encode(signature.to_bytes()))
	}
}

impl std::fmt::Debug for Signer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Signer(***)")
	}
}
