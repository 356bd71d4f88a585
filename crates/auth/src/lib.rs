#![warn(missing_docs)]
#![deny(unsafe_code)]

//! Cryptographic pieces of the FoxLauncher authlib server: the persistent RSA
//! keypair that third-party game servers trust, the signer used for session
//! verification, and HS256 bearer tokens for launcher accounts.

/// Loading, generating and exporting the server keypair
pub mod keys;
/// Signing data with the server private key
pub mod signer;
/// Bearer tokens for launcher accounts
pub mod token;

pub use keys::{KeyStore, KeyStoreError};
pub use rsa::{RsaPrivateKey, RsaPublicKey};
pub use signer::{SignError, Signer};
pub use token::{TokenClaims, TokenError, TokenKeys};

/// A keypair shared by every test in this crate, since generating one is slow
#[cfg(test)]
pub(crate) fn test_keys() -> &'static KeyStore {
	use std::sync::OnceLock;

	static KEYS: OnceLock<KeyStore> = OnceLock::new();
	KEYS.get_or_init(|| {
		let private_key = keys::generate_private_key().expect("Failed to generate test key");
		KeyStore::from_private_key(private_key).expect("Failed to create test keystore")
	})
}
