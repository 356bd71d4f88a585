use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::prelude::{Engine, BASE64_STANDARD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default lifetime of issued tokens
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Errors from bearer token handling
#[derive(Debug, Error)]
pub enum TokenError {
	/// The configured secret is not valid base64
	#[error("Token secret is not valid base64: {0}")]
	Secret(#[from] base64::DecodeError),
	/// The configured secret decoded to nothing
	#[error("Token secret is empty")]
	EmptySecret,
	/// The token was rejected
	#[error("Invalid token: {0}")]
	Invalid(#[from] jsonwebtoken::errors::Error),
	/// The system clock is before the Unix epoch
	#[error("System time is before the Unix epoch")]
	Clock,
	/// The requested lifetime puts the expiration past the representable range
	#[error("Token lifetime is too long")]
	Lifetime,
}

/// Claims carried in a bearer token
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
	/// Unique ID of the account
	pub sub: String,
	/// Username of the account
	#[serde(default)]
	pub name: String,
	/// UUID of the game profile owned by the account
	#[serde(default)]
	pub user_uuid: Option<String>,
	/// Issue time, as a UTC timestamp in seconds
	pub iat: u64,
	/// Expiration time, as a UTC timestamp in seconds
	pub exp: u64,
}

/// HS256 keys used to validate and issue bearer tokens
#[derive(Clone)]
pub struct TokenKeys {
	encoding: EncodingKey,
	decoding: DecodingKey,
	validation: Validation,
}

impl TokenKeys {
	/// Create keys from a base64 encoded secret
	pub fn from_base64_secret(secret: &str) -> Result<Self, TokenError> {
		let secret = BASE64_STANDARD.decode(secret.trim())?;
		if secret.is_empty() {
			return Err(TokenError::EmptySecret);
		}

		let mut validation = Validation::new(Algorithm::HS256);
		validation.leeway = 0;

		Ok(Self {
			encoding: EncodingKey::from_secret(&secret),
			decoding: DecodingKey::from_secret(&secret),
			validation,
		})
	}

	/// Validate a token and return its claims. Checks the signature and expiration.
	pub fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
		let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation)?;
		Ok(data.claims)
	}

	/// Issue a token for an account that expires after the given lifetime
	pub fn issue(
		&self,
		sub: &str,
		name: &str,
		user_uuid: &str,
		lifetime: Duration,
	) -> Result<String, TokenError> {
		let now = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_err(|_| TokenError::Clock)?
			.as_secs();
		let claims = TokenClaims {
			sub: sub.to_string(),
			name: name.to_string(),
			user_uuid: Some(user_uuid.to_string()),
			iat: now,
			exp: now
				.checked_add(lifetime.as_secs())
				.ok_or(TokenError::Lifetime)?,
		};
		self.encode(&claims)
	}

	/// Sign arbitrary claims
	pub fn encode(&self, claims: &TokenClaims) -> Result<String, TokenError> {
		let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?;
		Ok(token)
	}
}

impl std::fmt::Debug for TokenKeys {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "TokenKeys(***)")
	}
}

/// Generate a random 256-bit secret, encoded as base64
pub fn generate_secret() -> String {
	let mut bytes = [0u8; 32];
	rand::thread_rng().fill_bytes(&mut bytes);
	BASE64_STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_issue_and_validate() {
		let keys = TokenKeys::from_base64_secret(&generate_secret()).unwrap();
		let token = keys
			.issue("7", "Steve", "853c80ef3c3749fdaa49938b674adae6", DEFAULT_TOKEN_LIFETIME)
			.unwrap();

		let claims = keys.validate(&token).unwrap();
		assert_eq!(claims.sub, "7");
		assert_eq!(claims.name, "Steve");
		assert_eq!(
			claims.user_uuid.as_deref(),
			Some("853c80ef3c3749fdaa49938b674adae6")
		);
	}

	#[test]
	fn test_wrong_secret_rejected() {
		let issuer = TokenKeys::from_base64_secret(&generate_secret()).unwrap();
		let validator = TokenKeys::from_base64_secret(&generate_secret()).unwrap();
		let token = issuer
			.issue("1", "Alex", "uuid", DEFAULT_TOKEN_LIFETIME)
			.unwrap();

		assert!(matches!(
			validator.validate(&token),
			Err(TokenError::Invalid(..))
		));
	}

	#[test]
	fn test_expired_token_rejected() {
		let keys = TokenKeys::from_base64_secret(&generate_secret()).unwrap();
		let claims = TokenClaims {
			sub: "1".into(),
			name: "Alex".into(),
			user_uuid: Some("uuid".into()),
			iat: 1_000,
			exp: 2_000,
		};
		let token = keys.encode(&claims).unwrap();

		assert!(keys.validate(&token).is_err());
	}

	#[test]
	fn test_lifetime_overflow() {
		let keys = TokenKeys::from_base64_secret(&generate_secret()).unwrap();
		assert!(matches!(
			keys.issue("1", "Alex", "uuid", Duration::from_secs(u64::MAX)),
			Err(TokenError::Lifetime)
		));
	}

	#[test]
	fn test_bad_secret() {
		assert!(matches!(
			TokenKeys::from_base64_secret("not base64!"),
			Err(TokenError::Secret(..))
		));
		assert!(matches!(
			TokenKeys::from_base64_secret(""),
			Err(TokenError::EmptySecret)
		));
	}
}
