use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use foxlauncher_auth::{TokenClaims, TokenKeys};

use super::ServerState;

/// Who is making a request, decided once per request from its bearer token
#[derive(Debug, Clone, Default)]
pub struct Caller {
	claims: Option<TokenClaims>,
}

impl Caller {
	/// A caller without valid credentials
	pub fn anonymous() -> Self {
		Self::default()
	}

	/// Validate a raw token. Invalid tokens give an anonymous caller.
	pub fn from_token(tokens: &TokenKeys, token: &str) -> Self {
		match tokens.validate(token) {
			Ok(claims) => Self {
				claims: Some(claims),
			},
			Err(e) => {
				tracing::debug!(error = %e, "Rejected bearer token");
				Self::anonymous()
			}
		}
	}

	/// Whether the caller is a user that owns a game profile
	pub fn is_authenticated_user(&self) -> bool {
		self.profile_uuid().is_some()
	}

	/// The UUID of the game profile the caller owns
	pub fn profile_uuid(&self) -> Option<&str> {
		self.claims
			.as_ref()
			.and_then(|claims| claims.user_uuid.as_deref())
			.filter(|uuid| !uuid.is_empty())
	}

	/// The validated token claims, if any
	pub fn claims(&self) -> Option<&TokenClaims> {
		self.claims.as_ref()
	}
}

/// Get the token from an `Authorization: Bearer` header value
fn bearer_token(value: &str) -> Option<&str> {
	let (scheme, token) = value.split_once(' ')?;
	if !scheme.eq_ignore_ascii_case("bearer") {
		return None;
	}
	let token = token.trim();
	(!token.is_empty()).then_some(token)
}

/// Middleware that attaches a [`Caller`] to every request
pub async fn identify(
	State(state): State<Arc<ServerState>>,
	mut request: Request,
	next: Next,
) -> Response {
	let caller = request
		.headers()
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(bearer_token)
		.map(|token| Caller::from_token(&state.tokens, token))
		.unwrap_or_default();

	request.extensions_mut().insert(caller);
	next.run(request).await
}
