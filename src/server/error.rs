use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use foxlauncher_auth::SignError;
use serde::Serialize;
use thiserror::Error;

/// Errors that a request handler can respond with
#[derive(Debug, Error)]
pub enum ApiError {
	/// The request body or a required field was missing or malformed
	#[error("{0}")]
	MalformedRequest(&'static str),
	/// No valid bearer token was presented
	#[error("Unauthorized: Invalid token")]
	Unauthenticated,
	/// The caller tried to act for a profile they do not own
	#[error("Selected profile does not belong to the authenticated user.")]
	ProfileMismatch,
	/// hasJoined was called without a username
	#[error("Username is required")]
	MissingUsername,
	/// The requested profile does not exist
	#[error("Profile not found")]
	NotFound,
	/// Anything that is our fault. The cause is logged and never sent to the caller.
	#[error("Internal server error")]
	Internal(anyhow::Error),
}

impl ApiError {
	/// The status code this error is reported with
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::MalformedRequest(..) => StatusCode::BAD_REQUEST,
			Self::Unauthenticated => StatusCode::UNAUTHORIZED,
			Self::ProfileMismatch => StatusCode::BAD_REQUEST,
			Self::MissingUsername => StatusCode::BAD_REQUEST,
			Self::NotFound => StatusCode::NOT_FOUND,
			Self::Internal(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl From<anyhow::Error> for ApiError {
	fn from(value: anyhow::Error) -> Self {
		Self::Internal(value)
	}
}

impl From<SignError> for ApiError {
	fn from(value: SignError) -> Self {
		Self::Internal(anyhow::Error::new(value).context("Failed to sign verification string"))
	}
}

#[derive(Serialize)]
struct ErrorBody {
	error: String,
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		if let Self::Internal(e) = &self {
			tracing::error!(error = ?e, "Request failed with an internal error");
		}
		let body = ErrorBody {
			error: self.to_string(),
		};
		(self.status_code(), Json(body)).into_response()
	}
}
