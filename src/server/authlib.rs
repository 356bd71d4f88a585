//! The authlib-injector session protocol.
//!
//! Every endpoint is stateless. A client confirms it owns a profile with
//! `join`, and the game server then asks `hasJoined` with the same server id.
//! Nothing is remembered in between; the `hasJoined` response carries a
//! signature over `serverId + uuid` made with the key published at `/authlib`.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::{HostRejection, JsonRejection, QueryRejection};
use axum::extract::{Host, Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::{Caller, ServerState};
use crate::profile::textures::TexturesPayload;
use crate::profile::{same_profile, Identity};
use crate::util::utc_timestamp_millis;

/// Header that tells authlib-injector where the API lives
pub const API_LOCATION_HEADER: HeaderName =
	HeaderName::from_static("x-authlib-injector-api-location");

/// Name of the property that carries skins and capes
const TEXTURES_PROPERTY: &str = "textures";

/// Response of the server info endpoint
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
	/// Server metadata
	pub meta: ServerInfoMeta,
	/// Domains that skins may be loaded from
	pub skin_domains: Vec<String>,
	/// PEM of the signing key, without newlines
	pub signature_publickey: String,
}

/// Metadata part of [`ServerInfo`]
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfoMeta {
	/// Human readable server name
	pub server_name: String,
	/// Name of this implementation
	pub implementation_name: String,
	/// Version of this implementation
	pub implementation_version: String,
}

/// A game profile in the shape game servers expect
#[derive(Serialize, Debug)]
pub struct ProfileResponse {
	/// UUID of the profile
	pub id: String,
	/// Name of the profile
	pub name: String,
	/// Profile properties; only `textures` is ever present
	pub properties: Vec<ProfileProperty>,
	/// Signature over `serverId + id`, present for server-side hasJoined
	#[serde(skip_serializing_if = "Option::is_none")]
	pub signature: Option<String>,
}

/// A single profile property
#[derive(Serialize, Debug)]
pub struct ProfileProperty {
	/// Property name
	pub name: &'static str,
	/// Base64 encoded property value
	pub value: String,
	/// Signature over `serverId + id`, present for server-side hasJoined
	#[serde(skip_serializing_if = "Option::is_none")]
	pub signature: Option<String>,
}

/// Body of a join request
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
	access_token: Option<String>,
	selected_profile: Option<String>,
	server_id: Option<String>,
}

/// Query of a hasJoined request
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct HasJoinedQuery {
	username: Option<String>,
	server_id: Option<String>,
	selected_profile: Option<String>,
	ip: Option<String>,
}

/// Where a request was addressed to
struct Origin {
	scheme: String,
	/// Host with port, as sent by the client
	authority: String,
}

impl Origin {
	/// Resolve the origin from the forwarded or requested host and the forwarded scheme
	fn new(
		host: Result<Host, HostRejection>,
		headers: &HeaderMap,
		default_scheme: &str,
	) -> Self {
		let scheme = headers
			.get("x-forwarded-proto")
			.and_then(|value| value.to_str().ok())
			.map(|value| value.split(',').next().unwrap_or_default().trim().to_lowercase())
			.filter(|value| value == "http" || value == "https")
			.unwrap_or_else(|| default_scheme.to_string());
		let authority = host
			.ok()
			.map(|Host(host)| host)
			.filter(|host| !host.is_empty())
			.unwrap_or_else(|| "localhost".to_string());

		Self { scheme, authority }
	}

	/// The host without its port
	fn host(&self) -> &str {
		strip_port(&self.authority)
	}

	/// `<scheme>://<host[:port]>`
	fn base_url(&self) -> String {
		format!("{}://{}", self.scheme, self.authority)
	}
}

/// Remove the port from an authority, keeping IPv6 literals intact
fn strip_port(authority: &str) -> &str {
	if authority.starts_with('[') {
		return match authority.find(']') {
			Some(end) => &authority[..=end],
			None => authority,
		};
	}
	match authority.rsplit_once(':') {
		Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
		_ => authority,
	}
}

/// GET /authlib
pub async fn server_info(
	State(state): State<Arc<ServerState>>,
	host: Result<Host, HostRejection>,
	headers: HeaderMap,
) -> Result<Response, ApiError> {
	let origin = Origin::new(host, &headers, &state.public_scheme);

	let info = ServerInfo {
		meta: ServerInfoMeta {
			server_name: state.meta.server_name.clone(),
			implementation_name: state.meta.implementation_name.clone(),
			implementation_version: state.meta.implementation_version.clone(),
		},
		skin_domains: vec![origin.host().to_string()],
		signature_publickey: state
			.keys
			.export_public_key_pem()
			.replace(['\n', '\r'], ""),
	};

	let location = format!("{}/authlib", origin.base_url());
	let location =
		HeaderValue::from_str(&location).context("Failed to create API location header")?;

	Ok(([(API_LOCATION_HEADER, location)], Json(info)).into_response())
}

/// GET /authlib/session/minecraft/profile/{uuid}
pub async fn profile(
	State(state): State<Arc<ServerState>>,
	Path(uuid): Path<String>,
	host: Result<Host, HostRejection>,
	headers: HeaderMap,
) -> Result<Json<ProfileResponse>, ApiError> {
	let identity = state
		.profiles
		.find_by_uuid(&uuid)
		.await
		.with_context(|| format!("Failed to look up profile {uuid}"))?;
	let Some(identity) = identity else {
		tracing::debug!(%uuid, "Profile not found");
		return Err(ApiError::NotFound);
	};

	let origin = Origin::new(host, &headers, &state.public_scheme);
	let response = profile_response(&identity, &origin, None)?;

	Ok(Json(response))
}

/// GET /authlib/sessionserver/session/minecraft/hasJoined
pub async fn has_joined(
	State(state): State<Arc<ServerState>>,
	host: Result<Host, HostRejection>,
	headers: HeaderMap,
	query: Result<Query<HasJoinedQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
	let Ok(Query(query)) = query else {
		return Err(ApiError::MissingUsername);
	};
	let Some(username) = query.username.filter(|x| !x.is_empty()) else {
		tracing::warn!("hasJoined called without username");
		return Err(ApiError::MissingUsername);
	};
	let server_id = query.server_id.filter(|x| !x.is_empty());
	let selected_profile = query.selected_profile.filter(|x| !x.is_empty());

	let identity = state
		.profiles
		.find_by_username(&username)
		.await
		.with_context(|| format!("Failed to look up user {username}"))?;
	let Some(identity) = identity else {
		tracing::debug!(%username, "User not found for hasJoined");
		return Ok(StatusCode::NO_CONTENT.into_response());
	};

	if let Some(selected_profile) = &selected_profile {
		if !same_profile(selected_profile, &identity.uuid) {
			tracing::warn!(
				%username,
				uuid = %identity.uuid,
				%selected_profile,
				"hasJoined with mismatched selectedProfile"
			);
			return Ok(StatusCode::NO_CONTENT.into_response());
		}
	}

	let origin = Origin::new(host, &headers, &state.public_scheme);
	let signature = match &server_id {
		None => {
			tracing::debug!(%username, uuid = %identity.uuid, "Client-side hasJoined request");
			None
		}
		Some(server_id) => {
			tracing::debug!(
				%username,
				uuid = %identity.uuid,
				%server_id,
				ip = query.ip.as_deref().unwrap_or_default(),
				"Server-side hasJoined request"
			);
			let verification = verification_string(server_id, &identity);
			Some(state.signer.sign(verification.as_bytes())?)
		}
	};

	let response = profile_response(&identity, &origin, signature)?;
	Ok(Json(response).into_response())
}

/// POST /authlib/sessionserver/session/minecraft/join
pub async fn join(
	State(state): State<Arc<ServerState>>,
	Extension(caller): Extension<Caller>,
	body: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
	let Ok(Json(body)) = body else {
		tracing::warn!("Malformed join request body");
		return Err(ApiError::MalformedRequest("Invalid request body"));
	};
	let (Some(access_token), Some(selected_profile), Some(server_id)) = (
		body.access_token.filter(|x| !x.is_empty()),
		body.selected_profile.filter(|x| !x.is_empty()),
		body.server_id.filter(|x| !x.is_empty()),
	) else {
		tracing::warn!("Join request missing required fields");
		return Err(ApiError::MalformedRequest(
			"accessToken, selectedProfile, and serverId are required",
		));
	};

	// Game clients send their token in the body rather than a header
	let caller = if caller.is_authenticated_user() {
		caller
	} else {
		Caller::from_token(&state.tokens, &access_token)
	};
	let Some(caller_uuid) = caller.profile_uuid() else {
		tracing::warn!(%server_id, "No profile UUID in token for join request");
		return Err(ApiError::Unauthenticated);
	};

	if !same_profile(caller_uuid, &selected_profile) {
		tracing::warn!(
			%selected_profile,
			caller_uuid,
			%server_id,
			"Join request for a profile the caller does not own"
		);
		return Err(ApiError::ProfileMismatch);
	}

	let account = caller.claims().map(|claims| claims.sub.as_str()).unwrap_or_default();
	tracing::debug!(account, caller_uuid, %server_id, "Successful join request");
	Ok(StatusCode::NO_CONTENT)
}

/// The string a game server expects to be signed for a profile joining it
pub fn verification_string(server_id: &str, identity: &Identity) -> String {
	format!("{server_id}{}", identity.uuid)
}

/// Build the profile JSON, attaching the signature to the response and its textures property
fn profile_response(
	identity: &Identity,
	origin: &Origin,
	signature: Option<String>,
) -> anyhow::Result<ProfileResponse> {
	let mut properties = Vec::new();
	let timestamp = utc_timestamp_millis()?;
	if let Some(payload) = TexturesPayload::new(identity, &origin.base_url(), timestamp) {
		properties.push(ProfileProperty {
			name: TEXTURES_PROPERTY,
			value: payload.encode()?,
			signature: signature.clone(),
		});
	}

	Ok(ProfileResponse {
		id: identity.uuid.clone(),
		name: identity.name.clone(),
		properties,
		signature,
	})
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use axum::body::{to_bytes, Body};
	use axum::http::header::HOST;
	use axum::http::Request;
	use base64::prelude::{Engine, BASE64_STANDARD};
	use rsa::pkcs1v15::{Signature, VerifyingKey};
	use rsa::pkcs8::DecodePublicKey;
	use rsa::signature::Verifier;
	use rsa::RsaPublicKey;
	use serde_json::{json, Value};
	use sha2::Sha256;
	use tower::ServiceExt;

	use super::*;
	use crate::server::router;
	use crate::server::test_support::{test_state, ALEX_UUID, STEVE_UUID};

	async fn send(
		state: &Arc<ServerState>,
		request: Request<Body>,
	) -> (StatusCode, HeaderMap, Value) {
		let response = router(state.clone()).oneshot(request).await.unwrap();
		let status = response.status();
		let headers = response.headers().clone();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let body = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, headers, body)
	}

	fn get(uri: &str) -> Request<Body> {
		Request::get(uri)
			.header(HOST, "game.example.com")
			.body(Body::empty())
			.unwrap()
	}

	fn join_request(body: Value, bearer: Option<&str>) -> Request<Body> {
		let mut builder = Request::post("/authlib/sessionserver/session/minecraft/join")
			.header(HOST, "game.example.com")
			.header("content-type", "application/json");
		if let Some(bearer) = bearer {
			builder = builder.header("authorization", format!("Bearer {bearer}"));
		}
		builder.body(Body::from(body.to_string())).unwrap()
	}

	fn token_for(state: &ServerState, uuid: &str) -> String {
		state
			.tokens
			.issue("1", "Steve", uuid, Duration::from_secs(60))
			.unwrap()
	}

	fn verifies(state: &ServerState, data: &str, signature: &str) -> bool {
		let pem = state.keys.export_public_key_pem();
		let public_key = RsaPublicKey::from_public_key_pem(pem).unwrap();
		let bytes = BASE64_STANDARD.decode(signature).unwrap();
		let signature = Signature::try_from(bytes.as_slice()).unwrap();
		VerifyingKey::<Sha256>::new(public_key)
			.verify(data.as_bytes(), &signature)
			.is_ok()
	}

	#[test]
	fn test_strip_port() {
		assert_eq!(strip_port("game.example.com"), "game.example.com");
		assert_eq!(strip_port("game.example.com:8080"), "game.example.com");
		assert_eq!(strip_port("[::1]:8080"), "[::1]");
		assert_eq!(strip_port("[::1]"), "[::1]");
	}

	#[tokio::test]
	async fn test_server_info() {
		let state = test_state();
		let (status, headers, body) = send(&state, get("/authlib")).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(
			headers.get(API_LOCATION_HEADER).unwrap(),
			"https://game.example.com/authlib"
		);
		assert_eq!(body["skinDomains"], json!(["game.example.com"]));
		assert_eq!(body["meta"]["serverName"], "FoxLauncher Authlib");
		assert_eq!(body["meta"]["implementationName"], "fox-launcher-authserver");

		let key = body["signaturePublickey"].as_str().unwrap();
		assert!(!key.contains('\n'));
		assert_eq!(
			key,
			state.keys.export_public_key_pem().replace('\n', "")
		);
	}

	#[tokio::test]
	async fn test_server_info_port_and_proxy() {
		let state = test_state();
		let request = Request::get("/authlib")
			.header(HOST, "localhost:8080")
			.header("x-forwarded-proto", "http")
			.body(Body::empty())
			.unwrap();
		let (_, headers, body) = send(&state, request).await;

		assert_eq!(
			headers.get(API_LOCATION_HEADER).unwrap(),
			"http://localhost:8080/authlib"
		);
		assert_eq!(body["skinDomains"], json!(["localhost"]));
	}

	#[tokio::test]
	async fn test_host_from_uri_authority() {
		let state = test_state();
		let request = Request::get("https://game.example.com/authlib")
			.body(Body::empty())
			.unwrap();
		let (_, headers, body) = send(&state, request).await;

		assert_eq!(
			headers.get(API_LOCATION_HEADER).unwrap(),
			"https://game.example.com/authlib"
		);
		assert_eq!(body["skinDomains"], json!(["game.example.com"]));

		let uri = "https://game.example.com/authlib/sessionserver/session/minecraft/hasJoined";
		let request = Request::get(format!("{uri}?username=Steve"))
			.body(Body::empty())
			.unwrap();
		let (status, _, body) = send(&state, request).await;
		assert_eq!(status, StatusCode::OK);

		let decoded = BASE64_STANDARD
			.decode(body["properties"][0]["value"].as_str().unwrap())
			.unwrap();
		let textures: Value = serde_json::from_slice(&decoded).unwrap();
		assert_eq!(
			textures["textures"]["SKIN"]["url"],
			"https://game.example.com/api/cabinet/skin/steve.png"
		);
	}

	#[tokio::test]
	async fn test_forwarded_host_wins() {
		let state = test_state();
		let request = Request::get("/authlib")
			.header(HOST, "127.0.0.1:8080")
			.header("x-forwarded-host", "skins.example.org")
			.body(Body::empty())
			.unwrap();
		let (_, headers, body) = send(&state, request).await;

		assert_eq!(
			headers.get(API_LOCATION_HEADER).unwrap(),
			"https://skins.example.org/authlib"
		);
		assert_eq!(body["skinDomains"], json!(["skins.example.org"]));
	}

	#[tokio::test]
	async fn test_profile_lookup() {
		let state = test_state();
		let uri = format!("/authlib/session/minecraft/profile/{STEVE_UUID}");
		let (status, _, body) = send(&state, get(&uri)).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["id"], STEVE_UUID);
		assert_eq!(body["name"], "Steve");
		let property = &body["properties"][0];
		assert_eq!(property["name"], "textures");
		assert!(property.get("signature").is_none());

		let decoded = BASE64_STANDARD
			.decode(property["value"].as_str().unwrap())
			.unwrap();
		let textures: Value = serde_json::from_slice(&decoded).unwrap();
		assert_eq!(
			textures["textures"]["SKIN"]["url"],
			"https://game.example.com/api/cabinet/skin/steve.png"
		);
		// Steve's cape is not active
		assert!(textures["textures"].get("CAPE").is_none());
	}

	#[tokio::test]
	async fn test_profile_not_found() {
		let state = test_state();
		let (status, _, _) = send(
			&state,
			get("/authlib/session/minecraft/profile/ffffffffffffffffffffffffffffffff"),
		)
		.await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_has_joined_missing_username() {
		let state = test_state();
		let (status, _, body) =
			send(&state, get("/authlib/sessionserver/session/minecraft/hasJoined")).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "Username is required");

		let (status, _, _) = send(
			&state,
			get("/authlib/sessionserver/session/minecraft/hasJoined?username=&serverId=abc"),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_has_joined_unknown_user() {
		let state = test_state();
		let (status, _, body) = send(
			&state,
			get("/authlib/sessionserver/session/minecraft/hasJoined?username=Herobrine"),
		)
		.await;
		assert_eq!(status, StatusCode::NO_CONTENT);
		assert_eq!(body, Value::Null);
	}

	#[tokio::test]
	async fn test_has_joined_profile_mismatch() {
		let state = test_state();
		let uri = format!(
			"/authlib/sessionserver/session/minecraft/hasJoined?username=Steve&serverId=abc&selectedProfile={ALEX_UUID}"
		);
		let (status, _, _) = send(&state, get(&uri)).await;
		assert_eq!(status, StatusCode::NO_CONTENT);
	}

	#[tokio::test]
	async fn test_has_joined_client_side() {
		let state = test_state();
		let (status, _, body) = send(
			&state,
			get("/authlib/sessionserver/session/minecraft/hasJoined?username=Steve"),
		)
		.await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["id"], STEVE_UUID);
		assert!(body.get("signature").is_none());
		assert!(body["properties"][0].get("signature").is_none());
	}

	#[tokio::test]
	async fn test_has_joined_server_side_signature() {
		let state = test_state();
		let uri = format!(
			"/authlib/sessionserver/session/minecraft/hasJoined?username=Steve&serverId=abc&selectedProfile={STEVE_UUID}&ip=127.0.0.1"
		);
		let (status, _, body) = send(&state, get(&uri)).await;

		assert_eq!(status, StatusCode::OK);
		let signature = body["signature"].as_str().unwrap();
		assert!(verifies(&state, &format!("abc{STEVE_UUID}"), signature));
		assert!(!verifies(&state, &format!("abd{STEVE_UUID}"), signature));
		assert_eq!(body["properties"][0]["signature"], signature);
	}

	#[tokio::test]
	async fn test_has_joined_server_side_without_textures() {
		let state = test_state();
		let (status, _, body) = send(
			&state,
			get("/authlib/sessionserver/session/minecraft/hasJoined?username=alex&serverId=abc"),
		)
		.await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["properties"], json!([]));
		let signature = body["signature"].as_str().unwrap();
		assert!(verifies(&state, &format!("abc{ALEX_UUID}"), signature));
	}

	#[tokio::test]
	async fn test_join_success_with_body_token() {
		let state = test_state();
		let token = token_for(&state, STEVE_UUID);
		let body = json!({
			"accessToken": token,
			"selectedProfile": STEVE_UUID,
			"serverId": "abc"
		});

		let (status, _, body) = send(&state, join_request(body, None)).await;
		assert_eq!(status, StatusCode::NO_CONTENT);
		assert_eq!(body, Value::Null);
	}

	#[tokio::test]
	async fn test_join_success_with_header_token() {
		let state = test_state();
		let token = token_for(&state, STEVE_UUID);
		let body = json!({
			"accessToken": "opaque",
			"selectedProfile": STEVE_UUID,
			"serverId": "abc"
		});

		let (status, _, _) = send(&state, join_request(body, Some(&token))).await;
		assert_eq!(status, StatusCode::NO_CONTENT);
	}

	#[tokio::test]
	async fn test_join_profile_mismatch() {
		let state = test_state();
		let token = token_for(&state, STEVE_UUID);
		let body = json!({ "accessToken": token, "selectedProfile": ALEX_UUID, "serverId": "abc" });

		let (status, _, body) = send(&state, join_request(body, Some(&token))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(
			body["error"],
			"Selected profile does not belong to the authenticated user."
		);
	}

	#[tokio::test]
	async fn test_join_unauthenticated() {
		let state = test_state();
		let body = json!({
			"accessToken": "garbage",
			"selectedProfile": STEVE_UUID,
			"serverId": "abc"
		});

		let (status, _, _) = send(&state, join_request(body, None)).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
	}

	#[tokio::test]
	async fn test_join_malformed() {
		let state = test_state();
		let token = token_for(&state, STEVE_UUID);

		let missing = json!({ "accessToken": token, "selectedProfile": STEVE_UUID });
		let (status, _, _) = send(&state, join_request(missing, Some(&token))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let empty = json!({ "accessToken": token, "selectedProfile": "", "serverId": "abc" });
		let (status, _, _) = send(&state, join_request(empty, Some(&token))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let request = Request::post("/authlib/sessionserver/session/minecraft/join")
			.header("content-type", "application/json")
			.body(Body::from("{not json"))
			.unwrap();
		let (status, _, body) = send(&state, request).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "Invalid request body");
	}
}
