use std::collections::BTreeMap;

use anyhow::Context;
use base64::prelude::{Engine, BASE64_STANDARD};
use serde::Serialize;

use super::Identity;

/// Route that serves uploaded skins
pub const SKIN_ROUTE: &str = "/api/cabinet/skin";
/// Route that serves uploaded capes
pub const CAPE_ROUTE: &str = "/api/cabinet/cape";

/// Skin and cape references of a profile. Each is either a path on this
/// server or an absolute URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureRefs {
	/// Reference to the current skin
	pub skin: Option<String>,
	/// Reference to the current cape
	pub cape: Option<String>,
}

impl TextureRefs {
	/// Build references from stored file names. The cape is only used when it is active.
	pub fn from_files(skin_file: Option<&str>, cape_file: Option<(&str, bool)>) -> Self {
		Self {
			skin: skin_file.map(|file| format!("{SKIN_ROUTE}/{file}")),
			cape: cape_file
				.filter(|(_, active)| *active)
				.map(|(file, _)| format!("{CAPE_ROUTE}/{file}")),
		}
	}

	/// Checks if there are no textures at all
	pub fn is_empty(&self) -> bool {
		self.skin.is_none() && self.cape.is_none()
	}
}

/// Turn a texture reference into a public URL, using the origin for server paths
fn resolve_url(reference: &str, origin: &str) -> String {
	if reference.starts_with("http://") || reference.starts_with("https://") {
		reference.to_string()
	} else {
		format!("{origin}{reference}")
	}
}

/// The decoded value of the `textures` property
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TexturesPayload {
	/// When the payload was created, in milliseconds since the Unix epoch
	pub timestamp: u64,
	/// UUID of the profile
	pub profile_id: String,
	/// Name of the profile
	pub profile_name: String,
	/// Always true
	pub is_public: bool,
	/// Texture entries keyed by SKIN and CAPE
	pub textures: BTreeMap<&'static str, TextureEntry>,
}

/// A single texture entry
#[derive(Serialize, Debug)]
pub struct TextureEntry {
	/// Public URL of the texture
	pub url: String,
}

impl TexturesPayload {
	/// Create the payload for an identity. Returns None if it has no textures.
	pub fn new(identity: &Identity, origin: &str, timestamp: u64) -> Option<Self> {
		if identity.textures.is_empty() {
			return None;
		}

		let mut textures = BTreeMap::new();
		if let Some(skin) = &identity.textures.skin {
			textures.insert(
				"SKIN",
				TextureEntry {
					url: resolve_url(skin, origin),
				},
			);
		}
		if let Some(cape) = &identity.textures.cape {
			textures.insert(
				"CAPE",
				TextureEntry {
					url: resolve_url(cape, origin),
				},
			);
		}

		Some(Self {
			timestamp,
			profile_id: identity.uuid.clone(),
			profile_name: identity.name.clone(),
			is_public: true,
			textures,
		})
	}

	/// Serialize to JSON and encode as base64, the form used in profile properties
	pub fn encode(&self) -> anyhow::Result<String> {
		let json = serde_json::to_vec(self).context("Failed to serialize textures payload")?;
		Ok(BASE64_STANDARD.encode(json))
	}
}
