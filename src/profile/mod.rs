/// File-backed identity store
pub mod store;
/// Texture URLs and the textures property payload
pub mod textures;

use async_trait::async_trait;

pub use store::JsonProfileStore;
pub use textures::TextureRefs;

/// A game profile as seen by the session protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
	/// The profile UUID, in the form it is stored
	pub uuid: String,
	/// The display name
	pub name: String,
	/// Resolved skin and cape references
	pub textures: TextureRefs,
}

/// Read-only lookup of profiles from wherever accounts are persisted
#[async_trait]
pub trait ProfileStore: Send + Sync {
	/// Find a profile by its username
	async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<Identity>>;

	/// Find a profile by its UUID
	async fn find_by_uuid(&self, uuid: &str) -> anyhow::Result<Option<Identity>>;
}

/// Normalize a UUID for comparison by removing dashes and lowercasing it
pub fn normalize_uuid(uuid: &str) -> String {
	uuid.chars()
		.filter(|c| *c != '-')
		.map(|c| c.to_ascii_lowercase())
		.collect()
}

/// Checks whether two UUID strings name the same profile
pub fn same_profile(left: &str, right: &str) -> bool {
	normalize_uuid(left) == normalize_uuid(right)
}
