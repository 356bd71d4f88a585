use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{ensure, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::textures::TextureRefs;
use super::{normalize_uuid, Identity, ProfileStore};

/// A profile store that reads all accounts from a JSON file at startup
#[derive(Debug, Default)]
pub struct JsonProfileStore {
	/// Users by normalized UUID
	by_uuid: HashMap<String, StoredUser>,
	/// Normalized UUIDs by lowercased username
	by_username: HashMap<String, String>,
}

impl JsonProfileStore {
	/// Open the store file. A missing file is treated as an empty store.
	pub fn open(path: &Path) -> anyhow::Result<Self> {
		if !path.exists() {
			tracing::warn!(
				path = %path.display(),
				"Profile store file does not exist, no profiles will resolve"
			);
			return Ok(Self::default());
		}

		let file = File::open(path).context("Failed to open profile store file")?;
		let contents: StoreContents = serde_json::from_reader(BufReader::new(file))
			.context("Failed to deserialize profile store contents")?;
		let out = Self::from_users(contents.users)?;
		tracing::info!(path = %path.display(), count = out.by_uuid.len(), "Loaded profile store");

		Ok(out)
	}

	/// Create the store from a list of users
	pub fn from_users(users: Vec<StoredUser>) -> anyhow::Result<Self> {
		let mut out = Self::default();
		for user in users {
			let uuid = normalize_uuid(&user.uuid);
			ensure!(!uuid.is_empty(), "User '{}' has an empty UUID", user.username);
			let username = user.username.to_lowercase();
			ensure!(
				!out.by_username.contains_key(&username),
				"Username '{}' is used by more than one profile",
				user.username
			);
			ensure!(
				!out.by_uuid.contains_key(&uuid),
				"UUID '{}' is used by more than one profile",
				user.uuid
			);

			out.by_username.insert(username, uuid.clone());
			out.by_uuid.insert(uuid, user);
		}

		Ok(out)
	}
}

#[async_trait]
impl ProfileStore for JsonProfileStore {
	async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<Identity>> {
		let identity = self
			.by_username
			.get(&username.to_lowercase())
			.and_then(|uuid| self.by_uuid.get(uuid))
			.map(StoredUser::to_identity);
		Ok(identity)
	}

	async fn find_by_uuid(&self, uuid: &str) -> anyhow::Result<Option<Identity>> {
		Ok(self
			.by_uuid
			.get(&normalize_uuid(uuid))
			.map(StoredUser::to_identity))
	}
}

/// Structure of the store file
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
struct StoreContents {
	users: Vec<StoredUser>,
}

/// A user in the store file
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoredUser {
	/// The UUID of the user's game profile
	pub uuid: String,
	/// The username of the user
	pub username: String,
	/// File name of the current skin
	#[serde(default)]
	pub skin: Option<String>,
	/// The current cape
	#[serde(default)]
	pub cape: Option<StoredCape>,
}

/// A cape in the store file
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoredCape {
	/// File name of the cape
	pub file: String,
	/// Whether the user has the cape enabled
	#[serde(default)]
	pub active: bool,
}

impl StoredUser {
	fn to_identity(&self) -> Identity {
		Identity {
			uuid: self.uuid.clone(),
			name: self.username.clone(),
			textures: TextureRefs::from_files(
				self.skin.as_deref(),
				self.cape.as_ref().map(|cape| (cape.file.as_str(), cape.active)),
			),
		}
	}
}
