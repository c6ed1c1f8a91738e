use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Locally cached identity, kept only to skip re-registration on return
/// visits. Never authoritative: the admin flag is re-read from the store at
/// every session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProfile {
    pub user_id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

/// JSON-file profile cache.
pub struct ProfileCache {
    path: PathBuf,
}

impl ProfileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `None` when missing; a corrupt cache is treated as absent, not as an
    /// error.
    pub fn load(&self) -> Option<StoredProfile> {
        let raw = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Ignoring corrupt profile cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, profile: &StoredProfile) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(profile).map_err(io::Error::other)?;
        fs::write(&self.path, json)
    }

    /// Logout: forget the cached identity.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProfileCache::new(dir.path().join("profile.json"));

        assert!(cache.load().is_none());

        let profile = StoredProfile {
            user_id: Uuid::new_v4(),
            username: "carol".to_string(),
            is_admin: false,
        };
        cache.save(&profile).unwrap();
        assert_eq!(cache.load(), Some(profile));

        cache.clear().unwrap();
        assert!(cache.load().is_none());
        // clearing twice is fine
        cache.clear().unwrap();
    }

    #[test]
    fn corrupt_cache_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        fs::write(&path, "{not json").unwrap();

        let cache = ProfileCache::new(path);
        assert!(cache.load().is_none());
    }
}
