//! Profile persistence
//!
//! The talker core only needs [`ProfileStore`]; [`JsonProfileStore`] keeps
//! one JSON file per user in a directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Persisted fields of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,

    #[serde(default)]
    pub recap: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no profile for '{0}'")]
    NotFound(String),

    #[error("invalid user name '{0}'")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed profile: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where user profiles live
pub trait ProfileStore: Send + Sync {
    fn exists(&self, name: &str) -> bool;

    fn load(&self, name: &str) -> Result<Profile, StoreError>;

    fn save(&self, profile: &Profile) -> Result<(), StoreError>;
}

/// One `<name>.json` file per user
#[derive(Debug, Clone)]
pub struct JsonProfileStore {
    dir: PathBuf,
}

impl JsonProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
            && !name.starts_with('-');
        if !valid {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", name.to_lowercase())))
    }
}

impl ProfileStore for JsonProfileStore {
    fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn load(&self, name: &str) -> Result<Profile, StoreError> {
        let path = self.path_for(name)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, profile: &Profile) -> Result<(), StoreError> {
        let path = self.path_for(&profile.name)?;
        std::fs::create_dir_all(&self.dir)?;

        // Write then rename so a crash never leaves half a profile
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(profile)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
