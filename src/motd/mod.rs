//! Message-of-the-day pools
//!
//! A pool is a directory of text files; one is chosen at random each time a
//! client reaches the matching point of the login.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};

/// Which MOTD pool to draw from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotdStage {
    /// Shown on connect, before the name prompt
    PreLogin,
    /// Shown once login completes
    PostLogin,
}

/// Source of message-of-the-day text
pub trait MotdProvider: Send + Sync {
    fn pick(&self, stage: MotdStage) -> Option<String>;
}

/// Pools read from `motd1/` and `motd2/` under a base directory.
///
/// Files are counted once at startup; their contents are read on each pick.
#[derive(Debug, Clone, Default)]
pub struct DirMotdProvider {
    pre_login: Vec<PathBuf>,
    post_login: Vec<PathBuf>,
}

impl DirMotdProvider {
    /// Scan `base/motd1` and `base/motd2`
    pub fn load(base: &Path) -> Result<Self> {
        Ok(Self {
            pre_login: list_pool(&base.join("motd1"))?,
            post_login: list_pool(&base.join("motd2"))?,
        })
    }

    /// Number of files in each pool, `(pre_login, post_login)`
    pub fn counts(&self) -> (usize, usize) {
        (self.pre_login.len(), self.post_login.len())
    }

    fn pool(&self, stage: MotdStage) -> &[PathBuf] {
        match stage {
            MotdStage::PreLogin => &self.pre_login,
            MotdStage::PostLogin => &self.post_login,
        }
    }
}

impl MotdProvider for DirMotdProvider {
    fn pick(&self, stage: MotdStage) -> Option<String> {
        let path = self.pool(stage).choose(&mut rand::thread_rng())?;
        match std::fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("problem reading motd {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn list_pool(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        tracing::warn!("motd directory {} not found", dir.display());
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("reading motd dir {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Fixed pools, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticMotd {
    pub pre_login: Option<String>,
    pub post_login: Option<String>,
}

impl MotdProvider for StaticMotd {
    fn pick(&self, stage: MotdStage) -> Option<String> {
        match stage {
            MotdStage::PreLogin => self.pre_login.clone(),
            MotdStage::PostLogin => self.post_login.clone(),
        }
    }
}
