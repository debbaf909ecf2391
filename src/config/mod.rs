//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "datafiles/config.json";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port for raw line-mode (telnet) clients
    pub main_port: u16,

    /// Port for WebSocket clients
    pub web_port: u16,

    /// Address both listeners bind to
    pub bind_address: String,

    /// Request path WebSocket upgrades must use
    pub web_path: String,

    /// Users online plus logins in progress before new connections are refused
    pub max_users: usize,

    /// Minutes a connection may sit at the name prompt
    pub login_idle_time: u64,

    /// Minutes a logged-in user may stay idle; 0 disables the check
    pub user_idle_time: u64,

    /// Refuse every new connection
    pub stop_logins: bool,

    pub paths: PathsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            main_port: 4000,
            web_port: 4001,
            bind_address: "0.0.0.0".to_string(),
            web_path: "/com".to_string(),
            max_users: 50,
            login_idle_time: 3,
            user_idle_time: 0,
            stop_logins: false,
            paths: PathsConfig::default(),
        }
    }
}

/// Data file locations. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// JSON color code table
    pub color_codes: PathBuf,

    /// Directory holding `motd1/` and `motd2/`
    pub motds: PathBuf,

    /// Directory of user profiles
    pub users: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            color_codes: PathBuf::from("datafiles/colorCodes.json"),
            motds: PathBuf::from("motds"),
            users: PathBuf::from("userfiles"),
        }
    }
}

impl Config {
    /// Load config from a JSON or TOML file (chosen by extension).
    ///
    /// A missing or unparsable file is an error: the server cannot start
    /// without knowing its ports.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot open config file {}", path.display()))?;

        let config: Config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("unable to read config file {}", path.display()))?,
            _ => serde_json::from_str(&content)
                .with_context(|| format!("unable to read config file {}", path.display()))?,
        };
        Ok(config)
    }

    /// Address for the raw listener
    pub fn main_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.main_port)
    }

    /// Address for the WebSocket listener
    pub fn web_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.web_port)
    }

    /// How long a connection may sit at the name prompt. Zero disables it.
    pub fn login_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.login_idle_time * 60)
    }

    /// `None` when the logged-in idle check is disabled
    pub fn user_idle_timeout(&self) -> Option<Duration> {
        (self.user_idle_time > 0).then(|| Duration::from_secs(self.user_idle_time * 60))
    }
}
