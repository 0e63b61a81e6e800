//! Application configuration management.
//!
//! The configuration carries the directory host, the OAuth application key
//! and secret, and the result ceiling applied to every listing call. It is
//! read from a JSON file (by default `~/.config/groupsync/config.json`) and
//! individual values can be overridden from the environment.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for the config directory path
const APP_NAME: &str = "groupsync";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Listing calls return at most this many records unless configured.
const DEFAULT_RESULT_LIMIT: u32 = 100;

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_HOST: &str = "GROUPSYNC_HOST";
const ENV_KEY: &str = "GROUPSYNC_KEY";
const ENV_SECRET: &str = "GROUPSYNC_SECRET";
const ENV_RESULT_LIMIT: &str = "GROUPSYNC_RESULT_LIMIT";
const ENV_LOG_LEVEL: &str = "GROUPSYNC_LOG_LEVEL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub key: String,
    pub secret: String,
    #[serde(default = "default_result_limit")]
    pub result_limit: u32,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_result_limit() -> u32 {
    DEFAULT_RESULT_LIMIT
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            key: String::new(),
            secret: String::new(),
            result_limit: DEFAULT_RESULT_LIMIT,
            log_level: None,
            log_file: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load the config from `path`, or from the default location when no
    /// path is given. A missing default file yields an empty config so that
    /// everything can come from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    Self::read(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        if let Some(key) = lookup(ENV_KEY) {
            self.key = key;
        }
        if let Some(secret) = lookup(ENV_SECRET) {
            self.secret = secret;
        }
        if let Some(limit) = lookup(ENV_RESULT_LIMIT) {
            self.result_limit = limit
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer", ENV_RESULT_LIMIT))?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = Some(level);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("Config is missing the directory host");
        }
        if self.key.trim().is_empty() || self.secret.trim().is_empty() {
            bail!("Config is missing the application key or secret");
        }
        if self.result_limit == 0 {
            bail!("result_limit must be greater than zero");
        }
        Ok(())
    }

    /// Host as a base URL. Bare host names are served over https.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }
}
