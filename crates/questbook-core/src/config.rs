//! Client configuration management.
//!
//! Configuration is stored at `~/.config/questbook/config.json` and covers
//! the API base URL, the transport timeout, and the profile cache's
//! freshness and retry tuning. A `.env` file and the `QUESTBOOK_API_URL`
//! variable override the base URL for development builds.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "questbook";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Production API base URL
const DEFAULT_API_BASE_URL: &str = "https://api.questbook.app";

/// HTTP request timeout in seconds.
/// 30s tolerates slow mobile links while failing fast enough for good UX.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum profile fetch retries after the initial attempt.
/// The count is tunable; auth failures are never retried regardless.
const DEFAULT_PROFILE_RETRY_LIMIT: u32 = 3;

/// Initial backoff delay in milliseconds between profile fetch retries.
/// Doubles on each retry.
const DEFAULT_PROFILE_RETRY_BACKOFF_MS: u64 = 500;

/// Consider the cached profile stale after 1 hour.
/// The profile changes rarely; session validity is enforced by the server
/// via 401, not by this window.
const DEFAULT_PROFILE_STALE_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub profile_retry_limit: u32,
    pub profile_retry_backoff_ms: u64,
    pub profile_stale_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            profile_retry_limit: DEFAULT_PROFILE_RETRY_LIMIT,
            profile_retry_backoff_ms: DEFAULT_PROFILE_RETRY_BACKOFF_MS,
            profile_stale_minutes: DEFAULT_PROFILE_STALE_MINUTES,
        }
    }
}

impl Config {
    /// Load the configuration, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        // .env overrides are for development builds
        let _ = dotenvy::dotenv();

        let mut config = Self::load_from(&Self::config_path()?)?;
        if let Ok(url) = std::env::var("QUESTBOOK_API_URL") {
            config.api_base_url = url;
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
