//! Application configuration management.
//!
//! This module handles loading and saving the guard configuration:
//! the backend base URL, the whoami endpoint used for credential
//! validation, the login entry point, and the request timeout.
//!
//! Configuration is stored at `~/.config/authgate/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/storage directory paths
const APP_NAME: &str = "authgate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default HTTP request timeout in seconds.
/// 10s fails fast enough that a denied gate does not hang the UI.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default path of the credential validation endpoint.
const DEFAULT_WHOAMI_PATH: &str = "/auth/me";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the backend REST service.
    pub api_base_url: String,
    /// Path of the "is this credential still good" endpoint.
    pub whoami_path: String,
    /// Login entry point the navigator redirects to on denial.
    pub login_url: String,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            whoami_path: DEFAULT_WHOAMI_PATH.to_string(),
            login_url: "/login".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Full URL of the validation endpoint.
    pub fn whoami_url(&self) -> String {
        format!(
            "{}{}",
            self.api_base_url.trim_end_matches('/'),
            self.whoami_path
        )
    }

    /// Directory for the file-backed credential storage.
    pub fn storage_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
