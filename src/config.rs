//! Configuration loading and persistence.
//!
//! Settings live in `config.json` under the platform config directory
//! (`CHATWIRE_CONFIG_DIR` overrides it). Environment variables override
//! whatever the file says.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{fs, time::Duration};

use crate::constants::{
    DEFAULT_CHAT_PATH, DEFAULT_ENDPOINT, DEFAULT_RECONNECT_DELAY, ENV_CONFIG_DIR, ENV_ENDPOINT,
    ENV_MAX_RECONNECTS, ENV_RECONNECT_DELAY_MS,
};
use crate::reconnect::FixedDelay;
use crate::ws::http_to_ws_scheme;

/// Configuration for the chatwire client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Streaming session endpoint (`ws://`, `wss://`, `http://` or `https://`).
    pub endpoint: String,
    /// Delay in milliseconds before reconnecting after a disconnect.
    pub reconnect_delay_ms: u64,
    /// Stop reconnecting after this many consecutive failures. `None` retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY.as_millis() as u64,
            max_reconnect_attempts: None,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("chatwire")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Path of the config file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing file yields defaults. A file that exists but does not parse
    /// is an error.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path without applying environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }

        if let Ok(delay) = std::env::var(ENV_RECONNECT_DELAY_MS) {
            if let Ok(ms) = delay.parse::<u64>() {
                self.reconnect_delay_ms = ms;
            } else {
                log::warn!("Ignoring unparseable {}={}", ENV_RECONNECT_DELAY_MS, delay);
            }
        }

        if let Ok(max) = std::env::var(ENV_MAX_RECONNECTS) {
            if let Ok(max) = max.parse::<u32>() {
                self.max_reconnect_attempts = Some(max);
            } else {
                log::warn!("Ignoring unparseable {}={}", ENV_MAX_RECONNECTS, max);
            }
        }
    }

    /// Persists the current configuration to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Persists the current configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Endpoint normalized to a WebSocket URL.
    ///
    /// `http(s)://` becomes `ws(s)://`, and a bare host gets `/ws/chat`
    /// (inserted ahead of any query or fragment).
    pub fn ws_endpoint(&self) -> String {
        let url = http_to_ws_scheme(self.endpoint.trim());
        let authority_start = url.find("://").map_or(0, |i| i + 3);
        let authority_end = url[authority_start..]
            .find(['/', '?', '#'])
            .map_or(url.len(), |i| authority_start + i);
        let (head, tail) = url.split_at(authority_end);
        let (path, suffix) = tail
            .find(['?', '#'])
            .map_or((tail, ""), |i| tail.split_at(i));

        if path.trim_end_matches('/').is_empty() {
            format!("{head}{DEFAULT_CHAT_PATH}{suffix}")
        } else {
            url
        }
    }

    /// Reconnect policy described by this config.
    pub fn reconnect_policy(&self) -> FixedDelay {
        let policy = FixedDelay::new(Duration::from_millis(self.reconnect_delay_ms));
        match self.max_reconnect_attempts {
            Some(max) => policy.with_max_attempts(max),
            None => policy,
        }
    }

    /// Read one setting by its config-file key.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "endpoint" => Some(self.endpoint.clone()),
            "reconnect_delay_ms" => Some(self.reconnect_delay_ms.to_string()),
            "max_reconnect_attempts" => Some(
                self.max_reconnect_attempts
                    .map_or_else(|| "unbounded".to_string(), |max| max.to_string()),
            ),
            _ => None,
        }
    }

    /// Set one setting by its config-file key.
    ///
    /// `max_reconnect_attempts` accepts `unbounded` (or `none`) to clear the limit.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "endpoint" => self.endpoint = value.to_string(),
            "reconnect_delay_ms" => {
                self.reconnect_delay_ms = value
                    .parse()
                    .with_context(|| format!("reconnect_delay_ms must be a number, got {value:?}"))?;
            }
            "max_reconnect_attempts" => {
                self.max_reconnect_attempts = match value {
                    "unbounded" | "none" => None,
                    n => Some(n.parse().with_context(|| {
                        format!("max_reconnect_attempts must be a number or 'unbounded', got {n:?}")
                    })?),
                };
            }
            _ => anyhow::bail!("Unknown config key: {key}"),
        }
        Ok(())
    }
}
