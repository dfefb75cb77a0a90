// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Configuration is stored in `config.toml` under the user config directory
//! (`~/.config/evsync/` on Linux). Every field has a default, so a missing
//! or empty file is valid.
//!
//! ```toml
//! [remote]
//! base_url = "https://events.example.com/api"
//!
//! [realtime]
//! url = "wss://events.example.com/ws/events/"
//! mode = "auto"
//!
//! [auth]
//! user_id = "17"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::realtime::{Backoff, ChannelConfig, ChannelMode, ReconnectPolicy};

const APP_DIR_NAME: &str = "evsync";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "EVSYNC_CONFIG";
/// Overrides the state directory.
pub const STATE_DIR_ENV: &str = "EVSYNC_STATE_DIR";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteSettings,
    pub connectivity: ConnectivitySettings,
    pub realtime: RealtimeSettings,
    pub storage: StorageSettings,
    pub auth: AuthSettings,
}

/// The event service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivitySettings {
    /// Seconds between liveness probes (default: 30).
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        ConnectivitySettings {
            probe_interval_secs: default_probe_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

fn default_probe_interval_secs() -> u64 {
    30
}

fn default_probe_timeout_secs() -> u64 {
    5
}

/// The real-time channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeSettings {
    /// Socket URL (`ws://` or `wss://`). Without one the channel polls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub mode: ChannelMode,
    /// Reconnect attempts before giving up (default: 5). 0 = unlimited.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default)]
    pub backoff: Backoff,
    /// Cap for exponential backoff, in seconds.
    #[serde(default = "default_max_reconnect_delay_secs")]
    pub max_reconnect_delay_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        RealtimeSettings {
            url: None,
            mode: ChannelMode::default(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            backoff: Backoff::default(),
            max_reconnect_delay_secs: default_max_reconnect_delay_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_max_reconnect_delay_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Where the cache and operation log live. Defaults to [`state_dir`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Config {
    /// Loads configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Rejects URLs with the wrong scheme and zero intervals.
    pub fn validate(&self) -> Result<()> {
        let base = &self.remote.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "invalid remote.base_url '{}': must start with http:// or https://",
                base
            )));
        }
        if let Some(url) = &self.realtime.url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(Error::Config(format!(
                    "invalid realtime.url '{}': must start with ws:// or wss://",
                    url
                )));
            }
        }
        if self.realtime.mode == ChannelMode::Socket && self.realtime.url.is_none() {
            return Err(Error::Config(
                "realtime.mode = \"socket\" needs realtime.url".to_string(),
            ));
        }
        let intervals = [
            ("remote.timeout_secs", self.remote.timeout_secs),
            ("connectivity.probe_interval_secs", self.connectivity.probe_interval_secs),
            ("connectivity.probe_timeout_secs", self.connectivity.probe_timeout_secs),
            ("realtime.reconnect_delay_ms", self.realtime.reconnect_delay_ms),
            ("realtime.poll_interval_secs", self.realtime.poll_interval_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.connectivity.probe_timeout_secs)
    }

    pub fn channel_config(&self) -> ChannelConfig {
        let rt = &self.realtime;
        ChannelConfig {
            url: rt.url.clone(),
            mode: rt.mode,
            policy: ReconnectPolicy {
                max_attempts: rt.max_reconnect_attempts,
                delay: Duration::from_millis(rt.reconnect_delay_ms),
                backoff: rt.backoff,
                max_delay: Duration::from_secs(rt.max_reconnect_delay_secs),
            },
            poll_interval: Duration::from_secs(rt.poll_interval_secs),
        }
    }

    /// The configured storage directory, or [`state_dir`].
    pub fn storage_dir(&self) -> PathBuf {
        self.storage.dir.clone().unwrap_or_else(state_dir)
    }
}

/// `$EVSYNC_CONFIG`, else `<config dir>/evsync/config.toml`.
pub fn default_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// `$EVSYNC_STATE_DIR`, else `<data dir>/evsync`.
pub fn state_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(STATE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
