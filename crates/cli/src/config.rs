// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! User configuration.
//!
//! Configuration is stored in `config.toml`, found via `--config`, then
//! `PROCTOR_CONFIG`, then the platform config directory. A missing file means
//! defaults. `PROCTOR_DATA_DIR` and `PROCTOR_SERVER` override the file.
//!
//! ```toml
//! data_dir = "/home/me/.local/share/proctor"
//!
//! [server]
//! base_url = "http://localhost:8000/api"
//! timeout_secs = 30
//!
//! [retry]
//! retries = 2
//! base_delay_ms = 1000
//!
//! [cache]
//! ttl_secs = 86400
//! max_size = 50
//!
//! [session]
//! autosave_secs = 30
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use proctor_core::{CacheConfig, EngineConfig, RetryPolicy, TransportConfig};

use crate::env;
use crate::error::{Error, Result};

const APP_DIR_NAME: &str = "proctor";
const CONFIG_FILE_NAME: &str = "config.toml";
const STORE_DIR_NAME: &str = "store";
const LOG_FILE_NAME: &str = "proctor.log";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where saved progress, cached responses and the log live.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub server: ServerConfig,
    pub retry: RetryConfig,
    pub cache: CacheSettings,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Bearer token sent with every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let transport = TransportConfig::default();
        ServerConfig {
            base_url: transport.base_url,
            timeout_secs: transport.timeout.as_secs(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        RetryConfig {
            retries: policy.retries,
            base_delay_ms: policy.base_delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub max_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let cache = CacheConfig::default();
        CacheSettings {
            ttl_secs: cache.ttl.as_secs(),
            max_size: cache.max_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub autosave_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            autosave_secs: EngineConfig::default().autosave_interval.as_secs(),
        }
    }
}

impl Config {
    /// Loads the config file at `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::ConfigParse {
            path: path.display().to_string(),
            message: e.message().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = &self.server.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "server.base_url must start with http:// or https://, got '{}'",
                url
            )));
        }
        if self.server.timeout_secs == 0 {
            return Err(Error::Config(
                "server.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.cache.max_size == 0 {
            return Err(Error::Config(
                "cache.max_size must be at least 1".to_string(),
            ));
        }
        if self.session.autosave_secs == 0 {
            return Err(Error::Config(
                "session.autosave_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies environment overrides.
    pub fn with_overrides(mut self, data_dir: Option<PathBuf>, server: Option<String>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = Some(dir);
        }
        if let Some(url) = server {
            self.server.base_url = url;
        }
        self
    }

    /// Loads the config file and applies `PROCTOR_DATA_DIR` / `PROCTOR_SERVER`.
    pub fn load_effective(path: &Path) -> Result<Self> {
        let config = Self::load(path)?.with_overrides(env::data_dir(), env::server());
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir().join(STORE_DIR_NAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join(LOG_FILE_NAME)
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.server.base_url.clone(),
            timeout: Duration::from_secs(self.server.timeout_secs),
            token: self.server.token.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.retries,
            Duration::from_millis(self.retry.base_delay_ms),
        )
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache.ttl_secs),
            max_size: self.cache.max_size,
            ..CacheConfig::default()
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            autosave_interval: Duration::from_secs(self.session.autosave_secs),
            ..EngineConfig::default()
        }
    }
}

/// Locates the config file: `explicit`, then `PROCTOR_CONFIG`, then the
/// platform config directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = env::config_path() {
        return path;
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR_NAME)))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
