//! Configuration file
//!
//! Loaded from `<config_dir>/config.toml`. Every field is optional; a missing
//! file yields the defaults of a freshly installed backend.
//!
//! ```toml
//! default_provider = "sensu_api"
//!
//! [api]
//! host = "sensu-backend.example.com"
//! port = 8080
//! ssl = false
//! username = "admin"
//! password = "P@ssw0rd!"
//! timeout_secs = 30
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 1000
//!
//! [sensuctl]
//! path = "~/bin/sensuctl"
//!
//! [bonsai]
//! url = "https://bonsai.sensu.io"
//! ```

use crate::paths;
use crate::registry::ProviderKind;
use anyhow::{Context, Result};
use sensukit::bonsai::BONSAI_URL;
use sensukit::{ClientConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetrySettings,
    pub sensuctl: SensuctlConfig,
    pub bonsai: BonsaiConfig,
    /// Provider used when a resource does not name one
    pub default_provider: ProviderKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            retry: RetrySettings::default(),
            sensuctl: SensuctlConfig::default(),
            bonsai: BonsaiConfig::default(),
            default_provider: ProviderKind::Sensuctl,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let defaults = ClientConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            ssl: defaults.ssl,
            username: defaults.username,
            password: defaults.password,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

/// Backoff for idempotent reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensuctlConfig {
    /// Path to the binary, or a name looked up on PATH
    pub path: String,
}

impl Default for SensuctlConfig {
    fn default() -> Self {
        Self {
            path: "sensuctl".to_string(),
        }
    }
}

/// Asset index used by `sensu_bonsai_asset`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BonsaiConfig {
    pub url: String,
}

impl Default for BonsaiConfig {
    fn default() -> Self {
        Self {
            url: BONSAI_URL.to_string(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file at the default location yields the defaults; an
    /// explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (paths::config_file()?, false),
        };

        if !path.exists() && !explicit {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML")
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.api.host.clone(),
            port: self.api.port,
            ssl: self.api.ssl,
            username: self.api.username.clone(),
            password: self.api.password.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            ..RetryConfig::default()
        }
    }

    /// Expanded sensuctl path
    pub fn sensuctl_program(&self) -> PathBuf {
        paths::expand(&self.sensuctl.path)
    }
}
