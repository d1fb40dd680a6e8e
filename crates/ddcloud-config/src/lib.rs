//! Provider settings
//!
//! Settings are resolved in three layers, later layers winning:
//!
//! 1. built-in defaults,
//! 2. an optional YAML settings file,
//! 3. `DDCLOUD_*` environment variables.
//!
//! The retry core never reads any of this itself; [`ProviderSettings::retry_config`]
//! hands it plain values.

pub mod error;

pub use error::*;

use ddcloud_core::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "DDCLOUD_CONFIG_PATH";
pub const ENV_REGION: &str = "DDCLOUD_REGION";
pub const ENV_ALLOW_SERVER_REBOOT: &str = "DDCLOUD_ALLOW_SERVER_REBOOT";
pub const ENV_MAX_RETRY: &str = "DDCLOUD_MAX_RETRY";
pub const ENV_RETRY_DELAY: &str = "DDCLOUD_RETRY_DELAY";
pub const ENV_RETRY_MAX_DELAY: &str = "DDCLOUD_RETRY_MAX_DELAY";
pub const ENV_RETRY_BACKOFF: &str = "DDCLOUD_RETRY_BACKOFF";

const SETTINGS_DIR: &str = "ddcloud";
const SETTINGS_FILE: &str = "provider.yaml";

/// Settings shared by every resource handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// CloudControl region (e.g. "AU", "NA", "EU")
    pub region: String,

    /// Whether handlers may start or gracefully shut down servers
    #[serde(rename = "allow_server_reboot")]
    pub allow_server_reboots: bool,

    pub retry: RetrySettings,
}

/// Retry knobs as operators write them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,

    pub delay_secs: u64,

    /// Defaults to `delay_secs` (constant delay)
    pub max_delay_secs: Option<u64>,

    pub backoff_multiplier: f64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            region: "AU".to_string(),
            allow_server_reboots: false,
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_secs: 5,
            max_delay_secs: None,
            backoff_multiplier: 1.0,
        }
    }
}

impl ProviderSettings {
    /// Defaults, then the settings file (if any), then the environment
    pub fn load() -> Result<Self> {
        let mut settings = match find_settings_file()? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.apply_env()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_yaml_str(&content)?;
        tracing::debug!("Loaded provider settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Override fields from `DDCLOUD_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(region) = env_value(ENV_REGION) {
            self.region = region;
        }
        if let Some(value) = env_value(ENV_ALLOW_SERVER_REBOOT) {
            self.allow_server_reboots = parse_bool(ENV_ALLOW_SERVER_REBOOT, &value)?;
        }
        if let Some(value) = env_value(ENV_MAX_RETRY) {
            self.retry.max_attempts = parse_number(ENV_MAX_RETRY, &value)?;
        }
        if let Some(value) = env_value(ENV_RETRY_DELAY) {
            self.retry.delay_secs = parse_number(ENV_RETRY_DELAY, &value)?;
        }
        if let Some(value) = env_value(ENV_RETRY_MAX_DELAY) {
            self.retry.max_delay_secs = Some(parse_number(ENV_RETRY_MAX_DELAY, &value)?);
        }
        if let Some(value) = env_value(ENV_RETRY_BACKOFF) {
            self.retry.backoff_multiplier = parse_number(ENV_RETRY_BACKOFF, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid("region must not be empty".to_string()));
        }
        self.retry_config().validate()?;
        Ok(())
    }

    /// Retry configuration for the executor
    pub fn retry_config(&self) -> RetryConfig {
        let delay = Duration::from_secs(self.retry.delay_secs);
        let max_delay = self
            .retry
            .max_delay_secs
            .map(Duration::from_secs)
            .unwrap_or(delay);

        RetryConfig::exponential(
            self.retry.max_attempts,
            delay,
            max_delay,
            self.retry.backoff_multiplier,
        )
    }
}

/// Locate the YAML settings file
///
/// 1. `DDCLOUD_CONFIG_PATH` (must exist when set)
/// 2. `<config dir>/ddcloud/provider.yaml`
pub fn find_settings_file() -> Result<Option<PathBuf>> {
    if let Some(config_path) = env_value(ENV_CONFIG_PATH) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::SettingsFileNotFound(path.display().to_string()));
    }

    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join(SETTINGS_DIR).join(SETTINGS_FILE);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

fn env_value(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvVar {
            var,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_number<T>(var: &'static str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
