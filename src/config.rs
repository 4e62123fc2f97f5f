/*!
 * Configuration types for Frond
 */

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::retry::RetryPolicy;
use crate::error::{Error, Result};

/// Top-level configuration, loadable from a TOML file.
///
/// Every field has a default, so an empty file (or no file at all) yields a
/// working configuration pointed at the device's access-point address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the device HTTP server
    #[serde(default = "default_device_url")]
    pub device_url: String,

    /// Telemetry polling cadence
    #[serde(default)]
    pub poll: PollConfig,

    /// Retry/backoff discipline for idempotent requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Firmware-update orchestration tunables
    #[serde(default)]
    pub update: UpdateConfig,

    /// HTTP client tunables
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_url: default_device_url(),
            poll: PollConfig::default(),
            retry: RetryConfig::default(),
            update: UpdateConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.device_url.trim().is_empty() {
            return Err(Error::Config("device_url must not be empty".to_string()));
        }
        reqwest::Url::parse(&self.device_url)
            .map_err(|e| Error::Config(format!("device_url is not a valid URL: {}", e)))?;
        if self.poll.interval_secs == 0 {
            return Err(Error::Config(
                "poll.interval_secs must be at least 1".to_string(),
            ));
        }
        if self.update.health_poll_attempts == 0 {
            return Err(Error::Config(
                "update.health_poll_attempts must be at least 1".to_string(),
            ));
        }
        if self.update.health_poll_interval_ms == 0 {
            return Err(Error::Config(
                "update.health_poll_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.retry.initial_backoff_ms == 0 {
            return Err(Error::Config(
                "retry.initial_backoff_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Telemetry polling cadence.
///
/// The device is a single-core microcontroller; initial fetches are spread
/// `stagger_step_ms` apart so a fresh session does not hit it with one
/// request per sensor simultaneously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between successive fetches of one source
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Milliseconds between the initial fetches of adjacent sources
    #[serde(default = "default_stagger_step_ms")]
    pub stagger_step_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            stagger_step_ms: default_stagger_step_ms(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn stagger_step(&self) -> Duration {
        Duration::from_millis(self.stagger_step_ms)
    }
}

/// Retry/backoff discipline for idempotent device requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt fails
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff in milliseconds; doubles on each further retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }
}

/// Firmware-update orchestration tunables.
///
/// The health ceiling bounds how long a rebooting device is waited for
/// before the session is declared timed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Health probes issued after an install before giving up
    #[serde(default = "default_health_poll_attempts")]
    pub health_poll_attempts: u32,

    /// Milliseconds between health probes
    #[serde(default = "default_health_poll_interval_ms")]
    pub health_poll_interval_ms: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            health_poll_attempts: default_health_poll_attempts(),
            health_poll_interval_ms: default_health_poll_interval_ms(),
        }
    }
}

impl UpdateConfig {
    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }
}

/// HTTP client tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds; 0 disables the timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_timeout_secs))
        }
    }
}

fn default_device_url() -> String {
    // The address the device serves from in access-point mode
    "http://192.168.4.1".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_stagger_step_ms() -> u64 {
    500
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    3000
}

fn default_health_poll_attempts() -> u32 {
    30
}

fn default_health_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    10
}
