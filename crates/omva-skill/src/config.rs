//! Skill configuration loading from file and environment variables.

use omva_dialog::HealthConfig;
use omva_types::EnrollmentSettings;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Top-level skill configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Message bus connection.
    #[serde(default)]
    pub bus: BusConfig,

    /// Enrollment dialogue behaviour.
    #[serde(default)]
    pub enrollment: EnrollmentSettings,

    /// Plugin health checks.
    #[serde(default)]
    pub health: HealthSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the host's message bus listens.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// WebSocket URL of the bus.
    #[serde(default = "default_bus_url")]
    pub url: String,

    /// Seconds between reconnection attempts.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl BusConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Health check timing, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthSettings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_retry_secs")]
    pub retry_secs: u64,
}

impl HealthSettings {
    pub fn to_health_config(&self) -> HealthConfig {
        HealthConfig {
            interval: Duration::from_secs(self.interval_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            retry: Duration::from_secs(self.retry_secs),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "omva_dialog=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_bus_url() -> String {
    "ws://127.0.0.1:8181/core".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_interval_secs() -> u64 {
    300
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_retry_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: default_bus_url(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            retry_secs: default_retry_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but holds unusable values.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Checks every section for values the skill cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.url.trim().is_empty() {
            return Err(ConfigError::Invalid("bus.url must not be empty".to_string()));
        }
        self.enrollment.validate().map_err(ConfigError::Invalid)?;
        if self.enrollment.processing_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "enrollment.processing_timeout_secs must be positive".to_string(),
            ));
        }
        let health = &self.health;
        if health.interval_secs == 0 || health.timeout_secs == 0 || health.retry_secs == 0 {
            return Err(ConfigError::Invalid(
                "health intervals must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `OMVA_BUS_URL` overrides `bus.url`
/// - `OMVA_TARGET_SAMPLES` overrides `enrollment.target_samples`
/// - `OMVA_LOG_LEVEL` overrides `logging.level`
/// - `OMVA_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if the resulting configuration is invalid.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Applies overrides looked up through `var`.
fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var("OMVA_BUS_URL") {
        config.bus.url = url;
    }
    if let Some(samples) = var("OMVA_TARGET_SAMPLES") {
        match samples.parse() {
            Ok(parsed) => config.enrollment.target_samples = parsed,
            Err(_) => tracing::warn!(value = %samples, "ignoring unparseable OMVA_TARGET_SAMPLES"),
        }
    }
    if let Some(level) = var("OMVA_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("OMVA_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
