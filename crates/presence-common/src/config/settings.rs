//! Presence configuration
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Top-level presence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceSettings {
    #[serde(default)]
    pub env: Environment,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
    #[serde(default = "default_subscription_buffer")]
    pub subscription_buffer: usize,
    /// Redis transport settings; `None` when running on the in-process bus
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Throttle and decay windows of the typing protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimingConfig {
    /// Minimum spacing between outbound `typing: true` events
    #[serde(default = "default_throttle_window_ms")]
    pub throttle_window_ms: u64,
    /// How long a remote `typing: true` stays valid without a refresh
    #[serde(default = "default_decay_window_ms")]
    pub decay_window_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            throttle_window_ms: default_throttle_window_ms(),
            decay_window_ms: default_decay_window_ms(),
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.throttle_window_ms)
    }

    #[must_use]
    pub fn decay_window(&self) -> Duration {
        Duration::from_millis(self.decay_window_ms)
    }

    /// Reject zero-length windows
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.throttle_window_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "PRESENCE_THROTTLE_MS",
                "must be greater than zero".to_string(),
            ));
        }
        if self.decay_window_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "PRESENCE_DECAY_MS",
                "must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            env: Environment::default(),
            timing: TimingConfig::default(),
            channel_prefix: default_channel_prefix(),
            subscription_buffer: default_subscription_buffer(),
            redis: None,
            log_format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_throttle_window_ms() -> u64 {
    1000
}

fn default_decay_window_ms() -> u64 {
    3000
}

fn default_channel_prefix() -> String {
    "typing:".to_string()
}

fn default_subscription_buffer() -> usize {
    64
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

impl PresenceSettings {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is present but cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = match lookup("APP_ENV") {
            Some(value) => Environment::parse(&value)
                .ok_or(ConfigError::InvalidValue("APP_ENV", value))?,
            None => Environment::default(),
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::to_lowercase) {
            None => LogFormat::default(),
            Some(value) if value == "json" => LogFormat::Json,
            Some(value) if value == "pretty" => LogFormat::Pretty,
            Some(value) => return Err(ConfigError::InvalidValue("LOG_FORMAT", value)),
        };

        let timing = TimingConfig {
            throttle_window_ms: parse_or(&lookup, "PRESENCE_THROTTLE_MS", default_throttle_window_ms)?,
            decay_window_ms: parse_or(&lookup, "PRESENCE_DECAY_MS", default_decay_window_ms)?,
        };
        timing.validate()?;

        let redis = match lookup("REDIS_URL") {
            Some(url) => Some(RedisConfig {
                url,
                max_connections: parse_or(
                    &lookup,
                    "REDIS_MAX_CONNECTIONS",
                    default_redis_max_connections,
                )?,
                reconnect_delay_ms: parse_or(
                    &lookup,
                    "REDIS_RECONNECT_DELAY_MS",
                    default_reconnect_delay_ms,
                )?,
            }),
            None => None,
        };

        Ok(Self {
            env,
            timing,
            channel_prefix: lookup("PRESENCE_CHANNEL_PREFIX")
                .unwrap_or_else(default_channel_prefix),
            subscription_buffer: parse_or(
                &lookup,
                "PRESENCE_SUBSCRIPTION_BUFFER",
                default_subscription_buffer,
            )?,
            redis,
            log_format,
        })
    }

    /// Redis settings, or an error naming the missing variable
    pub fn require_redis(&self) -> Result<&RedisConfig, ConfigError> {
        self.redis.as_ref().ok_or(ConfigError::MissingVar("REDIS_URL"))
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: fn() -> T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(default()),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
