//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub rest: RestSettings,
    pub gateway: GatewaySettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
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
}

/// Kind of credential sent in the `Authorization` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[default]
    Bot,
    Bearer,
}

impl TokenType {
    /// Header prefix for this token type
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Bot => "Bot",
            Self::Bearer => "Bearer",
        }
    }
}

impl FromStr for TokenType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bot" => Ok(Self::Bot),
            "bearer" | "user" => Ok(Self::Bearer),
            other => Err(ConfigError::InvalidValue("CHORD_TOKEN_TYPE", other.to_string())),
        }
    }
}

/// REST API settings
#[derive(Debug, Clone, Deserialize)]
pub struct RestSettings {
    pub token: String,
    #[serde(default)]
    pub token_type: TokenType,
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

/// Gateway connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_version")]
    pub version: u8,
    #[serde(default)]
    pub shard_index: u32,
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u16,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_handler_concurrency")]
    pub handler_concurrency: usize,
    #[serde(default = "default_handler_drain_timeout_ms")]
    pub handler_drain_timeout_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl GatewaySettings {
    /// Smallest member count the gateway accepts as `large_threshold`
    pub const MIN_LARGE_THRESHOLD: u16 = 50;
    /// Largest member count the gateway accepts as `large_threshold`
    pub const MAX_LARGE_THRESHOLD: u16 = 250;
    /// Presence statuses the gateway understands
    pub const VALID_STATUSES: &'static [&'static str] =
        &["online", "dnd", "idle", "invisible", "offline"];

    /// Clamp a requested large threshold into the accepted range
    #[must_use]
    pub fn clamp_large_threshold(value: u16) -> u16 {
        value.clamp(Self::MIN_LARGE_THRESHOLD, Self::MAX_LARGE_THRESHOLD)
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            version: default_gateway_version(),
            shard_index: 0,
            shard_count: default_shard_count(),
            large_threshold: default_large_threshold(),
            status: default_status(),
            connect_timeout_ms: default_connect_timeout_ms(),
            handler_concurrency: default_handler_concurrency(),
            handler_drain_timeout_ms: default_handler_drain_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "chord".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_api_base_url() -> String {
    "https://discordapp.com/api".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_gateway_version() -> u8 {
    6
}

fn default_shard_count() -> u32 {
    1
}

fn default_large_threshold() -> u16 {
    50
}

fn default_status() -> String {
    "online".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_handler_concurrency() -> usize {
    64
}

fn default_handler_drain_timeout_ms() -> u64 {
    5_000
}

fn default_channel_capacity() -> usize {
    100
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: impl FnOnce() -> T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(default()),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `CHORD_TOKEN` is missing or a variable fails validation
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let app = AppSettings {
            name: lookup("APP_NAME").unwrap_or_else(default_app_name),
            env: lookup("APP_ENV")
                .and_then(|s| match s.to_lowercase().as_str() {
                    "production" => Some(Environment::Production),
                    "staging" => Some(Environment::Staging),
                    "development" => Some(Environment::Development),
                    _ => None,
                })
                .unwrap_or_default(),
        };

        let token = lookup("CHORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("CHORD_TOKEN"))?;

        let rest = RestSettings {
            token,
            token_type: parse_or(&lookup, "CHORD_TOKEN_TYPE", TokenType::default)?,
            base_url: lookup("CHORD_API_BASE_URL").unwrap_or_else(default_api_base_url),
            timeout_ms: parse_or(&lookup, "CHORD_REQUEST_TIMEOUT_MS", default_request_timeout_ms)?,
        };

        let gateway = GatewaySettings {
            version: parse_or(&lookup, "CHORD_GATEWAY_VERSION", default_gateway_version)?,
            shard_index: parse_or(&lookup, "CHORD_SHARD_INDEX", || 0)?,
            shard_count: parse_or(&lookup, "CHORD_SHARD_COUNT", default_shard_count)?,
            large_threshold: GatewaySettings::clamp_large_threshold(parse_or(
                &lookup,
                "CHORD_LARGE_THRESHOLD",
                default_large_threshold,
            )?),
            status: lookup("CHORD_STATUS")
                .map(|s| s.to_lowercase())
                .unwrap_or_else(default_status),
            connect_timeout_ms: parse_or(&lookup, "CHORD_CONNECT_TIMEOUT_MS", default_connect_timeout_ms)?,
            handler_concurrency: parse_or(
                &lookup,
                "CHORD_HANDLER_CONCURRENCY",
                default_handler_concurrency,
            )?,
            handler_drain_timeout_ms: parse_or(
                &lookup,
                "CHORD_HANDLER_DRAIN_TIMEOUT_MS",
                default_handler_drain_timeout_ms,
            )?,
            channel_capacity: parse_or(&lookup, "CHORD_CHANNEL_CAPACITY", default_channel_capacity)?,
            reconnect_delay_ms: parse_or(&lookup, "CHORD_RECONNECT_DELAY_MS", default_reconnect_delay_ms)?,
        };

        let config = Self { app, rest, gateway };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gateway = &self.gateway;

        if gateway.shard_count == 0 {
            return Err(ConfigError::InvalidValue("CHORD_SHARD_COUNT", "0".to_string()));
        }
        if gateway.shard_index >= gateway.shard_count {
            return Err(ConfigError::InvalidValue(
                "CHORD_SHARD_INDEX",
                format!("{} (shard count is {})", gateway.shard_index, gateway.shard_count),
            ));
        }
        if !GatewaySettings::VALID_STATUSES.contains(&gateway.status.as_str()) {
            return Err(ConfigError::InvalidValue("CHORD_STATUS", gateway.status.clone()));
        }
        if gateway.handler_concurrency == 0 {
            return Err(ConfigError::InvalidValue("CHORD_HANDLER_CONCURRENCY", "0".to_string()));
        }
        if gateway.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue("CHORD_CHANNEL_CAPACITY", "0".to_string()));
        }

        Ok(())
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
