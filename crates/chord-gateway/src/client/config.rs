//! Gateway client configuration

use crate::error::GatewayResult;
use crate::events::HandlerRegistry;
use crate::protocol::{IdentifyPayload, IdentifyProperties, Status, StatusUpdate};
use chord_common::{AppConfig, ConfigError, GatewaySettings};
use std::time::Duration;

/// Gateway protocol version this client speaks
pub const GATEWAY_VERSION: u8 = 6;

/// Everything the gateway client needs besides its REST collaborator
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Raw access token sent in Identify
    pub token: String,

    /// Protocol version requested in the connect URL
    pub version: u8,

    pub properties: IdentifyProperties,

    /// Clamped to 50..=250
    pub large_threshold: u16,

    /// `[shard_index, shard_count]`
    pub shard: [u32; 2],

    /// Presence sent with Identify
    pub presence: StatusUpdate,

    /// Bound on opening the socket
    pub connect_timeout: Duration,

    /// Handler tasks allowed to run at once
    pub handler_concurrency: usize,

    /// How long `run` waits for handlers after the connection ends
    pub handler_drain_timeout: Duration,

    /// Capacity of the inbound and outbound payload queues
    pub channel_capacity: usize,

    /// Log dispatch bodies that fail to decode instead of ending the connection
    pub tolerate_dispatch_errors: bool,
}

impl GatewayConfig {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            version: GATEWAY_VERSION,
            properties: IdentifyProperties::default(),
            large_threshold: GatewaySettings::MIN_LARGE_THRESHOLD,
            shard: [0, 1],
            presence: StatusUpdate::online(),
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            handler_concurrency: HandlerRegistry::DEFAULT_CONCURRENCY,
            handler_drain_timeout: Self::DEFAULT_DRAIN_TIMEOUT,
            channel_capacity: Self::DEFAULT_CHANNEL_CAPACITY,
            tolerate_dispatch_errors: false,
        }
    }

    /// Build from environment-loaded settings
    pub fn from_app_config(config: &AppConfig) -> GatewayResult<Self> {
        let settings = &config.gateway;
        let status = Status::parse(&settings.status)
            .ok_or_else(|| ConfigError::InvalidValue("CHORD_STATUS", settings.status.clone()))?;

        Ok(Self {
            version: settings.version,
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            handler_concurrency: settings.handler_concurrency,
            handler_drain_timeout: Duration::from_millis(settings.handler_drain_timeout_ms),
            channel_capacity: settings.channel_capacity,
            ..Self::new(config.rest.token.clone())
        }
        .with_shard(settings.shard_index, settings.shard_count)?
        .with_large_threshold(settings.large_threshold)
        .with_status(status))
    }

    /// Select a shard. `index` must be below `count`.
    pub fn with_shard(mut self, index: u32, count: u32) -> GatewayResult<Self> {
        if count == 0 || index >= count {
            return Err(ConfigError::InvalidValue("shard", format!("[{index}, {count}]")).into());
        }
        self.shard = [index, count];
        Ok(self)
    }

    #[must_use]
    pub fn with_large_threshold(mut self, threshold: u16) -> Self {
        self.large_threshold = GatewaySettings::clamp_large_threshold(threshold);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.presence.status = status;
        self
    }

    #[must_use]
    pub fn with_presence(mut self, presence: StatusUpdate) -> Self {
        self.presence = presence;
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_handler_drain_timeout(mut self, timeout: Duration) -> Self {
        self.handler_drain_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_tolerate_dispatch_errors(mut self, tolerate: bool) -> Self {
        self.tolerate_dispatch_errors = tolerate;
        self
    }

    /// Identify body for a new session
    #[must_use]
    pub fn identify_payload(&self) -> IdentifyPayload {
        IdentifyPayload {
            token: self.token.clone(),
            properties: self.properties.clone(),
            compress: false,
            large_threshold: self.large_threshold,
            shard: self.shard,
            presence: self.presence.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::new("abc");
        assert_eq!(config.version, 6);
        assert_eq!(config.shard, [0, 1]);
        assert_eq!(config.large_threshold, 50);
        assert_eq!(config.presence.status, Status::Online);
        assert!(!config.tolerate_dispatch_errors);
    }

    #[test]
    fn test_identify_payload() {
        let identify = GatewayConfig::new("abc")
            .with_large_threshold(1000)
            .with_status(Status::Dnd)
            .identify_payload();

        assert_eq!(identify.token, "abc");
        assert!(!identify.compress);
        assert_eq!(identify.large_threshold, 250);
        assert_eq!(identify.shard, [0, 1]);
        assert_eq!(identify.presence.status, Status::Dnd);
        assert_eq!(identify.properties.browser, IdentifyProperties::LIBRARY_NAME);
    }

    #[test]
    fn test_shard_validation() {
        let config = GatewayConfig::new("abc").with_shard(2, 4).unwrap();
        assert_eq!(config.shard, [2, 4]);

        assert!(matches!(
            GatewayConfig::new("abc").with_shard(4, 4),
            Err(GatewayError::Config(_))
        ));
        assert!(GatewayConfig::new("abc").with_shard(0, 0).is_err());
    }

    #[test]
    fn test_from_app_config() {
        let vars: HashMap<&str, &str> = [
            ("CHORD_TOKEN", "secret"),
            ("CHORD_SHARD_INDEX", "1"),
            ("CHORD_SHARD_COUNT", "2"),
            ("CHORD_STATUS", "idle"),
            ("CHORD_CONNECT_TIMEOUT_MS", "2500"),
        ]
        .into_iter()
        .collect();
        let app = AppConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string())).unwrap();

        let config = GatewayConfig::from_app_config(&app).unwrap();
        assert_eq!(config.token, "secret");
        assert_eq!(config.shard, [1, 2]);
        assert_eq!(config.presence.status, Status::Idle);
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        assert_eq!(config.channel_capacity, 100);
    }
}
