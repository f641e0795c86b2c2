/*
[INPUT]:  YAML configuration file (every field optional)
[OUTPUT]: Parsed dashboard configuration, socket configs per feed, board settings
[POS]:    Configuration layer - feed endpoints, connection tuning, board limits
[UPDATE]: When adding new configuration options
*/

use std::time::Duration;

use anyhow::{Context, bail};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pumpwatch_adapter::{ConnectionProfile, HeartbeatPayload, SocketConfig};

use crate::board::BoardSettings;

pub const DEFAULT_PYTH_ENDPOINT: &str = "wss://hermes.pyth.network/ws";
pub const DEFAULT_PUMP_ENDPOINT: &str = "wss://pumpportal.fun/api/data";
pub const SOL_USD_FEED_ID: &str =
    "0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d";

/// Top-level configuration for the dashboard
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DashboardConfig {
    /// Pyth Hermes price feed
    #[serde(default)]
    pub price_feed: PriceFeedConfig,
    /// PumpPortal token feed
    #[serde(default)]
    pub token_feed: TokenFeedConfig,
    /// Board limits
    #[serde(default)]
    pub board: BoardConfig,
    /// Refresh and summary cadence
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// SOL/USD price feed configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PriceFeedConfig {
    #[serde(default = "default_pyth_endpoint")]
    pub endpoint: String,
    /// Price feed id to subscribe to (hex, `0x` prefix optional)
    #[serde(default = "default_feed_id")]
    pub feed_id: String,
    /// Base reconnect interval in milliseconds
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// Overrides applied onto the price feed preset
    #[serde(default)]
    pub profile: ProfileOverrides,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            endpoint: default_pyth_endpoint(),
            feed_id: default_feed_id(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            profile: ProfileOverrides::default(),
        }
    }
}

/// Token launch feed configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenFeedConfig {
    #[serde(default = "default_pump_endpoint")]
    pub endpoint: String,
    /// Base reconnect interval in milliseconds
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// Overrides applied onto the token feed preset
    #[serde(default)]
    pub profile: ProfileOverrides,
}

impl Default for TokenFeedConfig {
    fn default() -> Self {
        Self {
            endpoint: default_pump_endpoint(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            profile: ProfileOverrides::default(),
        }
    }
}

/// Optional connection tuning; unset fields keep the preset value.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProfileOverrides {
    pub max_reconnect_attempts: Option<u32>,
    pub growth_factor: Option<f64>,
    pub max_backoff_delay_ms: Option<u64>,
    pub jitter_ratio: Option<f64>,
    pub max_consecutive_errors: Option<u32>,
    pub heartbeat_interval_ms: Option<u64>,
    pub heartbeat_timeout_ms: Option<u64>,
    pub pong_timeout_ms: Option<u64>,
    /// Send this text instead of a ping frame as the heartbeat
    pub heartbeat_text: Option<String>,
    pub establishment_timeout_ms: Option<u64>,
    pub stabilization_delay_ms: Option<u64>,
    pub reset_delay_ms: Option<u64>,
    pub max_queue_size: Option<usize>,
    pub queue_drain_interval_ms: Option<u64>,
    pub max_batch_size: Option<usize>,
    pub drain_fraction: Option<f64>,
}

impl ProfileOverrides {
    pub fn apply(&self, base: ConnectionProfile) -> ConnectionProfile {
        let mut builder = base.to_builder();
        if let Some(value) = self.max_reconnect_attempts {
            builder = builder.max_reconnect_attempts(value);
        }
        if let Some(value) = self.growth_factor {
            builder = builder.growth_factor(value);
        }
        if let Some(ms) = self.max_backoff_delay_ms {
            builder = builder.max_backoff_delay(Duration::from_millis(ms));
        }
        if let Some(value) = self.jitter_ratio {
            builder = builder.jitter_ratio(value);
        }
        if let Some(value) = self.max_consecutive_errors {
            builder = builder.max_consecutive_errors(value);
        }
        if let Some(ms) = self.heartbeat_interval_ms {
            builder = builder.heartbeat_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = self.heartbeat_timeout_ms {
            builder = builder.heartbeat_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.pong_timeout_ms {
            builder = builder.pong_timeout(Duration::from_millis(ms));
        }
        if let Some(text) = &self.heartbeat_text {
            builder = builder.heartbeat_payload(HeartbeatPayload::Text(text.clone()));
        }
        if let Some(ms) = self.establishment_timeout_ms {
            builder = builder.establishment_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.stabilization_delay_ms {
            builder = builder.stabilization_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.reset_delay_ms {
            builder = builder.reset_delay(Duration::from_millis(ms));
        }
        if let Some(value) = self.max_queue_size {
            builder = builder.max_queue_size(value);
        }
        if let Some(ms) = self.queue_drain_interval_ms {
            builder = builder.queue_drain_interval(Duration::from_millis(ms));
        }
        if let Some(value) = self.max_batch_size {
            builder = builder.max_batch_size(value);
        }
        if let Some(value) = self.drain_fraction {
            builder = builder.drain_fraction(value);
        }
        builder.build()
    }
}

/// Board retention and filter limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardConfig {
    /// Trades above this USD value are listed as large transactions
    #[serde(default = "default_large_transaction_usd")]
    pub large_transaction_usd: Decimal,
    #[serde(default = "default_max_large_transactions")]
    pub max_large_transactions: usize,
    #[serde(default = "default_max_tokens_displayed")]
    pub max_tokens_displayed: usize,
    /// Seconds without trades before a token leaves the board
    #[serde(default = "default_inactive_after_secs")]
    pub inactive_after_secs: u64,
    /// Dev balance ratio below which a token counts as rugged
    #[serde(default = "default_rug_ratio")]
    pub rug_ratio: Decimal,
    #[serde(default = "default_price_history_len")]
    pub price_history_len: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            large_transaction_usd: default_large_transaction_usd(),
            max_large_transactions: default_max_large_transactions(),
            max_tokens_displayed: default_max_tokens_displayed(),
            inactive_after_secs: default_inactive_after_secs(),
            rug_ratio: default_rug_ratio(),
            price_history_len: default_price_history_len(),
        }
    }
}

impl BoardConfig {
    pub fn settings(&self) -> BoardSettings {
        BoardSettings {
            large_transaction_usd: self.large_transaction_usd,
            max_large_transactions: self.max_large_transactions,
            max_tokens_displayed: self.max_tokens_displayed,
            inactive_after: Duration::from_secs(self.inactive_after_secs),
            rug_ratio: self.rug_ratio,
            price_history_len: self.price_history_len,
        }
    }
}

/// Periodic work cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Seconds between refreshes (reset given-up feeds, re-price, prune)
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Seconds between summary log lines
    #[serde(default = "default_summary_interval_secs")]
    pub summary_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            summary_interval_secs: default_summary_interval_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_secs)
    }
}

fn default_pyth_endpoint() -> String {
    DEFAULT_PYTH_ENDPOINT.to_string()
}

fn default_pump_endpoint() -> String {
    DEFAULT_PUMP_ENDPOINT.to_string()
}

fn default_feed_id() -> String {
    SOL_USD_FEED_ID.to_string()
}

fn default_reconnect_interval_ms() -> u64 {
    10_000
}

fn default_large_transaction_usd() -> Decimal {
    Decimal::from(1_000)
}

fn default_max_large_transactions() -> usize {
    20
}

fn default_max_tokens_displayed() -> usize {
    20
}

fn default_inactive_after_secs() -> u64 {
    300
}

fn default_rug_ratio() -> Decimal {
    Decimal::new(3, 1)
}

fn default_price_history_len() -> usize {
    30
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_summary_interval_secs() -> u64 {
    60
}

impl DashboardConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config)
    }

    pub fn price_socket_config(&self) -> SocketConfig {
        let feed = &self.price_feed;
        SocketConfig::new(
            feed.endpoint.clone(),
            Duration::from_millis(feed.reconnect_interval_ms),
        )
        .with_profile(feed.profile.apply(ConnectionProfile::price_feed()))
    }

    pub fn token_socket_config(&self) -> SocketConfig {
        let feed = &self.token_feed;
        SocketConfig::new(
            feed.endpoint.clone(),
            Duration::from_millis(feed.reconnect_interval_ms),
        )
        .with_profile(feed.profile.apply(ConnectionProfile::token_feed()))
    }

    /// Check everything that would otherwise fail at startup.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.price_socket_config()
            .validate()
            .context("price_feed")?;
        self.token_socket_config()
            .validate()
            .context("token_feed")?;
        if self.price_feed.feed_id.trim_start_matches("0x").is_empty() {
            bail!("price_feed.feed_id must not be empty");
        }
        if self.schedule.refresh_interval_secs == 0 || self.schedule.summary_interval_secs == 0 {
            bail!("schedule intervals must be positive");
        }
        if self.board.max_tokens_displayed == 0 || self.board.price_history_len == 0 {
            bail!("board.max_tokens_displayed and board.price_history_len must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn empty_document_uses_defaults() {
        let config = DashboardConfig::from_yaml("{}").unwrap();
        assert_eq!(config.price_feed.endpoint, DEFAULT_PYTH_ENDPOINT);
        assert_eq!(config.price_feed.feed_id, SOL_USD_FEED_ID);
        assert_eq!(config.token_feed.endpoint, DEFAULT_PUMP_ENDPOINT);
        assert_eq!(config.token_feed.reconnect_interval_ms, 10_000);
        assert_eq!(config.board.settings(), BoardSettings::default());
        assert_eq!(config.schedule.refresh_interval(), Duration::from_secs(30));
        config.validate().unwrap();

        let price = config.price_socket_config();
        assert_eq!(price.profile, ConnectionProfile::price_feed());
        assert_eq!(price.base_reconnect_interval, Duration::from_secs(10));
        assert_eq!(config.token_socket_config().profile, ConnectionProfile::token_feed());
    }

    #[test]
    fn overrides_land_on_presets() {
        let yaml = r#"
token_feed:
  endpoint: "ws://127.0.0.1:9000/data"
  reconnect_interval_ms: 2500
  profile:
    max_reconnect_attempts: 3
    heartbeat_interval_ms: 5000
    heartbeat_text: '{"type":"ping"}'
    max_queue_size: 64
board:
  large_transaction_usd: "250.5"
  inactive_after_secs: 60
schedule:
  summary_interval_secs: 5
"#;
        let config = DashboardConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();

        let token = config.token_socket_config();
        assert_eq!(token.endpoint, "ws://127.0.0.1:9000/data");
        assert_eq!(token.base_reconnect_interval, Duration::from_millis(2500));
        assert_eq!(token.profile.max_reconnect_attempts, 3);
        assert_eq!(token.profile.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(
            token.profile.heartbeat_payload,
            HeartbeatPayload::Text(r#"{"type":"ping"}"#.to_string())
        );
        assert_eq!(token.profile.max_queue_size, 64);
        assert_eq!(
            token.profile.max_batch_size,
            ConnectionProfile::token_feed().max_batch_size
        );

        let settings = config.board.settings();
        assert_eq!(settings.large_transaction_usd, Decimal::from_str("250.5").unwrap());
        assert_eq!(settings.inactive_after, Duration::from_secs(60));
        assert_eq!(settings.max_tokens_displayed, 20);
        assert_eq!(config.schedule.summary_interval(), Duration::from_secs(5));
        assert_eq!(config.schedule.refresh_interval_secs, 30);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let bad_scheme = DashboardConfig::from_yaml("price_feed:\n  endpoint: \"https://hermes.pyth.network\"\n").unwrap();
        assert!(bad_scheme.validate().is_err());

        let zero_interval = DashboardConfig::from_yaml("token_feed:\n  reconnect_interval_ms: 0\n").unwrap();
        assert!(zero_interval.validate().is_err());

        let bad_profile = DashboardConfig::from_yaml("token_feed:\n  profile:\n    jitter_ratio: 1.5\n").unwrap();
        assert!(bad_profile.validate().is_err());

        let no_summary = DashboardConfig::from_yaml("schedule:\n  summary_interval_secs: 0\n").unwrap();
        assert!(no_summary.validate().is_err());
    }
}
