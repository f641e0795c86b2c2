/*
[INPUT]:  Endpoint address, base reconnect interval, per-feed tuning knobs
[OUTPUT]: Validated SocketConfig / ConnectionProfile consumed by the connection actor
[POS]:    WebSocket layer - connection tuning (timeouts, backoff, queue sizes)
[UPDATE]: When adding tuning knobs or changing preset defaults
*/

use std::time::Duration;

use url::Url;

use crate::error::{Result, SocketError};

/// What the connection writes on each heartbeat tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatPayload {
    /// WebSocket control ping; servers answer with a pong frame.
    Ping,
    /// Application-level text frame (for feeds that expect a JSON ping).
    Text(String),
}

/// Tuning knobs for one endpoint class.
///
/// Every field is a default, not a contract: feeds with different traffic
/// shapes get different presets, and callers can override any of them.
///
/// ```rust
/// use pumpwatch_adapter::ConnectionProfile;
/// use std::time::Duration;
///
/// let profile = ConnectionProfile::token_feed()
///     .to_builder()
///     .max_queue_size(1_000)
///     .heartbeat_interval(Duration::from_secs(15))
///     .build();
/// assert_eq!(profile.max_queue_size, 1_000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionProfile {
    /// Automatic reconnects allowed before giving up.
    pub max_reconnect_attempts: u32,
    /// Multiplier applied to the base interval per attempt.
    pub growth_factor: f64,
    /// Upper bound on the pre-jitter reconnect delay.
    pub max_backoff_delay: Duration,
    /// Relative jitter applied to each reconnect delay (0.15 = ±15%).
    pub jitter_ratio: f64,
    /// Consecutive errors tolerated before forcing a reconnect.
    pub max_consecutive_errors: u32,
    /// Interval between heartbeat checks while open.
    pub heartbeat_interval: Duration,
    /// Maximum silence (no inbound frame) before the connection is stale.
    pub heartbeat_timeout: Duration,
    /// Maximum wait for any inbound frame after a heartbeat was sent.
    pub pong_timeout: Duration,
    pub heartbeat_payload: HeartbeatPayload,
    /// Maximum time for the transport to open.
    pub establishment_timeout: Duration,
    /// Delay between transport open and the connection being reported open.
    pub stabilization_delay: Duration,
    /// Delay between the teardown and the reconnect of `reset_connection`.
    pub reset_delay: Duration,
    /// Inbound queue capacity; overflow drops the oldest entries.
    pub max_queue_size: usize,
    pub queue_drain_interval: Duration,
    /// Upper bound on messages delivered per drain tick.
    pub max_batch_size: usize,
    /// Share of the backlog taken per drain tick, before `max_batch_size`.
    pub drain_fraction: f64,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 10,
            growth_factor: 1.5,
            max_backoff_delay: Duration::from_secs(30),
            jitter_ratio: 0.15,
            max_consecutive_errors: 5,
            heartbeat_interval: Duration::from_secs(25),
            heartbeat_timeout: Duration::from_secs(40),
            pong_timeout: Duration::from_secs(10),
            heartbeat_payload: HeartbeatPayload::Ping,
            establishment_timeout: Duration::from_secs(10),
            stabilization_delay: Duration::from_millis(500),
            reset_delay: Duration::from_secs(1),
            max_queue_size: 200,
            queue_drain_interval: Duration::from_millis(100),
            max_batch_size: 10,
            drain_fraction: 0.25,
        }
    }
}

impl ConnectionProfile {
    /// Create a new builder starting from the default profile.
    pub fn builder() -> ConnectionProfileBuilder {
        ConnectionProfileBuilder {
            profile: Self::default(),
        }
    }

    /// Create a builder seeded with this profile.
    pub fn to_builder(&self) -> ConnectionProfileBuilder {
        ConnectionProfileBuilder {
            profile: self.clone(),
        }
    }

    /// Steady, low-volume feed (reference price updates).
    pub fn price_feed() -> Self {
        Self {
            max_reconnect_attempts: 10,
            growth_factor: 1.5,
            max_backoff_delay: Duration::from_secs(30),
            max_consecutive_errors: 5,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(45),
            establishment_timeout: Duration::from_secs(10),
            max_queue_size: 200,
            queue_drain_interval: Duration::from_millis(100),
            max_batch_size: 10,
            ..Self::default()
        }
    }

    /// Chatty and flaky feed (token launches and trades): tolerates more
    /// errors, backs off further, drains faster in bigger batches.
    pub fn token_feed() -> Self {
        Self {
            max_reconnect_attempts: 15,
            growth_factor: 1.7,
            max_backoff_delay: Duration::from_secs(60),
            max_consecutive_errors: 10,
            heartbeat_interval: Duration::from_secs(20),
            heartbeat_timeout: Duration::from_secs(30),
            establishment_timeout: Duration::from_secs(15),
            stabilization_delay: Duration::from_secs(1),
            max_queue_size: 500,
            queue_drain_interval: Duration::from_millis(50),
            max_batch_size: 25,
            ..Self::default()
        }
    }

    /// Reject knob combinations the connection cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_reconnect_attempts == 0 {
            return Err(SocketError::Config(
                "max_reconnect_attempts must be at least 1".to_string(),
            ));
        }
        if !self.growth_factor.is_finite() || self.growth_factor < 1.0 {
            return Err(SocketError::Config(format!(
                "growth_factor must be >= 1.0, got {}",
                self.growth_factor
            )));
        }
        if !(0.0..1.0).contains(&self.jitter_ratio) {
            return Err(SocketError::Config(format!(
                "jitter_ratio must be in [0, 1), got {}",
                self.jitter_ratio
            )));
        }
        if self.max_queue_size == 0 || self.max_batch_size == 0 {
            return Err(SocketError::Config(
                "max_queue_size and max_batch_size must be positive".to_string(),
            ));
        }
        if !(self.drain_fraction > 0.0 && self.drain_fraction <= 1.0) {
            return Err(SocketError::Config(format!(
                "drain_fraction must be in (0, 1], got {}",
                self.drain_fraction
            )));
        }
        if self.heartbeat_interval.is_zero() || self.queue_drain_interval.is_zero() {
            return Err(SocketError::Config(
                "heartbeat_interval and queue_drain_interval must be non-zero".to_string(),
            ));
        }
        if self.heartbeat_timeout < self.heartbeat_interval {
            return Err(SocketError::Config(format!(
                "heartbeat_timeout ({}ms) must not be shorter than heartbeat_interval ({}ms)",
                self.heartbeat_timeout.as_millis(),
                self.heartbeat_interval.as_millis()
            )));
        }
        Ok(())
    }
}

/// Builder for custom [`ConnectionProfile`] values.
#[derive(Debug, Clone)]
pub struct ConnectionProfileBuilder {
    profile: ConnectionProfile,
}

impl ConnectionProfileBuilder {
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.profile.max_reconnect_attempts = attempts;
        self
    }

    pub fn growth_factor(mut self, factor: f64) -> Self {
        self.profile.growth_factor = factor;
        self
    }

    pub fn max_backoff_delay(mut self, delay: Duration) -> Self {
        self.profile.max_backoff_delay = delay;
        self
    }

    /// Set the relative jitter; 0 disables it.
    pub fn jitter_ratio(mut self, ratio: f64) -> Self {
        self.profile.jitter_ratio = ratio;
        self
    }

    pub fn max_consecutive_errors(mut self, errors: u32) -> Self {
        self.profile.max_consecutive_errors = errors;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.profile.heartbeat_interval = interval;
        self
    }

    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.profile.heartbeat_timeout = timeout;
        self
    }

    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.profile.pong_timeout = timeout;
        self
    }

    pub fn heartbeat_payload(mut self, payload: HeartbeatPayload) -> Self {
        self.profile.heartbeat_payload = payload;
        self
    }

    pub fn establishment_timeout(mut self, timeout: Duration) -> Self {
        self.profile.establishment_timeout = timeout;
        self
    }

    pub fn stabilization_delay(mut self, delay: Duration) -> Self {
        self.profile.stabilization_delay = delay;
        self
    }

    pub fn reset_delay(mut self, delay: Duration) -> Self {
        self.profile.reset_delay = delay;
        self
    }

    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.profile.max_queue_size = size;
        self
    }

    pub fn queue_drain_interval(mut self, interval: Duration) -> Self {
        self.profile.queue_drain_interval = interval;
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.profile.max_batch_size = size;
        self
    }

    pub fn drain_fraction(mut self, fraction: f64) -> Self {
        self.profile.drain_fraction = fraction;
        self
    }

    pub fn build(self) -> ConnectionProfile {
        self.profile
    }
}

/// Everything a connection needs besides its handlers and transport.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub endpoint: String,
    /// First reconnect delay; later delays grow from it.
    pub base_reconnect_interval: Duration,
    pub profile: ConnectionProfile,
}

impl SocketConfig {
    pub fn new(endpoint: impl Into<String>, base_reconnect_interval: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            base_reconnect_interval,
            profile: ConnectionProfile::default(),
        }
    }

    pub fn with_profile(mut self, profile: ConnectionProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Validate the endpoint and the profile.
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(SocketError::Config(format!(
                "endpoint must use ws:// or wss://, got {}",
                url.scheme()
            )));
        }
        if self.base_reconnect_interval.is_zero() {
            return Err(SocketError::Config(
                "base_reconnect_interval must be non-zero".to_string(),
            ));
        }
        self.profile.validate()?;
        Ok(url)
    }
}
