/*
[INPUT]:  Pyth Hermes WebSocket JSON
[OUTPUT]: PythRequest frames, PythMessage values, decimal prices
[POS]:    Data layer - reference price feed schema
[UPDATE]: When Hermes changes its subscribe or price_update format
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client frames understood by Hermes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PythRequest {
    Subscribe { ids: Vec<String> },
    Unsubscribe { ids: Vec<String> },
}

impl PythRequest {
    pub fn subscribe(feed_id: impl Into<String>) -> Self {
        PythRequest::Subscribe {
            ids: vec![feed_id.into()],
        }
    }
}

/// Server frames sent by Hermes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PythMessage {
    PriceUpdate {
        price_feed: PriceFeed,
    },
    Response {
        status: String,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl PythMessage {
    /// Interpret a drained payload; anything unrecognized is `Other`.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or(PythMessage::Other)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceFeed {
    pub id: String,
    pub price: PythPrice,
    #[serde(default)]
    pub ema_price: Option<PythPrice>,
}

impl PriceFeed {
    /// Hermes reports ids without the `0x` prefix that subscriptions use.
    pub fn matches(&self, feed_id: &str) -> bool {
        let wanted = feed_id.trim_start_matches("0x");
        self.id.trim_start_matches("0x").eq_ignore_ascii_case(wanted)
    }
}

/// Fixed-point price: `price * 10^expo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythPrice {
    pub price: String,
    pub conf: String,
    pub expo: i32,
    pub publish_time: i64,
}

impl PythPrice {
    pub fn value(&self) -> Option<Decimal> {
        scaled(&self.price, self.expo)
    }

    pub fn confidence(&self) -> Option<Decimal> {
        scaled(&self.conf, self.expo)
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.publish_time, 0)
    }
}

fn scaled(mantissa: &str, expo: i32) -> Option<Decimal> {
    let mantissa: i64 = mantissa.trim().parse().ok()?;
    if expo <= 0 {
        Decimal::try_from_i128_with_scale(mantissa as i128, expo.unsigned_abs()).ok()
    } else {
        let factor = Decimal::from(10u64.checked_pow(expo as u32)?);
        Decimal::from(mantissa).checked_mul(factor)
    }
}
