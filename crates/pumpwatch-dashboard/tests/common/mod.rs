/*
[INPUT]:  Live data hub scenarios needing scripted feed servers
[OUTPUT]: FeedConnector, FeedPeer and config fixtures
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for pumpwatch-dashboard tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pumpwatch_adapter::{
    CloseInfo, Connector, OutboundFrame, Result, SocketError, TransportEvent, TransportLink,
};
use pumpwatch_dashboard::DashboardConfig;
use pumpwatch_dashboard::config::ProfileOverrides;
use serde_json::{Value, json};
use tokio::sync::mpsc;

pub const PRICE_ENDPOINT: &str = "wss://price.test/ws";
pub const TOKEN_ENDPOINT: &str = "wss://tokens.test/api/data";
pub const FEED_ID: &str = "0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d";

/// Far end of one feed transport.
#[derive(Debug)]
pub struct FeedPeer {
    pub endpoint: String,
    pub outbound: mpsc::Receiver<OutboundFrame>,
    pub inbound: mpsc::Sender<TransportEvent>,
}

impl FeedPeer {
    pub async fn push_json(&self, value: Value) {
        self.inbound
            .send(TransportEvent::Text(value.to_string()))
            .await
            .expect("connection dropped transport");
    }

    pub async fn close(&self, code: u16, reason: &str) {
        self.inbound
            .send(TransportEvent::Closed(CloseInfo::new(Some(code), reason)))
            .await
            .expect("connection dropped transport");
    }

    /// Text frames written so far, parsed as JSON.
    pub fn sent_json(&mut self) -> Vec<Value> {
        self.written()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Text(text) => serde_json::from_str(&text).ok(),
                _ => None,
            })
            .collect()
    }

    pub fn written(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

#[derive(Debug)]
struct ConnectorInner {
    refused: Mutex<HashSet<String>>,
    peers: mpsc::UnboundedSender<FeedPeer>,
}

/// In-memory connector serving both feeds; endpoints can be refused.
#[derive(Debug, Clone)]
pub struct FeedConnector {
    inner: Arc<ConnectorInner>,
}

impl FeedConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FeedPeer>) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            inner: Arc::new(ConnectorInner {
                refused: Mutex::new(HashSet::new()),
                peers: peers_tx,
            }),
        };
        (connector, peers_rx)
    }

    pub fn refuse(&self, endpoint: &str, refused: bool) {
        let mut set = self.inner.refused.lock().unwrap();
        if refused {
            set.insert(endpoint.to_string());
        } else {
            set.remove(endpoint);
        }
    }
}

#[async_trait]
impl Connector for FeedConnector {
    async fn connect(&self, endpoint: &str) -> Result<TransportLink> {
        if self.inner.refused.lock().unwrap().contains(endpoint) {
            return Err(SocketError::Connect("connection refused".to_string()));
        }
        let (link, outbound, inbound) = TransportLink::pair();
        let _ = self.inner.peers.send(FeedPeer {
            endpoint: endpoint.to_string(),
            outbound,
            inbound,
        });
        Ok(link)
    }
}

/// Wait for the next transports and split them by feed.
pub fn take_peers(peers: &mut mpsc::UnboundedReceiver<FeedPeer>) -> (Option<FeedPeer>, Option<FeedPeer>) {
    let mut price = None;
    let mut token = None;
    while let Ok(peer) = peers.try_recv() {
        if peer.endpoint == PRICE_ENDPOINT {
            price = Some(peer);
        } else {
            token = Some(peer);
        }
    }
    (price, token)
}

fn quiet_overrides() -> ProfileOverrides {
    ProfileOverrides {
        max_reconnect_attempts: Some(3),
        growth_factor: Some(2.0),
        heartbeat_interval_ms: Some(600_000),
        heartbeat_timeout_ms: Some(900_000),
        stabilization_delay_ms: Some(0),
        reset_delay_ms: Some(500),
        queue_drain_interval_ms: Some(50),
        ..ProfileOverrides::default()
    }
}

/// Both feeds on test endpoints with a 1s reconnect base and schedules far
/// enough out that only explicit refreshes run.
pub fn test_config() -> DashboardConfig {
    let mut config = DashboardConfig::default();
    config.price_feed.endpoint = PRICE_ENDPOINT.to_string();
    config.price_feed.feed_id = FEED_ID.to_string();
    config.price_feed.reconnect_interval_ms = 1_000;
    config.price_feed.profile = quiet_overrides();
    config.token_feed.endpoint = TOKEN_ENDPOINT.to_string();
    config.token_feed.reconnect_interval_ms = 1_000;
    config.token_feed.profile = quiet_overrides();
    config.schedule.refresh_interval_secs = 3_600;
    config.schedule.summary_interval_secs = 3_600;
    config
}

pub fn create_event(mint: &str, symbol: &str, market_cap_sol: f64) -> Value {
    json!({
        "signature": format!("sig-{mint}"),
        "mint": mint,
        "traderPublicKey": "Dev111",
        "txType": "create",
        "initialBuy": 50_000_000,
        "solAmount": 1.5,
        "vTokensInBondingCurve": 1_000_000_000,
        "vSolInBondingCurve": 30,
        "marketCapSol": market_cap_sol,
        "name": format!("{symbol} token"),
        "symbol": symbol
    })
}

/// Pyth update for `FEED_ID` with an expo of -8.
pub fn price_update(mantissa: &str) -> Value {
    json!({
        "type": "price_update",
        "price_feed": {
            "id": FEED_ID.trim_start_matches("0x"),
            "price": {
                "price": mantissa,
                "conf": "1000000",
                "expo": -8,
                "publish_time": 1_700_000_000
            }
        }
    })
}
