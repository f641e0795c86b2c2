/*
[INPUT]:  Test scenarios needing a controllable transport and recorded callbacks
[OUTPUT]: MockConnector, MockPeer, Recorder and profile fixtures
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for pumpwatch-adapter tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pumpwatch_adapter::{
    CloseInfo, ConnectionProfile, Connector, EventHandlers, OutboundFrame, Result,
    SocketConfig, SocketError, TransportEvent, TransportLink,
};
use serde_json::Value;
use tokio::sync::mpsc;

pub const TEST_ENDPOINT: &str = "wss://feed.test/ws";
pub const BASE_INTERVAL: Duration = Duration::from_millis(1_000);

/// Far end of a mock transport: read what the connection wrote, inject
/// what the "server" sends.
#[derive(Debug)]
pub struct MockPeer {
    pub outbound: mpsc::Receiver<OutboundFrame>,
    pub inbound: mpsc::Sender<TransportEvent>,
}

impl MockPeer {
    pub async fn push_text(&self, text: impl Into<String>) {
        self.inbound
            .send(TransportEvent::Text(text.into()))
            .await
            .expect("connection dropped transport");
    }

    /// Drain whatever the connection wrote so far.
    pub fn written(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    Accept,
    Refuse,
    Hang,
}

#[derive(Debug)]
struct MockInner {
    attempts: AtomicUsize,
    mode: Mutex<MockMode>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

/// Connector whose transports are in-memory channel pairs.
#[derive(Debug, Clone)]
pub struct MockConnector {
    inner: Arc<MockInner>,
}

impl MockConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            inner: Arc::new(MockInner {
                attempts: AtomicUsize::new(0),
                mode: Mutex::new(MockMode::Accept),
                peers: peers_tx,
            }),
        };
        (connector, peers_rx)
    }

    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn set_mode(&self, mode: MockMode) {
        *self.inner.mode.lock().unwrap() = mode;
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _endpoint: &str) -> Result<TransportLink> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        let mode = *self.inner.mode.lock().unwrap();
        match mode {
            MockMode::Refuse => Err(SocketError::Connect("connection refused".to_string())),
            MockMode::Hang => std::future::pending().await,
            MockMode::Accept => {
                let (link, outbound, inbound) = TransportLink::pair();
                let _ = self.inner.peers.send(MockPeer { outbound, inbound });
                Ok(link)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Open,
    Message(Value),
    Close(CloseInfo),
    Error(String),
}

/// Collects every callback in invocation order.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Recorded>>>,
}

impl Recorder {
    pub fn handlers(&self) -> EventHandlers {
        let on_open = self.events.clone();
        let on_message = self.events.clone();
        let on_close = self.events.clone();
        let on_error = self.events.clone();
        EventHandlers::new()
            .on_open(move || on_open.lock().unwrap().push(Recorded::Open))
            .on_message(move |payload| on_message.lock().unwrap().push(Recorded::Message(payload)))
            .on_close(move |info| on_close.lock().unwrap().push(Recorded::Close(info)))
            .on_error(move |err| on_error.lock().unwrap().push(Recorded::Error(err.to_string())))
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn opens(&self) -> usize {
        self.count(|e| matches!(e, Recorded::Open))
    }

    pub fn messages(&self) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Message(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn closes(&self) -> Vec<CloseInfo> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Close(info) => Some(info),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Error(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Recorded) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

/// Profile with quiet heartbeats and an instant stabilization window.
pub fn quiet_profile() -> ConnectionProfile {
    ConnectionProfile::builder()
        .max_reconnect_attempts(5)
        .growth_factor(2.0)
        .max_backoff_delay(Duration::from_secs(30))
        .heartbeat_interval(Duration::from_secs(600))
        .heartbeat_timeout(Duration::from_secs(900))
        .pong_timeout(Duration::from_secs(10))
        .establishment_timeout(Duration::from_secs(10))
        .stabilization_delay(Duration::ZERO)
        .reset_delay(Duration::from_millis(500))
        .max_queue_size(100)
        .queue_drain_interval(Duration::from_millis(100))
        .max_batch_size(20)
        .build()
}

pub fn test_config(profile: ConnectionProfile) -> SocketConfig {
    SocketConfig::new(TEST_ENDPOINT, BASE_INTERVAL).with_profile(profile)
}

pub fn seq_of(values: &[Value]) -> Vec<u64> {
    values
        .iter()
        .map(|v| v["seq"].as_u64().expect("seq field"))
        .collect()
}
