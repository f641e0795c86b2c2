/*
[INPUT]:  SocketConfig + EventHandlers + Connector, commands from ResilientSocket handles
[OUTPUT]: Callbacks in arrival order, lock-free status for diagnostics
[POS]:    WebSocket layer - resilient connection (reconnect, heartbeat, inbound queue)
[UPDATE]: When changing lifecycle transitions, timers, or self-healing rules
*/

//! Resilient WebSocket connection.
//!
//! Each connection is one tokio task that owns the transport, the inbound
//! queue, the counters and every timer. [`ResilientSocket`] handles only post
//! commands to it, so callbacks and timers of one connection never overlap.
//!
//! ```rust,no_run
//! use pumpwatch_adapter::{ConnectionProfile, EventHandlers, ResilientSocket, SocketConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> pumpwatch_adapter::Result<()> {
//! let config = SocketConfig::new("wss://hermes.pyth.network/ws", Duration::from_secs(10))
//!     .with_profile(ConnectionProfile::price_feed());
//! let handlers = EventHandlers::new().on_message(|payload| println!("{payload}"));
//!
//! let socket = ResilientSocket::new(config, handlers)?;
//! socket.connect();
//! socket.send(serde_json::json!({ "type": "subscribe", "ids": ["0xef0d"] }));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::error::{Result, SocketError};
use crate::ws::backoff::{backoff_delay, dampened_attempts, with_jitter};
use crate::ws::handlers::{ABNORMAL_CLOSURE, CloseInfo, EventHandlers, NORMAL_CLOSURE, STALE_CLOSURE};
use crate::ws::message::{decode_binary, decode_text};
use crate::ws::profile::{ConnectionProfile, HeartbeatPayload, SocketConfig};
use crate::ws::queue::{MessageQueue, QueueStatus};
use crate::ws::transport::{Connector, OutboundFrame, TransportEvent, TransportLink, TungsteniteConnector};

const HEALTH_MAX: u8 = 100;
const HEALTH_GAIN_MESSAGE: u8 = 2;
const HEALTH_GAIN_PONG: u8 = 1;
const HEALTH_PENALTY_TRANSPORT: u8 = 25;
const HEALTH_PENALTY_STALE: u8 = 20;
const HEALTH_PENALTY_PROTOCOL: u8 = 5;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
    Disconnected = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Closing,
            4 => Self::Disconnected,
            _ => Self::Idle,
        }
    }
}

/// Payload accepted by [`ResilientSocket::send`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Json(Value),
    Text(String),
}

impl From<Value> for Outbound {
    fn from(value: Value) -> Self {
        Outbound::Json(value)
    }
}

impl From<String> for Outbound {
    fn from(text: String) -> Self {
        Outbound::Text(text)
    }
}

impl From<&str> for Outbound {
    fn from(text: &str) -> Self {
        Outbound::Text(text.to_string())
    }
}

/// Point-in-time diagnostics for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    pub state: ConnectionState,
    pub health: u8,
    pub should_reconnect: bool,
    pub reconnect_attempts: u32,
    pub consecutive_errors: u32,
    pub queue: QueueStatus,
    pub dropped_messages: u64,
    pub transports_opened: u64,
}

#[derive(Debug)]
enum Command {
    Connect,
    Send(Outbound),
    SendFailed(String),
    Disconnect,
    Reset,
}

#[derive(Debug)]
struct SharedStatus {
    state: AtomicU8,
    health: AtomicU8,
    should_reconnect: AtomicBool,
    reconnect_attempts: AtomicU32,
    consecutive_errors: AtomicU32,
    queue_len: AtomicUsize,
    draining: AtomicBool,
    dropped_messages: AtomicU64,
    transports_opened: AtomicU64,
}

impl SharedStatus {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Idle as u8),
            health: AtomicU8::new(0),
            should_reconnect: AtomicBool::new(true),
            reconnect_attempts: AtomicU32::new(0),
            consecutive_errors: AtomicU32::new(0),
            queue_len: AtomicUsize::new(0),
            draining: AtomicBool::new(false),
            dropped_messages: AtomicU64::new(0),
            transports_opened: AtomicU64::new(0),
        }
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// Handle to a resilient connection. Cheap to clone; every clone drives the
/// same connection. Dropping the last handle shuts the connection down.
///
/// No operation on the handle fails: problems become state transitions and
/// callbacks.
#[derive(Debug, Clone)]
pub struct ResilientSocket {
    endpoint: Arc<str>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    status: Arc<SharedStatus>,
}

impl ResilientSocket {
    /// Create a connection over tokio-tungstenite. Does not connect yet.
    pub fn new(config: SocketConfig, handlers: EventHandlers) -> Result<Self> {
        Self::with_connector(config, handlers, Arc::new(TungsteniteConnector))
    }

    /// Create a connection over a custom transport.
    pub fn with_connector(
        config: SocketConfig,
        handlers: EventHandlers,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SocketError::Config(
                "ResilientSocket must be created inside a Tokio runtime".to_string(),
            ));
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let status = Arc::new(SharedStatus::new());
        let endpoint: Arc<str> = Arc::from(config.endpoint.as_str());

        let actor = ConnectionActor::new(config, handlers, connector, cmd_rx, status.clone());
        tokio::spawn(actor.run());

        Ok(Self {
            endpoint,
            cmd_tx,
            status,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Open the connection; no-op while connecting or open.
    pub fn connect(&self) {
        self.dispatch(Command::Connect);
    }

    /// Send a JSON value or raw text. Only succeeds while open; otherwise
    /// the failure is counted and a reconnect is attempted.
    pub fn send(&self, payload: impl Into<Outbound>) {
        self.dispatch(Command::Send(payload.into()));
    }

    /// Serialize and send any serializable value.
    pub fn send_json<T: Serialize + ?Sized>(&self, payload: &T) {
        match serde_json::to_string(payload) {
            Ok(text) => self.dispatch(Command::Send(Outbound::Text(text))),
            Err(err) => {
                debug!(endpoint = %self.endpoint, error = %err, "ws payload serialization failed");
                self.dispatch(Command::SendFailed(err.to_string()));
            }
        }
    }

    /// Close for good: no reconnects, every timer cancelled.
    pub fn disconnect(&self) {
        self.dispatch(Command::Disconnect);
    }

    /// Disconnect, then connect again after the profile's reset delay.
    /// Also resumes a connection that gave up reconnecting.
    pub fn reset_connection(&self) {
        self.dispatch(Command::Reset);
    }

    pub fn state(&self) -> ConnectionState {
        self.status.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// 0–100 heuristic; always 0 when not open.
    pub fn connection_health(&self) -> u8 {
        if self.is_open() {
            self.status.health.load(Ordering::Acquire)
        } else {
            0
        }
    }

    pub fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            len: self.status.queue_len.load(Ordering::Acquire),
            draining: self.status.draining.load(Ordering::Acquire),
        }
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            state: self.state(),
            health: self.connection_health(),
            should_reconnect: self.status.should_reconnect.load(Ordering::Acquire),
            reconnect_attempts: self.status.reconnect_attempts.load(Ordering::Acquire),
            consecutive_errors: self.status.consecutive_errors.load(Ordering::Acquire),
            queue: self.queue_status(),
            dropped_messages: self.status.dropped_messages.load(Ordering::Acquire),
            transports_opened: self.status.transports_opened.load(Ordering::Acquire),
        }
    }

    fn dispatch(&self, command: Command) {
        if self.cmd_tx.send(command).is_err() {
            debug!(endpoint = %self.endpoint, "ws connection task already stopped");
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Timers {
    reconnect: Option<Instant>,
    establish: Option<Instant>,
    stabilize: Option<Instant>,
    heartbeat: Option<Instant>,
    pong: Option<Instant>,
    drain: Option<Instant>,
}

impl Timers {
    /// Timers that only make sense while a transport is up.
    fn cancel_session(&mut self) {
        self.establish = None;
        self.stabilize = None;
        self.heartbeat = None;
        self.pong = None;
        self.drain = None;
    }
}

type PendingConnect = BoxFuture<'static, Result<TransportLink>>;

struct ConnectionActor {
    endpoint: String,
    base_interval: Duration,
    profile: ConnectionProfile,
    handlers: EventHandlers,
    connector: Arc<dyn Connector>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    status: Arc<SharedStatus>,

    state: ConnectionState,
    should_reconnect: bool,
    reconnect_attempts: u32,
    consecutive_errors: u32,
    health: u8,
    last_message_at: Option<Instant>,
    last_pong_at: Option<Instant>,
    ping_awaiting_response: bool,
    close_latched: bool,
    transports_opened: u64,

    pending_connect: Option<PendingConnect>,
    transport: Option<TransportLink>,
    queue: MessageQueue,
    draining: bool,
    timers: Timers,
}

impl ConnectionActor {
    fn new(
        config: SocketConfig,
        handlers: EventHandlers,
        connector: Arc<dyn Connector>,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        status: Arc<SharedStatus>,
    ) -> Self {
        let queue = MessageQueue::new(config.profile.max_queue_size);
        Self {
            endpoint: config.endpoint,
            base_interval: config.base_reconnect_interval,
            profile: config.profile,
            handlers,
            connector,
            cmd_rx,
            status,
            state: ConnectionState::Idle,
            should_reconnect: true,
            reconnect_attempts: 0,
            consecutive_errors: 0,
            health: 0,
            last_message_at: None,
            last_pong_at: None,
            ping_awaiting_response: false,
            close_latched: true,
            transports_opened: 0,
            pending_connect: None,
            transport: None,
            queue,
            draining: false,
            timers: Timers::default(),
        }
    }

    async fn run(mut self) {
        loop {
            let timers = self.timers;
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => {
                            debug!(endpoint = %self.endpoint, "all ws handles dropped; shutting down");
                            self.disconnect("handle dropped");
                            self.publish();
                            break;
                        }
                    }
                }
                result = poll_pending(&mut self.pending_connect) => {
                    self.pending_connect = None;
                    self.on_connect_result(result);
                }
                event = recv_inbound(&mut self.transport) => {
                    self.on_transport_event(event);
                }
                _ = sleep_opt(timers.reconnect) => {
                    self.timers.reconnect = None;
                    debug!(endpoint = %self.endpoint, attempt = self.reconnect_attempts, "ws reconnect timer fired");
                    self.start_connect();
                }
                _ = sleep_opt(timers.establish) => {
                    self.timers.establish = None;
                    self.on_establishment_timeout();
                }
                _ = sleep_opt(timers.stabilize) => {
                    self.timers.stabilize = None;
                    self.on_stabilized();
                }
                _ = sleep_opt(timers.heartbeat) => {
                    self.on_heartbeat_tick();
                }
                _ = sleep_opt(timers.pong) => {
                    self.timers.pong = None;
                    self.on_pong_timeout();
                }
                _ = sleep_opt(timers.drain) => {
                    self.on_drain_tick();
                }
            }
            self.publish();
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => {
                self.should_reconnect = true;
                self.start_connect();
            }
            Command::Send(payload) => self.send(payload),
            Command::SendFailed(reason) => {
                let err = SocketError::SendFailed(reason);
                if self.record_error(&err, HEALTH_PENALTY_PROTOCOL) {
                    self.force_reconnect("too many consecutive errors");
                }
            }
            Command::Disconnect => self.disconnect("client disconnect"),
            Command::Reset => self.reset_connection(),
        }
    }

    fn start_connect(&mut self) {
        if self.pending_connect.is_some() || self.transport.is_some() {
            debug!(endpoint = %self.endpoint, state = ?self.state, "ws connect ignored; already connecting or open");
            return;
        }

        self.state = ConnectionState::Connecting;
        self.close_latched = false;
        self.timers.reconnect = None;
        self.timers.establish = Some(Instant::now() + self.profile.establishment_timeout);

        let connector = self.connector.clone();
        let endpoint = self.endpoint.clone();
        self.pending_connect = Some(Box::pin(async move { connector.connect(&endpoint).await }));

        info!(endpoint = %self.endpoint, attempt = self.reconnect_attempts, "ws connecting");
    }

    fn on_connect_result(&mut self, result: Result<TransportLink>) {
        match result {
            Ok(link) => {
                let now = Instant::now();
                self.timers.establish = None;
                self.transport = Some(link);
                self.transports_opened += 1;
                self.reconnect_attempts = 0;
                self.consecutive_errors = 0;
                self.health = HEALTH_MAX;
                self.last_pong_at = Some(now);
                self.ping_awaiting_response = false;
                self.timers.stabilize = Some(now + self.profile.stabilization_delay);
                debug!(endpoint = %self.endpoint, "ws transport open; stabilizing");
            }
            Err(err) => {
                warn!(endpoint = %self.endpoint, error = %err, "ws connect failed");
                self.fail_connect(err);
            }
        }
    }

    fn on_establishment_timeout(&mut self) {
        if self.pending_connect.take().is_none() {
            return;
        }
        let err = SocketError::EstablishmentTimeout {
            after: self.profile.establishment_timeout,
        };
        warn!(endpoint = %self.endpoint, error = %err, "ws connect timed out");
        self.fail_connect(err);
    }

    /// A failed attempt never opened a transport, so it only counts toward
    /// the error budget; backoff handles the retry.
    fn fail_connect(&mut self, err: SocketError) {
        let info = CloseInfo::new(Some(ABNORMAL_CLOSURE), err.to_string());
        self.handlers.emit_error(&err);
        self.record_error(&err, HEALTH_PENALTY_TRANSPORT);
        self.handle_close(info);
    }

    fn on_stabilized(&mut self) {
        let Some(link) = &self.transport else {
            return;
        };
        if link.outbound.is_closed() {
            self.transport = None;
            self.handle_close(CloseInfo::new(
                Some(ABNORMAL_CLOSURE),
                "closed during stabilization",
            ));
            return;
        }

        let now = Instant::now();
        self.state = ConnectionState::Open;
        self.timers.heartbeat = Some(now + self.profile.heartbeat_interval);
        self.timers.drain = Some(now + self.profile.queue_drain_interval);
        self.publish();

        info!(endpoint = %self.endpoint, "ws connected");
        self.handlers.emit_open();
    }

    fn on_transport_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Text(text)) => self.on_inbound(Ok(decode_text(text))),
            Some(TransportEvent::Binary(bytes)) => self.on_inbound(decode_binary(bytes)),
            Some(TransportEvent::Pong) => {
                self.mark_alive(Instant::now());
                self.health = self.health.saturating_add(HEALTH_GAIN_PONG).min(HEALTH_MAX);
            }
            Some(TransportEvent::Error(reason)) => {
                let err = SocketError::Transport(reason);
                warn!(endpoint = %self.endpoint, error = %err, "ws transport error");
                self.handlers.emit_error(&err);
                if self.record_error(&err, HEALTH_PENALTY_TRANSPORT) {
                    self.force_reconnect("too many consecutive errors");
                }
            }
            Some(TransportEvent::Closed(info)) => {
                self.transport = None;
                self.handle_close(info);
            }
            None => {
                self.transport = None;
                self.handle_close(CloseInfo::new(Some(ABNORMAL_CLOSURE), "transport vanished"));
            }
        }
    }

    fn on_inbound(&mut self, prepared: Result<Value>) {
        let now = Instant::now();
        self.mark_alive(now);
        self.last_message_at = Some(now);

        match prepared {
            Ok(payload) => {
                self.health = self.health.saturating_add(HEALTH_GAIN_MESSAGE).min(HEALTH_MAX);
                self.consecutive_errors = 0;
                let dropped = self.queue.push(payload, now);
                if dropped > 0 {
                    warn!(
                        endpoint = %self.endpoint,
                        dropped,
                        queue_len = self.queue.len(),
                        oldest_wait_ms = self
                            .queue
                            .oldest_age(now)
                            .map(|age| age.as_millis() as u64),
                        "ws inbound queue full; dropped oldest messages"
                    );
                }
            }
            Err(err) => {
                debug!(endpoint = %self.endpoint, error = %err, "ws inbound frame rejected");
                if self.record_error(&err, HEALTH_PENALTY_PROTOCOL) {
                    self.force_reconnect("too many consecutive errors");
                }
            }
        }
    }

    fn mark_alive(&mut self, now: Instant) {
        self.last_pong_at = Some(now);
        self.ping_awaiting_response = false;
        self.timers.pong = None;
    }

    fn on_heartbeat_tick(&mut self) {
        let now = Instant::now();
        self.timers.heartbeat = Some(now + self.profile.heartbeat_interval);
        if self.state != ConnectionState::Open {
            return;
        }

        let silence = self
            .last_pong_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        if silence > self.profile.heartbeat_timeout {
            let err = SocketError::HeartbeatTimeout { after: silence };
            warn!(endpoint = %self.endpoint, silence_ms = silence.as_millis() as u64, "ws connection stale");
            self.health = self.health.saturating_sub(HEALTH_PENALTY_STALE);
            self.handlers.emit_error(&err);
            self.force_reconnect("connection stale");
            return;
        }

        if self.ping_awaiting_response {
            return;
        }

        let frame = match &self.profile.heartbeat_payload {
            HeartbeatPayload::Ping => OutboundFrame::Ping(Vec::new()),
            HeartbeatPayload::Text(text) => OutboundFrame::Text(text.clone()),
        };
        if let Err(err) = self.write(frame) {
            if self.record_error(&err, HEALTH_PENALTY_PROTOCOL) {
                self.force_reconnect("too many consecutive errors");
            }
            return;
        }

        self.ping_awaiting_response = true;
        self.timers.pong = Some(now + self.profile.pong_timeout);
        debug!(endpoint = %self.endpoint, "ws heartbeat sent");
    }

    fn on_pong_timeout(&mut self) {
        if !self.ping_awaiting_response || self.state != ConnectionState::Open {
            return;
        }
        let err = SocketError::HeartbeatTimeout {
            after: self.profile.pong_timeout,
        };
        warn!(endpoint = %self.endpoint, error = %err, "ws heartbeat unanswered");
        self.health = self.health.saturating_sub(HEALTH_PENALTY_STALE);
        self.handlers.emit_error(&err);
        self.force_reconnect("heartbeat unanswered");
    }

    fn on_drain_tick(&mut self) {
        self.timers.drain = Some(Instant::now() + self.profile.queue_drain_interval);
        if self.draining || self.state != ConnectionState::Open {
            return;
        }

        let count = self
            .queue
            .batch_size(self.profile.drain_fraction, self.profile.max_batch_size);
        if count == 0 {
            return;
        }

        let batch = self.queue.pop_batch(count);
        self.draining = true;
        self.publish();
        for message in batch {
            self.handlers.emit_message(message.payload);
        }
        self.draining = false;
    }

    fn send(&mut self, payload: Outbound) {
        if self.state != ConnectionState::Open || self.transport.is_none() {
            let err = SocketError::NotOpen;
            warn!(endpoint = %self.endpoint, state = ?self.state, "ws send while not open; reconnecting");
            self.record_error(&err, 0);
            self.schedule_reconnect();
            return;
        }

        let text = match payload {
            Outbound::Text(text) => text,
            Outbound::Json(value) => match serde_json::to_string(&value) {
                Ok(text) => text,
                Err(err) => {
                    let err = SocketError::Serialization(err);
                    if self.record_error(&err, HEALTH_PENALTY_PROTOCOL) {
                        self.force_reconnect("too many consecutive errors");
                    }
                    return;
                }
            },
        };

        if let Err(err) = self.write(OutboundFrame::Text(text)) {
            warn!(endpoint = %self.endpoint, error = %err, "ws send failed");
            if self.record_error(&err, HEALTH_PENALTY_PROTOCOL) {
                self.force_reconnect("too many consecutive errors");
            }
        }
    }

    fn write(&self, frame: OutboundFrame) -> Result<()> {
        let link = self.transport.as_ref().ok_or(SocketError::NotOpen)?;
        link.outbound
            .try_send(frame)
            .map_err(|err| SocketError::SendFailed(err.to_string()))
    }

    /// Count an error; returns true when the consecutive-error budget is spent.
    fn record_error(&mut self, err: &SocketError, penalty: u8) -> bool {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.health = self.health.saturating_sub(penalty);
        debug!(
            endpoint = %self.endpoint,
            error = %err,
            consecutive_errors = self.consecutive_errors,
            "ws error recorded"
        );
        self.consecutive_errors > self.profile.max_consecutive_errors
    }

    /// Tear down a live but unhealthy transport and go through the normal
    /// failure path (close callback, backoff reconnect).
    fn force_reconnect(&mut self, reason: &str) {
        warn!(endpoint = %self.endpoint, reason, "ws forcing reconnect");
        let info = CloseInfo::new(Some(STALE_CLOSURE), reason);
        self.release_transport(&info);
        self.handle_close(info);
    }

    /// Single-fire close handling for the current transport.
    fn handle_close(&mut self, info: CloseInfo) {
        if self.close_latched {
            return;
        }
        self.close_latched = true;

        self.transport = None;
        self.pending_connect = None;
        self.timers.cancel_session();
        self.ping_awaiting_response = false;
        self.health = 0;
        self.state = ConnectionState::Disconnected;
        self.publish();

        if info.is_normal() {
            info!(endpoint = %self.endpoint, close = %info, "ws disconnected");
        } else {
            warn!(endpoint = %self.endpoint, close = %info, "ws connection lost");
        }
        self.handlers.emit_close(info);

        // disconnect() and reset clear should_reconnect before closing; any
        // other close, including a server-sent 1000, is retried.
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if !self.should_reconnect {
            return;
        }
        if self.timers.reconnect.is_some() || self.pending_connect.is_some() || self.transport.is_some() {
            return;
        }

        if self.reconnect_attempts >= self.profile.max_reconnect_attempts {
            self.should_reconnect = false;
            let err = SocketError::Exhausted {
                attempts: self.reconnect_attempts,
            };
            warn!(
                endpoint = %self.endpoint,
                attempts = self.reconnect_attempts,
                "ws gave up reconnecting; reset required"
            );
            self.publish();
            self.handlers.emit_error(&err);
            return;
        }

        let delay = with_jitter(
            backoff_delay(
                self.base_interval,
                self.profile.growth_factor,
                self.reconnect_attempts,
                self.profile.max_backoff_delay,
            ),
            self.profile.jitter_ratio,
        );
        self.reconnect_attempts += 1;
        self.timers.reconnect = Some(Instant::now() + delay);
        info!(
            endpoint = %self.endpoint,
            attempt = self.reconnect_attempts,
            max_attempts = self.profile.max_reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "ws reconnect scheduled"
        );
    }

    fn disconnect(&mut self, reason: &str) {
        self.should_reconnect = false;
        self.timers = Timers::default();
        self.queue.clear();

        let info = CloseInfo::new(Some(NORMAL_CLOSURE), reason);
        self.release_transport(&info);
        if self.close_latched {
            self.state = match self.state {
                ConnectionState::Idle => ConnectionState::Idle,
                _ => ConnectionState::Disconnected,
            };
        } else {
            self.handle_close(info);
        }
    }

    fn reset_connection(&mut self) {
        let attempts = dampened_attempts(self.reconnect_attempts, self.profile.max_reconnect_attempts);
        info!(
            endpoint = %self.endpoint,
            previous_attempts = self.reconnect_attempts,
            attempts,
            "ws reset requested"
        );

        self.disconnect("connection reset");
        self.should_reconnect = true;
        self.reconnect_attempts = attempts;
        self.timers.reconnect = Some(Instant::now() + self.profile.reset_delay);
    }

    /// Ask the transport to close and drop our end of it.
    fn release_transport(&mut self, info: &CloseInfo) {
        self.pending_connect = None;
        if let Some(link) = self.transport.take() {
            self.state = ConnectionState::Closing;
            self.publish();
            let _ = link.outbound.try_send(OutboundFrame::Close(info.clone()));
        }
    }

    fn publish(&self) {
        let status = &self.status;
        status.state.store(self.state as u8, Ordering::Release);
        status.health.store(self.health, Ordering::Release);
        status.should_reconnect.store(self.should_reconnect, Ordering::Release);
        status.reconnect_attempts.store(self.reconnect_attempts, Ordering::Release);
        status.consecutive_errors.store(self.consecutive_errors, Ordering::Release);
        status.queue_len.store(self.queue.len(), Ordering::Release);
        status.draining.store(self.draining, Ordering::Release);
        status.dropped_messages.store(self.queue.dropped_total(), Ordering::Release);
        status.transports_opened.store(self.transports_opened, Ordering::Release);
    }
}

async fn poll_pending(pending: &mut Option<PendingConnect>) -> Result<TransportLink> {
    match pending {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn recv_inbound(transport: &mut Option<TransportLink>) -> Option<TransportEvent> {
    match transport {
        Some(link) => link.inbound.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_roundtrips_through_u8() {
        for state in [
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closing,
            ConnectionState::Disconnected,
        ] {
            assert_eq!(ConnectionState::from_u8(state as u8), state);
        }
        assert_eq!(ConnectionState::from_u8(200), ConnectionState::Idle);
    }

    #[test]
    fn outbound_conversions() {
        assert_eq!(Outbound::from("ping"), Outbound::Text("ping".to_string()));
        assert_eq!(
            Outbound::from(serde_json::json!({"method": "subscribeNewToken"})),
            Outbound::Json(serde_json::json!({"method": "subscribeNewToken"}))
        );
    }

    #[test]
    fn new_outside_runtime_is_rejected() {
        let config = SocketConfig::new("wss://pumpportal.fun/api/data", Duration::from_secs(1));
        let result = ResilientSocket::new(config, EventHandlers::new());
        assert!(matches!(result, Err(SocketError::Config(_))));
    }

    #[tokio::test]
    async fn fresh_socket_is_idle_and_unhealthy() {
        let config = SocketConfig::new("wss://pumpportal.fun/api/data", Duration::from_secs(1));
        let socket = ResilientSocket::new(config, EventHandlers::new()).unwrap();
        assert_eq!(socket.state(), ConnectionState::Idle);
        assert!(!socket.is_open());
        assert_eq!(socket.connection_health(), 0);
        assert_eq!(socket.queue_status(), QueueStatus::default());
        assert_eq!(socket.endpoint(), "wss://pumpportal.fun/api/data");
    }
}
