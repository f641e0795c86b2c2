/*
[INPUT]:  Pyth price feed + PumpPortal token feed (two resilient connections), refresh requests
[OUTPUT]: Feed status and dashboard snapshots via `watch`, periodic summary logs
[POS]:    Data layer - live feed aggregation (subscriptions, board updates, refresh)
[UPDATE]: When changing subscriptions, status derivation, or refresh/summary semantics
*/

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pumpwatch_adapter::{
    CloseInfo, ConnectionStats, Connector, EventHandlers, PumpMessage, PumpRequest, PythMessage,
    PythRequest, ResilientSocket, TungsteniteConnector,
};

use crate::board::{BoardUpdate, DashboardSnapshot, TokenBoard};
use crate::config::DashboardConfig;

const SUMMARY_TOP_TOKENS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Price,
    Token,
}

impl FeedKind {
    pub const ALL: [FeedKind; 2] = [FeedKind::Price, FeedKind::Token];

    pub fn name(self) -> &'static str {
        match self {
            FeedKind::Price => "pyth",
            FeedKind::Token => "pumpportal",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Consumer-facing connection status, derived from connection callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug)]
enum FeedEvent {
    Opened(FeedKind),
    Message(FeedKind, Value),
    Closed(FeedKind, CloseInfo),
    Failed {
        feed: FeedKind,
        error: String,
        retryable: bool,
        stale: bool,
    },
}

impl FeedEvent {
    fn feed(&self) -> FeedKind {
        match self {
            FeedEvent::Opened(feed) | FeedEvent::Message(feed, _) | FeedEvent::Closed(feed, _) => *feed,
            FeedEvent::Failed { feed, .. } => *feed,
        }
    }
}

/// Status implied by a callback; errors only count while the feed is down.
fn derive_status(event: &FeedEvent, is_open: bool) -> Option<FeedStatus> {
    match event {
        FeedEvent::Opened(_) => Some(FeedStatus::Connected),
        FeedEvent::Closed(..) => Some(FeedStatus::Disconnected),
        FeedEvent::Failed { .. } if !is_open => Some(FeedStatus::Disconnected),
        FeedEvent::Failed { .. } | FeedEvent::Message(..) => None,
    }
}

#[derive(Debug)]
enum HubCommand {
    Refresh,
    Shutdown,
}

/// Callbacks only forward into the worker's channel; the worker owns all
/// reactions, including sends on the socket that raised the event.
fn feed_handlers(feed: FeedKind, events: mpsc::UnboundedSender<FeedEvent>) -> EventHandlers {
    let on_open = events.clone();
    let on_message = events.clone();
    let on_close = events.clone();
    EventHandlers::new()
        .on_open(move || {
            let _ = on_open.send(FeedEvent::Opened(feed));
        })
        .on_message(move |payload| {
            let _ = on_message.send(FeedEvent::Message(feed, payload));
        })
        .on_close(move |info| {
            let _ = on_close.send(FeedEvent::Closed(feed, info));
        })
        .on_error(move |err| {
            let _ = events.send(FeedEvent::Failed {
                feed,
                error: err.to_string(),
                retryable: err.is_retryable(),
                stale: err.is_liveness_failure(),
            });
        })
}

/// Live data hub: owns both feed connections and the worker that turns their
/// events into dashboard state.
#[derive(Debug)]
pub struct LiveDataHub {
    price_socket: ResilientSocket,
    token_socket: ResilientSocket,
    price_status: watch::Receiver<FeedStatus>,
    token_status: watch::Receiver<FeedStatus>,
    snapshot: watch::Receiver<DashboardSnapshot>,
    shutdown: CancellationToken,
    cmd_tx: mpsc::UnboundedSender<HubCommand>,
    worker_handle: Option<tokio::task::JoinHandle<()>>,
}

impl LiveDataHub {
    /// Connect both feeds over tokio-tungstenite.
    pub fn start(config: &DashboardConfig) -> anyhow::Result<Self> {
        Self::start_with_connector(config, Arc::new(TungsteniteConnector))
    }

    pub fn start_with_connector(
        config: &DashboardConfig,
        connector: Arc<dyn Connector>,
    ) -> anyhow::Result<Self> {
        config.validate().context("invalid dashboard config")?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let price_socket = ResilientSocket::with_connector(
            config.price_socket_config(),
            feed_handlers(FeedKind::Price, event_tx.clone()),
            connector.clone(),
        )
        .context("create price feed connection")?;
        let token_socket = ResilientSocket::with_connector(
            config.token_socket_config(),
            feed_handlers(FeedKind::Token, event_tx),
            connector,
        )
        .context("create token feed connection")?;

        let (price_status_tx, price_status) = watch::channel(FeedStatus::Connecting);
        let (token_status_tx, token_status) = watch::channel(FeedStatus::Connecting);
        let (snapshot_tx, snapshot) = watch::channel(DashboardSnapshot::default());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let worker = LiveDataWorker {
            price_socket: price_socket.clone(),
            token_socket: token_socket.clone(),
            feed_id: config.price_feed.feed_id.clone(),
            board: TokenBoard::new(config.board.settings()),
            events: event_rx,
            cmd_rx,
            price_status: price_status_tx,
            token_status: token_status_tx,
            snapshot: snapshot_tx,
            shutdown: shutdown.clone(),
            refresh_interval: config.schedule.refresh_interval(),
            summary_interval: config.schedule.summary_interval(),
        };
        let worker_handle = tokio::spawn(worker.run());

        info!(
            price_endpoint = %price_socket.endpoint(),
            token_endpoint = %token_socket.endpoint(),
            "live data hub starting"
        );
        price_socket.connect();
        token_socket.connect();

        Ok(Self {
            price_socket,
            token_socket,
            price_status,
            token_status,
            snapshot,
            shutdown,
            cmd_tx,
            worker_handle: Some(worker_handle),
        })
    }

    pub fn subscribe_status(&self, feed: FeedKind) -> watch::Receiver<FeedStatus> {
        match feed {
            FeedKind::Price => self.price_status.clone(),
            FeedKind::Token => self.token_status.clone(),
        }
    }

    pub fn status(&self, feed: FeedKind) -> FeedStatus {
        *self.subscribe_status(feed).borrow()
    }

    /// Latest dashboard state; the receiver always holds the newest snapshot.
    pub fn subscribe_snapshot(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot.clone()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn connection_stats(&self, feed: FeedKind) -> ConnectionStats {
        match feed {
            FeedKind::Price => self.price_socket.stats(),
            FeedKind::Token => self.token_socket.stats(),
        }
    }

    /// Reset every disconnected feed and re-price the board now.
    pub fn refresh(&self) {
        let _ = self.cmd_tx.send(HubCommand::Refresh);
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Trigger a graceful shutdown of the worker and both connections.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let _ = self.cmd_tx.send(HubCommand::Shutdown);
    }

    pub async fn shutdown_and_wait(&mut self) -> anyhow::Result<()> {
        self.shutdown();
        if let Some(handle) = self.worker_handle.take() {
            handle.await.context("join live data worker")?;
        }
        Ok(())
    }
}

impl Drop for LiveDataHub {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Debug)]
struct LiveDataWorker {
    price_socket: ResilientSocket,
    token_socket: ResilientSocket,
    feed_id: String,
    board: TokenBoard,
    events: mpsc::UnboundedReceiver<FeedEvent>,
    cmd_rx: mpsc::UnboundedReceiver<HubCommand>,
    price_status: watch::Sender<FeedStatus>,
    token_status: watch::Sender<FeedStatus>,
    snapshot: watch::Sender<DashboardSnapshot>,
    shutdown: CancellationToken,
    refresh_interval: Duration,
    summary_interval: Duration,
}

impl LiveDataWorker {
    async fn run(mut self) {
        let mut refresh = interval_at(Instant::now() + self.refresh_interval, self.refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summary = interval_at(Instant::now() + self.summary_interval, self.summary_interval);
        summary.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("live data hub shutdown requested");
                    break;
                }
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(HubCommand::Refresh) => self.refresh(true),
                        Some(HubCommand::Shutdown) | None => break,
                    }
                }
                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            warn!("feed connections stopped unexpectedly");
                            break;
                        }
                    }
                }
                _ = refresh.tick() => self.refresh(false),
                _ = summary.tick() => self.log_summary(),
            }
        }

        self.unsubscribe_all();
        self.price_socket.disconnect();
        self.token_socket.disconnect();
        self.price_status.send_replace(FeedStatus::Disconnected);
        self.token_status.send_replace(FeedStatus::Disconnected);
        info!("live data hub stopped");
    }

    fn socket(&self, feed: FeedKind) -> &ResilientSocket {
        match feed {
            FeedKind::Price => &self.price_socket,
            FeedKind::Token => &self.token_socket,
        }
    }

    fn status_tx(&self, feed: FeedKind) -> &watch::Sender<FeedStatus> {
        match feed {
            FeedKind::Price => &self.price_status,
            FeedKind::Token => &self.token_status,
        }
    }

    fn set_status(&self, feed: FeedKind, status: FeedStatus) {
        let previous = self.status_tx(feed).send_replace(status);
        if previous != status {
            info!(%feed, ?previous, ?status, "feed status changed");
        }
    }

    fn handle_event(&mut self, event: FeedEvent) {
        let feed = event.feed();
        if let Some(status) = derive_status(&event, self.socket(feed).is_open()) {
            self.set_status(feed, status);
        }

        match event {
            FeedEvent::Opened(feed) => self.subscribe_feed(feed),
            FeedEvent::Message(FeedKind::Price, payload) => self.handle_price_message(payload),
            FeedEvent::Message(FeedKind::Token, payload) => self.handle_token_message(payload),
            FeedEvent::Closed(feed, info) => {
                debug!(%feed, close = %info, "feed closed");
            }
            FeedEvent::Failed {
                feed,
                error,
                retryable,
                stale,
            } => {
                if !retryable {
                    warn!(%feed, %error, "feed gave up; waiting for refresh");
                } else if stale {
                    warn!(%feed, %error, "feed went quiet; reconnecting");
                } else {
                    debug!(%feed, %error, "feed error");
                }
            }
        }
    }

    fn subscribe_feed(&self, feed: FeedKind) {
        match feed {
            FeedKind::Price => {
                info!(feed_id = %self.feed_id, "subscribing to price feed");
                self.price_socket
                    .send_json(&PythRequest::subscribe(self.feed_id.clone()));
            }
            FeedKind::Token => {
                info!("subscribing to new tokens");
                self.token_socket.send_json(&PumpRequest::SubscribeNewToken);
                let keys = self.board.tracked_mints();
                if !keys.is_empty() {
                    info!(mints = keys.len(), "resubscribing to token trades");
                    self.token_socket
                        .send_json(&PumpRequest::SubscribeTokenTrade { keys });
                }
            }
        }
    }

    /// Written ahead of the close frame on each open socket.
    fn unsubscribe_all(&self) {
        if self.price_socket.is_open() {
            self.price_socket.send_json(&PythRequest::Unsubscribe {
                ids: vec![self.feed_id.clone()],
            });
        }
        let keys = self.board.tracked_mints();
        if self.token_socket.is_open() && !keys.is_empty() {
            self.token_socket
                .send_json(&PumpRequest::UnsubscribeTokenTrade { keys });
        }
    }

    fn handle_price_message(&mut self, payload: Value) {
        match PythMessage::from_value(payload) {
            PythMessage::PriceUpdate { price_feed } => {
                if !price_feed.matches(&self.feed_id) {
                    debug!(id = %price_feed.id, "price update for another feed");
                    return;
                }
                let Some(price) = price_feed.price.value() else {
                    debug!(id = %price_feed.id, "failed to parse price mantissa");
                    return;
                };
                debug!(
                    %price,
                    confidence = ?price_feed.price.confidence(),
                    published_at = ?price_feed.price.published_at(),
                    "sol price update"
                );
                self.board.record_sol_price(price, Utc::now());
                self.publish();
            }
            PythMessage::Response { status, error } => {
                if status == "success" {
                    debug!("price subscription acknowledged");
                } else {
                    warn!(%status, error = ?error, "price subscription rejected");
                }
            }
            PythMessage::Other => {}
        }
    }

    fn handle_token_message(&mut self, payload: Value) {
        match PumpMessage::from_value(payload) {
            PumpMessage::Trade(event) => {
                match self.board.apply_trade(&event, Utc::now()) {
                    BoardUpdate::Created { mint } => {
                        if let Some(token) = self.board.token(&mint) {
                            info!(%mint, symbol = %token.symbol, market_cap_sol = %token.current.market_cap_sol, "new token");
                        }
                        if self.token_socket.is_open() {
                            self.token_socket
                                .send_json(&PumpRequest::SubscribeTokenTrade { keys: vec![mint] });
                        }
                    }
                    BoardUpdate::Traded { mint, large: true } => {
                        info!(%mint, tx_type = ?event.tx_type, sol = ?event.sol_amount, "large transaction");
                    }
                    BoardUpdate::Traded { .. } | BoardUpdate::Ignored => {}
                }
                self.publish();
            }
            PumpMessage::Notice(text) => info!(notice = %text, "token feed notice"),
            PumpMessage::Other(value) => debug!(payload = %value, "unrecognized token feed message"),
        }
    }

    /// Manual refresh resets every disconnected feed; the periodic one only
    /// resumes feeds that gave up, leaving running backoff cycles alone.
    fn refresh(&mut self, manual: bool) {
        for feed in FeedKind::ALL {
            let status = *self.status_tx(feed).borrow();
            let socket = self.socket(feed);
            if status != FeedStatus::Disconnected {
                continue;
            }
            if !manual && socket.stats().should_reconnect {
                continue;
            }
            info!(%feed, manual, "resetting feed connection");
            socket.reset_connection();
            self.set_status(feed, FeedStatus::Connecting);
        }

        self.board.reprice();
        let pruned = self.board.prune_inactive(Utc::now());
        if !pruned.is_empty() {
            debug!(count = pruned.len(), "pruned inactive tokens");
            if self.token_socket.is_open() {
                self.token_socket
                    .send_json(&PumpRequest::UnsubscribeTokenTrade { keys: pruned });
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.board.snapshot(Utc::now()));
    }

    fn log_summary(&self) {
        let snapshot = self.snapshot.borrow();
        let price_stats = self.price_socket.stats();
        let token_stats = self.token_socket.stats();
        let pyth = *self.price_status.borrow();
        let pumpportal = *self.token_status.borrow();
        info!(
            sol_price = ?snapshot.sol_price,
            ?pyth,
            pyth_health = price_stats.health,
            pyth_queue = price_stats.queue.len,
            ?pumpportal,
            pumpportal_health = token_stats.health,
            pumpportal_queue = token_stats.queue.len,
            pumpportal_dropped = token_stats.dropped_messages,
            tracked_tokens = snapshot.tracked_tokens,
            large_buys = snapshot.large_buys.len(),
            large_sells = snapshot.large_sells.len(),
            "dashboard summary"
        );
        for (rank, token) in snapshot.tokens.iter().take(SUMMARY_TOP_TOKENS).enumerate() {
            info!(
                rank = rank + 1,
                symbol = %token.symbol,
                mint = %token.mint,
                market_cap_sol = %token.current.market_cap_sol,
                market_cap_usd = %token.current.market_cap_usd.round_dp(2),
                trend = ?token.market_cap_trend(),
                change_pct = ?token.market_cap_change_pct().map(|pct| pct.round_dp(2)),
                dev_balance = %token.current.dev_balance,
                "top token"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(retryable: bool) -> FeedEvent {
        FeedEvent::Failed {
            feed: FeedKind::Token,
            error: "boom".to_string(),
            retryable,
            stale: false,
        }
    }

    #[test]
    fn status_follows_callbacks() {
        assert_eq!(
            derive_status(&FeedEvent::Opened(FeedKind::Price), true),
            Some(FeedStatus::Connected)
        );
        assert_eq!(
            derive_status(
                &FeedEvent::Closed(FeedKind::Price, CloseInfo::new(Some(1006), "gone")),
                false
            ),
            Some(FeedStatus::Disconnected)
        );
        assert_eq!(
            derive_status(&FeedEvent::Message(FeedKind::Token, Value::Null), true),
            None
        );
    }

    #[test]
    fn errors_while_open_keep_status() {
        assert_eq!(derive_status(&failed(true), true), None);
        assert_eq!(derive_status(&failed(true), false), Some(FeedStatus::Disconnected));
        assert_eq!(derive_status(&failed(false), false), Some(FeedStatus::Disconnected));
    }

    #[test]
    fn feed_names() {
        assert_eq!(FeedKind::Price.to_string(), "pyth");
        assert_eq!(FeedKind::Token.to_string(), "pumpportal");
        assert_eq!(failed(true).feed(), FeedKind::Token);
    }
}
