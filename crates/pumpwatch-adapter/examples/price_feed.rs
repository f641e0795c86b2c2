/*
[INPUT]:  Pyth Hermes endpoint and the SOL/USD feed id
[OUTPUT]: SOL/USD prices printed as they arrive
[POS]:    Examples - resilient price stream
[UPDATE]: When the connection API or Pyth schema changes
*/

use std::time::Duration;

use pumpwatch_adapter::*;
use tokio::sync::mpsc;

const HERMES_ENDPOINT: &str = "wss://hermes.pyth.network/ws";
const SOL_USD_FEED: &str = "0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d";

/// Example: stream SOL/USD from Pyth for thirty seconds.
///
/// Callbacks only forward into a channel; the main task owns the handle and
/// subscribes every time the connection (re)opens.
#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Pyth SOL/USD Example ===\n");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let open_tx = tx.clone();
    let handlers = EventHandlers::new()
        .on_open(move || {
            let _ = open_tx.send(None);
        })
        .on_message(move |payload| {
            let _ = tx.send(Some(payload));
        })
        .on_close(|info| println!("closed: {info}"))
        .on_error(|err| println!("error: {err}"));

    let config = SocketConfig::new(HERMES_ENDPOINT, Duration::from_secs(10))
        .with_profile(ConnectionProfile::price_feed());
    let socket = ResilientSocket::new(config, handlers)?;
    socket.connect();

    let deadline = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = rx.recv() => match event {
                Some(None) => {
                    println!("✓ connected, subscribing");
                    socket.send_json(&PythRequest::subscribe(SOL_USD_FEED));
                }
                Some(Some(payload)) => {
                    if let PythMessage::PriceUpdate { price_feed } = PythMessage::from_value(payload) {
                        if let Some(price) = price_feed.price.value() {
                            println!("SOL/USD {price} (health {})", socket.connection_health());
                        }
                    }
                }
                None => break,
            },
        }
    }

    socket.disconnect();
    println!("\n✓ Price feed example complete");
    Ok(())
}
