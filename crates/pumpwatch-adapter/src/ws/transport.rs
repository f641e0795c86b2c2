/*
[INPUT]:  Endpoint URL
[OUTPUT]: TransportLink (outbound frame sender + inbound event receiver) backed by a pump task
[POS]:    WebSocket layer - raw transport, swappable for tests
[UPDATE]: When changing frame mapping or the tungstenite pump loop
*/

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::debug;

use crate::error::{Result, SocketError};
use crate::ws::handlers::{ABNORMAL_CLOSURE, CloseInfo, NORMAL_CLOSURE};

const LINK_CHANNEL_CAPACITY: usize = 1_024;

/// Frames the connection writes to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Ping(Vec<u8>),
    Close(CloseInfo),
}

/// What the transport reports back to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    Binary(Vec<u8>),
    Pong,
    Error(String),
    Closed(CloseInfo),
}

/// An open transport: write through `outbound`, read from `inbound`.
///
/// Dropping `outbound` asks the transport to close; after a `Closed` event
/// nothing else arrives on `inbound`.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::Sender<OutboundFrame>,
    pub inbound: mpsc::Receiver<TransportEvent>,
}

impl TransportLink {
    /// Create a link plus the far ends of both channels.
    pub fn pair() -> (
        Self,
        mpsc::Receiver<OutboundFrame>,
        mpsc::Sender<TransportEvent>,
    ) {
        let (outbound_tx, outbound_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        (
            Self {
                outbound: outbound_tx,
                inbound: inbound_rx,
            },
            outbound_rx,
            inbound_tx,
        )
    }
}

/// Opens transports. Resolving the future is the transport-level open event.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, endpoint: &str) -> Result<TransportLink>;
}

/// Production connector over tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, endpoint: &str) -> Result<TransportLink> {
        let (ws_stream, _response) = connect_async(endpoint)
            .await
            .map_err(|err| SocketError::Connect(err.to_string()))?;
        let (mut write, mut read) = ws_stream.split();
        let (link, mut outbound_rx, inbound_tx) = TransportLink::pair();
        let endpoint = endpoint.to_string();

        tokio::spawn(async move {
            let close = loop {
                tokio::select! {
                    outbound = outbound_rx.recv() => {
                        match outbound {
                            Some(OutboundFrame::Close(info)) => {
                                let frame = CloseFrame {
                                    code: CloseCode::from(info.code.unwrap_or(NORMAL_CLOSURE)),
                                    reason: info.reason.clone().into(),
                                };
                                let _ = write.send(WsMessage::Close(Some(frame))).await;
                                break info;
                            }
                            Some(frame) => {
                                if let Err(err) = write.send(to_ws_message(frame)).await {
                                    let _ = inbound_tx.send(TransportEvent::Error(err.to_string())).await;
                                    break CloseInfo::new(Some(ABNORMAL_CLOSURE), "write failed");
                                }
                            }
                            None => {
                                let _ = write.send(WsMessage::Close(None)).await;
                                break CloseInfo::new(Some(NORMAL_CLOSURE), "transport released");
                            }
                        }
                    }
                    incoming = read.next() => {
                        let event = match incoming {
                            Some(Ok(WsMessage::Text(text))) => TransportEvent::Text(text.to_string()),
                            Some(Ok(WsMessage::Binary(bytes))) => TransportEvent::Binary(bytes.to_vec()),
                            Some(Ok(WsMessage::Pong(_))) => TransportEvent::Pong,
                            Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Frame(_))) => continue,
                            Some(Ok(WsMessage::Close(frame))) => {
                                let _ = write.send(WsMessage::Close(None)).await;
                                break match frame {
                                    Some(frame) => CloseInfo::new(Some(u16::from(frame.code)), frame.reason.to_string()),
                                    None => CloseInfo::new(None, "closed by peer"),
                                };
                            }
                            Some(Err(err)) => {
                                let _ = inbound_tx.send(TransportEvent::Error(err.to_string())).await;
                                break CloseInfo::new(Some(ABNORMAL_CLOSURE), err.to_string());
                            }
                            None => break CloseInfo::new(Some(ABNORMAL_CLOSURE), "stream ended"),
                        };
                        if inbound_tx.send(event).await.is_err() {
                            break CloseInfo::new(Some(NORMAL_CLOSURE), "connection released transport");
                        }
                    }
                }
            };

            debug!(%endpoint, close = %close, "ws transport pump finished");
            let _ = inbound_tx.send(TransportEvent::Closed(close)).await;
        });

        Ok(link)
    }
}

fn to_ws_message(frame: OutboundFrame) -> WsMessage {
    match frame {
        OutboundFrame::Text(text) => WsMessage::Text(text.into()),
        OutboundFrame::Ping(bytes) => WsMessage::Ping(bytes.into()),
        OutboundFrame::Close(info) => WsMessage::Close(Some(CloseFrame {
            code: CloseCode::from(info.code.unwrap_or(NORMAL_CLOSURE)),
            reason: info.reason.into(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_frames_map_to_ws_messages() {
        assert_eq!(
            to_ws_message(OutboundFrame::Text("{\"a\":1}".to_string())),
            WsMessage::Text("{\"a\":1}".into())
        );
        assert!(matches!(
            to_ws_message(OutboundFrame::Ping(vec![1, 2])),
            WsMessage::Ping(_)
        ));
        match to_ws_message(OutboundFrame::Close(CloseInfo::new(Some(4000), "stale"))) {
            WsMessage::Close(Some(frame)) => {
                assert_eq!(u16::from(frame.code), 4000);
                assert_eq!(frame.reason.as_str(), "stale");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn pair_wires_both_directions() {
        let (mut link, mut outbound_rx, inbound_tx) = TransportLink::pair();

        link.outbound
            .send(OutboundFrame::Text("hello".to_string()))
            .await
            .unwrap();
        assert_eq!(
            outbound_rx.recv().await,
            Some(OutboundFrame::Text("hello".to_string()))
        );

        inbound_tx.send(TransportEvent::Pong).await.unwrap();
        assert_eq!(link.inbound.recv().await, Some(TransportEvent::Pong));
    }
}
