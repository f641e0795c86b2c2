/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public pumpwatch adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod error;
pub mod feeds;
pub mod ws;

pub use error::{Result, SocketError};

// Re-export commonly used types from feeds
pub use feeds::{
    PriceFeed,
    PumpMessage,
    PumpRequest,
    PumpTradeEvent,
    PythMessage,
    PythPrice,
    PythRequest,
    TxType,
};

// Re-export commonly used types from ws
pub use ws::{
    ABNORMAL_CLOSURE,
    CloseInfo,
    ConnectionProfile,
    ConnectionState,
    ConnectionStats,
    Connector,
    EventHandlers,
    HeartbeatPayload,
    NORMAL_CLOSURE,
    Outbound,
    OutboundFrame,
    QueueStatus,
    ResilientSocket,
    STALE_CLOSURE,
    SocketConfig,
    TransportEvent,
    TransportLink,
    TungsteniteConnector,
};
