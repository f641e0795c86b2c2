/*
[INPUT]:  Endpoint configuration, consumer callbacks, transport connector
[OUTPUT]: Resilient connections delivering queued inbound payloads
[POS]:    WebSocket layer - resilient real-time data streams
[UPDATE]: When adding lifecycle events or changing connection logic
*/

pub mod backoff;
pub mod connection;
pub mod handlers;
pub mod message;
pub mod profile;
pub mod queue;
pub mod transport;

pub use connection::{ConnectionState, ConnectionStats, Outbound, ResilientSocket};
pub use handlers::{ABNORMAL_CLOSURE, CloseInfo, EventHandlers, NORMAL_CLOSURE, STALE_CLOSURE};
pub use profile::{ConnectionProfile, ConnectionProfileBuilder, HeartbeatPayload, SocketConfig};
pub use queue::{MessageQueue, QueueStatus, QueuedMessage};
pub use transport::{Connector, OutboundFrame, TransportEvent, TransportLink, TungsteniteConnector};
