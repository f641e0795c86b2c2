/*
[INPUT]:  Error sources (transport, decoding, serialization, liveness, configuration)
[OUTPUT]: Structured error types with retry hints
[POS]:    Error handling layer - unified error type for the adapter crate
[UPDATE]: When adding new error sources or changing retry classification
*/

use std::time::Duration;

use thiserror::Error;

/// Main error type for the pumpwatch adapter
#[derive(Error, Debug)]
pub enum SocketError {
    /// Opening the transport failed
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Transport did not open within the establishment window
    #[error("Connection not established within {}ms", after.as_millis())]
    EstablishmentTimeout { after: Duration },

    /// Transport reported a failure while connected
    #[error("WebSocket error: {0}")]
    Transport(String),

    /// Inbound frame could not be turned into a payload
    #[error("Failed to decode inbound frame: {0}")]
    Decode(String),

    /// Outbound payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Send attempted while the connection is not open
    #[error("Connection is not open")]
    NotOpen,

    /// Outbound frame could not be handed to the transport
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Heartbeat went unanswered or the connection went stale
    #[error("No heartbeat response within {}ms", after.as_millis())]
    HeartbeatTimeout { after: Duration },

    /// Automatic reconnection gave up
    #[error("Gave up after {attempts} reconnect attempts")]
    Exhausted { attempts: u32 },

    /// Invalid endpoint
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SocketError {
    /// Check if automatic reconnection can recover from the error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SocketError::Connect(_)
                | SocketError::EstablishmentTimeout { .. }
                | SocketError::Transport(_)
                | SocketError::Decode(_)
                | SocketError::NotOpen
                | SocketError::SendFailed(_)
                | SocketError::HeartbeatTimeout { .. }
        )
    }

    /// Check if the error is a liveness failure (stalled but not closed)
    pub fn is_liveness_failure(&self) -> bool {
        matches!(
            self,
            SocketError::HeartbeatTimeout { .. } | SocketError::EstablishmentTimeout { .. }
        )
    }
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, SocketError>;
