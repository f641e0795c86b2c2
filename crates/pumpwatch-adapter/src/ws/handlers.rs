/*
[INPUT]:  Consumer callbacks (open, message, close, error)
[OUTPUT]: Dispatch helpers invoked from the connection actor
[POS]:    WebSocket layer - consumer-facing event surface
[UPDATE]: When adding lifecycle events or changing callback signatures
*/

//! Connection lifecycle callbacks.
//!
//! All callbacks run on the connection's actor task, one at a time, so a
//! handler never races another handler of the same connection. Handlers must
//! not block; forward into a channel when the work is heavy.
//!
//! ```rust
//! use pumpwatch_adapter::EventHandlers;
//!
//! let handlers = EventHandlers::new()
//!     .on_open(|| println!("connected"))
//!     .on_message(|payload| println!("message: {payload}"))
//!     .on_close(|info| println!("closed: {info}"))
//!     .on_error(|err| eprintln!("error: {err}"));
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::SocketError;

/// Normal-closure code; a close with this code is never retried.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code used when the transport vanished without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code the client sends when it tears down a stale connection.
pub const STALE_CLOSURE: u16 = 4000;

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// A deliberate shutdown that must not trigger a reconnect.
    pub fn is_normal(&self) -> bool {
        self.code == Some(NORMAL_CLOSURE)
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code: {})", self.reason, code),
            None => write!(f, "{}", self.reason),
        }
    }
}

pub type OnOpenCallback = Arc<dyn Fn() + Send + Sync>;
pub type OnMessageCallback = Arc<dyn Fn(Value) + Send + Sync>;
pub type OnCloseCallback = Arc<dyn Fn(CloseInfo) + Send + Sync>;
pub type OnErrorCallback = Arc<dyn Fn(&SocketError) + Send + Sync>;

/// Optional callbacks for one connection.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_open: Option<OnOpenCallback>,
    pub(crate) on_message: Option<OnMessageCallback>,
    pub(crate) on_close: Option<OnCloseCallback>,
    pub(crate) on_error: Option<OnErrorCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_open", &self.on_open.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once the connection is open and stable.
    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(f));
        self
    }

    /// Called for every drained inbound payload, in arrival order.
    ///
    /// Text frames that are not JSON arrive as [`Value::String`].
    pub fn on_message(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Called when the transport closes, deliberately or not.
    pub fn on_close(mut self, f: impl Fn(CloseInfo) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    /// Called on transport failures, establishment timeouts and when
    /// automatic reconnection gives up.
    pub fn on_error(mut self, f: impl Fn(&SocketError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn emit_open(&self) {
        if let Some(cb) = &self.on_open {
            cb();
        }
    }

    pub(crate) fn emit_message(&self, payload: Value) {
        if let Some(cb) = &self.on_message {
            cb(payload);
        }
    }

    pub(crate) fn emit_close(&self, info: CloseInfo) {
        if let Some(cb) = &self.on_close {
            cb(info);
        }
    }

    pub(crate) fn emit_error(&self, error: &SocketError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }
}
