//! Client-side transport abstraction for mixchat.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! the message-oriented socket the engine uses to talk to the local relay.
//! The engine never depends on a concrete socket type, which keeps the
//! connection state machine testable against in-memory doubles.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::fmt;
use std::future::Future;

pub use url::Url;

/// Close code reported when the stream ends without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when a close frame carried no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why the remote side (or the stream itself) ended the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code (RFC 6455 §7.4).
    pub code: u16,
    /// Human-readable reason, empty when none was given.
    pub reason: String,
}

impl CloseInfo {
    /// The stream ended without a close handshake.
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: ABNORMAL_CLOSURE,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "code {} (no reason)", self.code)
        } else {
            write!(f, "code {}: {}", self.code, self.reason)
        }
    }
}

/// One inbound event from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A complete data frame (text frames are delivered as their UTF-8 bytes).
    Message(Vec<u8>),
    /// The connection is over. No further frames will be delivered.
    Closed(CloseInfo),
}

/// Opens connections to a relay endpoint.
///
/// Completion of [`connect`](Self::connect) is the transport's "open" signal.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;
    /// The error type for connect failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens a socket to `endpoint`.
    fn connect(
        &self,
        endpoint: &Url,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single open connection that can send and receive frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one frame to the relay.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next inbound event.
    ///
    /// After [`Received::Closed`] is returned the connection is dead and
    /// callers must stop polling it.
    fn recv(&self) -> impl Future<Output = Result<Received, Self::Error>> + Send;

    /// Closes the connection. Safe to call more than once.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
