//! Transport abstraction layer for Tether.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! a framed, bidirectional stream with control frames (ping, pong, close),
//! plus the WebSocket implementation used by both the server and the load
//! generator.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    ClientConnection, PendingConnection, Rejection, ServerConnection,
    UpgradeRequest, WebSocketConnection, WebSocketTransport, connect,
};

use std::fmt;
use std::future::Future;

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

/// Code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// Numeric close code (1000 = normal closure).
    pub code: u16,
    /// Optional human-readable reason.
    pub reason: String,
}

impl CloseFrame {
    /// Creates a close frame with the given code and reason.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// A single frame read from or written to a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Application payload (text or binary).
    Data(Vec<u8>),
    /// Liveness probe.
    Ping(Vec<u8>),
    /// Liveness acknowledgment.
    Pong(Vec<u8>),
    /// Close handshake frame. `None` when the peer sent no status code.
    Close(Option<CloseFrame>),
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// What `accept` yields: a connection that may still need a handshake.
    type Incoming: Send + 'static;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Incoming, Self::Error>> + Send;
}

/// A single, exclusively owned connection that sends and receives frames.
///
/// Methods take `&mut self`: exactly one task drives a connection, so no
/// interior locking is needed.
pub trait Connection: Send + 'static {
    /// Sends a frame to the remote peer.
    fn send(
        &mut self,
        frame: Frame,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` once the stream has ended.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<Frame>, TransportError>> + Send;

    /// Starts the close handshake by sending a close frame.
    fn close(
        &mut self,
        frame: CloseFrame,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_close_frame_new() {
        let frame = CloseFrame::new(1000, "bye");
        assert_eq!(frame.code, 1000);
        assert_eq!(frame.reason, "bye");
    }
}
