//! Core protocol types shared by the server and the load generator.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_transport::CloseFrame;

// ---------------------------------------------------------------------------
// Timing defaults
// ---------------------------------------------------------------------------

/// How often a client sends a liveness probe.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// How long the server waits for a probe before declaring the peer dead.
///
/// Must stay well above [`DEFAULT_PROBE_INTERVAL`] so that jitter and at
/// least one lost probe are tolerated.
pub const DEFAULT_LIVENESS_WINDOW: Duration = Duration::from_secs(60);

/// Budget for writing a single acknowledgment (pong) back to the peer.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Largest inbound message the server accepts, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 512;

// ---------------------------------------------------------------------------
// PeerId
// ---------------------------------------------------------------------------

/// Identifies a connected peer.
///
/// Opaque to the server: it is whatever the client put in `uid`. Unique
/// among open sessions, but free to be reused once a session closes.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// What a bearer credential asserts: who the caller is and when the
/// request was issued. The same pair is repeated in the query string, and
/// the two must agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Peer identifier.
    pub uid: String,
    /// Issuance time, seconds since the Unix epoch.
    pub ts: i64,
}

impl Claims {
    /// Creates claims for the given peer and timestamp.
    pub fn new(uid: impl Into<String>, ts: i64) -> Self {
        Self {
            uid: uid.into(),
            ts,
        }
    }
}

// ---------------------------------------------------------------------------
// CloseCode
// ---------------------------------------------------------------------------

/// A WebSocket close status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// 1000: the purpose of the connection has been fulfilled.
    pub const NORMAL: Self = Self(1000);
    /// 1001: the endpoint is going away (server shutdown, tab closed).
    pub const GOING_AWAY: Self = Self(1001);
    /// 1006: the connection dropped without a close frame. Never sent on
    /// the wire, only reported locally.
    pub const ABNORMAL: Self = Self(1006);

    /// Classifies a received close frame. A close without a status code is
    /// treated as normal closure.
    pub fn of(frame: Option<&CloseFrame>) -> Self {
        frame.map_or(Self::NORMAL, |f| Self(f.code))
    }

    /// Whether this code is an ordinary way for a peer to leave.
    ///
    /// Anything else is still honored as a close, but is worth a log line.
    pub fn is_expected(self) -> bool {
        matches!(self, Self::NORMAL | Self::GOING_AWAY | Self::ABNORMAL)
    }

    /// Builds a close frame carrying this code.
    pub fn frame(self, reason: &str) -> CloseFrame {
        CloseFrame::new(self.0, reason)
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
