//! Session types: configuration, the lifecycle state machine, and how a
//! session ended.

use std::time::Duration;

use tether_protocol::{
    CloseCode, DEFAULT_ACK_TIMEOUT, DEFAULT_LIVENESS_WINDOW,
    DEFAULT_PROBE_INTERVAL, MAX_MESSAGE_SIZE,
};

use crate::{LivenessPolicy, SessionError};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timeouts and limits for server-side sessions.
///
/// Fixed at startup; there is no runtime reconfiguration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a peer may stay silent before it is declared dead.
    ///
    /// Default: 60 seconds.
    pub liveness_window: Duration,

    /// The probe period peers are expected to use. Only used to check
    /// that `liveness_window` leaves room for missed probes.
    ///
    /// Default: 1 second.
    pub probe_interval: Duration,

    /// Budget for writing one acknowledgment. Default: 1 second.
    pub ack_timeout: Duration,

    /// How long to wait for the peer to finish a close handshake.
    /// Default: 1 second.
    pub close_timeout: Duration,

    /// How long an accepted socket has to complete the upgrade.
    /// Default: 5 seconds.
    pub handshake_timeout: Duration,

    /// Largest inbound message, in bytes. Default: 512.
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            liveness_window: DEFAULT_LIVENESS_WINDOW,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            close_timeout: Duration::from_secs(1),
            handshake_timeout: Duration::from_secs(5),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl SessionConfig {
    /// Checks that the settings are usable together.
    ///
    /// # Errors
    /// [`SessionError::InvalidConfig`] if the liveness window is not
    /// strictly longer than the probe interval, or any timeout is zero.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.liveness_window <= self.probe_interval {
            return Err(SessionError::InvalidConfig(format!(
                "liveness window {:?} must exceed probe interval {:?}",
                self.liveness_window, self.probe_interval
            )));
        }
        if self.ack_timeout.is_zero()
            || self.close_timeout.is_zero()
            || self.handshake_timeout.is_zero()
        {
            return Err(SessionError::InvalidConfig(
                "timeouts must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// The liveness policy these settings describe.
    pub fn liveness(&self) -> LivenessPolicy {
        LivenessPolicy::new(self.liveness_window)
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
///
/// ```text
///   Connecting ──→ Active ──→ Closing ──→ Closed
///       │             │                     ↑
///       │             └─────(failure)───────┤
///       └──────────(never activated)────────┘
/// ```
///
/// A graceful close always passes through `Closing`. Transport failures
/// and liveness expiry may jump straight from `Active` to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upgraded, not yet registered.
    Connecting,
    /// Registered and reading frames.
    Active,
    /// A close handshake is in progress.
    Closing,
    /// Terminal. Transport released, peer deregistered.
    Closed,
}

impl SessionState {
    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Active)
                | (Connecting, Closed)
                | (Active, Closing)
                | (Active, Closed)
                | (Closing, Closed)
        )
    }

    /// Moves to `next`.
    ///
    /// # Errors
    /// [`SessionError::InvalidTransition`] if the move is not allowed; the
    /// state is left unchanged.
    pub fn transition(&mut self, next: Self) -> Result<(), SessionError> {
        if !self.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SessionOutcome
// ---------------------------------------------------------------------------

/// How a session that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The peer sent a close frame with this code.
    PeerClosed {
        /// Close code from the peer (1000 when it sent none).
        code: CloseCode,
    },
    /// The stream ended without a close frame.
    StreamEnded,
    /// No probe arrived within the liveness window.
    LivenessExpired,
    /// The server is shutting down and closed the session.
    ServerShutdown,
}
