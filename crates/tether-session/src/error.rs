//! Error types for the session layer.

use tether_presence::PresenceError;
use tether_transport::TransportError;

use crate::SessionState;

/// Errors that can occur while admitting or running a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The request carried no bearer credential.
    #[error("missing bearer credential")]
    MissingCredential,

    /// The credential was malformed, forged, or does not match the
    /// request it came with.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A credential could not be created.
    #[error("could not mint credential: {0}")]
    MintFailed(String),

    /// The session configuration is inconsistent.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    /// A state change the session state machine does not allow.
    #[error("invalid session transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// State before the attempted change.
        from: SessionState,
        /// Requested state.
        to: SessionState,
    },

    /// A non-transient transport failure. Ends the session.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The presence registry is not running.
    #[error(transparent)]
    Presence(#[from] PresenceError),
}
