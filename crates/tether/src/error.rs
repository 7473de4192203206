//! Unified error type for Tether.

use tether_loadgen::LoadError;
use tether_presence::PresenceError;
use tether_protocol::ProtocolError;
use tether_session::SessionError;
use tether_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `tether` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    /// A transport-level error (bind, upgrade, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed admission parameters.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (credentials, config, fatal IO).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The presence registry is not running.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// A load-test error.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Local IO outside the transport, such as opening the log file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Transport(_)));
        assert!(tether_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::MissingParam("ts");
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::AuthFailed("nope".into());
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Session(_)));
    }

    #[test]
    fn test_from_presence_error() {
        let tether_err: TetherError = PresenceError::Unavailable.into();
        assert!(matches!(tether_err, TetherError::Presence(_)));
    }

    #[test]
    fn test_from_load_error() {
        let err = LoadError::InvalidConfig("no peers".into());
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Load(_)));
    }
}
