use std::io;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection is closing or already closed; no more frames can be
    /// written to it.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// The upgrade handshake failed before the gate could decide.
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[source] io::Error),

    /// The upgrade gate rejected the request with an HTTP error status.
    #[error("upgrade rejected ({status}): {reason}")]
    Rejected {
        /// HTTP status code sent back to the client.
        status: u16,
        /// Human-readable reason sent as the response body.
        reason: String,
    },

    /// An outbound connection attempt failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] io::Error),
}

impl TransportError {
    /// Returns `true` for failures that do not mean the connection is
    /// broken: writes racing an in-progress close, and temporary IO
    /// conditions.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionClosed(_) => true,
            Self::SendFailed(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closing_is_transient() {
        let err = TransportError::ConnectionClosed("close sent".into());
        assert!(err.is_transient());
    }

    #[test]
    fn test_temporary_io_is_transient() {
        for kind in [
            io::ErrorKind::WouldBlock,
            io::ErrorKind::Interrupted,
            io::ErrorKind::TimedOut,
        ] {
            let err = TransportError::SendFailed(io::Error::from(kind));
            assert!(err.is_transient(), "{kind:?} should be transient");
        }
    }

    #[test]
    fn test_broken_pipe_is_fatal() {
        let err = TransportError::SendFailed(io::Error::from(
            io::ErrorKind::BrokenPipe,
        ));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_receive_failure_is_fatal() {
        let err = TransportError::ReceiveFailed(io::Error::from(
            io::ErrorKind::ConnectionReset,
        ));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_rejected_display() {
        let err = TransportError::Rejected {
            status: 401,
            reason: "bad token".into(),
        };
        assert_eq!(err.to_string(), "upgrade rejected (401): bad token");
    }
}
