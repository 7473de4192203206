//! Error types for the load generator.

use tether_session::SessionError;
use tether_transport::TransportError;

/// Errors that end one simulated peer, or the whole run.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The run was configured with nothing to do.
    #[error("invalid load config: {0}")]
    InvalidConfig(String),

    /// The peer's credential could not be minted.
    #[error(transparent)]
    Credential(#[from] SessionError),

    /// Connecting, or a later read or write, failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
