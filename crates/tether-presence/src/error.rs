//! Error types for the presence layer.

/// Errors that can occur when talking to the presence registry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PresenceError {
    /// The registry task has stopped (or was never started), so its queue
    /// no longer accepts commands.
    #[error("presence registry is not running")]
    Unavailable,
}
