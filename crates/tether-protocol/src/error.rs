//! Error types for the protocol layer.

/// Errors that can occur while interpreting protocol-level input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A required admission parameter was absent or empty.
    #[error("missing required parameter `{0}`")]
    MissingParam(&'static str),

    /// An admission parameter was present but could not be parsed.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParam {
        /// Parameter name as it appears in the query string.
        name: &'static str,
        /// Why the value was refused.
        reason: String,
    },
}
