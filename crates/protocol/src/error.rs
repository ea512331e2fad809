//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while decoding inbound messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("turn direction out of range: {0}")]
    InvalidTurnDirection(i8),
}
