//! Error types for vigil-stigmergy.

use thiserror::Error;

/// Result type for stigmergy operations.
pub type Result<T> = std::result::Result<T, StigmergyError>;

/// Errors raised by the stigmergy wire layer.
///
/// A missing key is not an error: reads return `None` until the replica
/// converges.
#[derive(Debug, Error)]
pub enum StigmergyError {
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}
