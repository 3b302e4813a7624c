//! Error types for vigil-protocols.

use thiserror::Error;
use vigil_meeting::MeetingId;
use vigil_stigmergy::StigmergyError;

/// Result type for vigil-protocols operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during coordination.
#[derive(Debug, Error)]
pub enum Error {
    /// An envelope could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// A message referenced a meeting that is not in the plan.
    #[error("unknown meeting {0}")]
    UnknownMeeting(MeetingId),

    /// The stigmergy layer failed.
    #[error("stigmergy error: {0}")]
    Stigmergy(#[from] StigmergyError),
}
