//! Error types for vigil-meeting.

use thiserror::Error;
use vigil_topology::{PartitionId, TopologyError};

/// Result type for meeting planning.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Errors that can occur while planning meetings.
///
/// Coloring itself never fails: greedy coloring always terminates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("partition {0} has no vertices")]
    EmptyPartition(PartitionId),

    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),
}
