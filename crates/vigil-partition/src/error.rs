//! Error types for vigil-partition.

use thiserror::Error;
use vigil_topology::TopologyError;

/// Result type for partitioning operations.
pub type Result<T> = std::result::Result<T, PartitionError>;

/// Errors that can occur while partitioning a waypoint graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    /// More agents than vertices, or no agents at all. Fatal at scenario setup.
    #[error("cannot split {vertices} vertices among {agents} agents")]
    InvalidPartitionRequest { agents: usize, vertices: usize },

    /// The underlying graph rejected a query.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),
}
