//! Error types for vigil-topology.

use thiserror::Error;

use crate::VertexId;

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Errors raised while building or querying a waypoint graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// The vertex id is not part of the graph.
    #[error("unknown vertex {0}")]
    UnknownVertex(VertexId),

    /// A vertex id was declared twice.
    #[error("vertex {0} declared twice")]
    DuplicateVertex(VertexId),

    /// An edge connects a vertex to itself.
    #[error("self loop on vertex {0}")]
    SelfLoop(VertexId),

    /// No path exists between the two vertices.
    #[error("no path from {from} to {to}")]
    PathUnreachable { from: VertexId, to: VertexId },

    /// The graph has no vertices.
    #[error("waypoint graph is empty")]
    EmptyGraph,

    /// A map description could not be parsed.
    #[error("invalid map: {0}")]
    InvalidMap(String),
}
