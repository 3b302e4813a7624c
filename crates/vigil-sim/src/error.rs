//! Error types for vigil-sim.

use thiserror::Error;
use vigil_meeting::PlanError;
use vigil_partition::PartitionError;
use vigil_topology::TopologyError;

/// Result type for simulation setup.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that stop a scenario from being set up.
///
/// Once a simulation runs, nothing is fatal: unreachable targets, lost or
/// garbled messages and meeting overruns are logged and absorbed.
#[derive(Debug, Error)]
pub enum SimError {
    /// The waypoints could not be split among the agents.
    #[error("partition error: {0}")]
    Partition(#[from] PartitionError),

    /// Meeting planning failed.
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    /// The map is malformed.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// A configuration value is out of range or unparseable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
