//! Vigil Graph Partitioning
//!
//! Splits the waypoint graph into one partition per patrol agent and orders
//! vertices into patrol cycles.
//!
//! # Strategies
//!
//! All strategies implement [`Partitioner`] and are selected, not composed:
//!
//! - [`SpectralBisection`]: recursive Fiedler-vector bisection (default)
//! - [`SpectralKMeans`]: seeded k-means on the spectral embedding
//! - [`SingleCycle`]: one Christofides tour over all waypoints, cut into arcs
//!
//! Partitions are connected-ish but not guaranteed connected. Every vertex
//! lands in exactly one partition and exactly `agent_count` partitions are
//! produced.
//!
//! # Example
//!
//! ```
//! use vigil_partition::{Partitioner, SpectralBisection};
//! use vigil_topology::WaypointGraph;
//!
//! let graph = WaypointGraph::grid(4, 4, 10).unwrap();
//! let partitions = SpectralBisection::new().partition(&graph, 4).unwrap();
//! assert_eq!(partitions.len(), 4);
//! assert_eq!(partitions.coverage().len(), 16);
//! ```

mod christofides;
mod eigen;
mod error;
mod kmeans;
mod partition;
mod single_cycle;
mod spectral;

pub use christofides::{christofides_cycle, cycle_length, patrol_cycle, UNREACHABLE_COST};
pub use eigen::{symmetric_eigen, SymmetricEigen};
pub use error::{PartitionError, Result};
pub use kmeans::{SpectralKMeans, DEFAULT_MAX_ITERATIONS};
pub use partition::{Partition, PartitionSet, Partitioner};
pub use single_cycle::SingleCycle;
pub use spectral::{affinity_matrix, laplacian, SpectralBisection};
