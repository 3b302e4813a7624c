//! Vigil Waypoint Topology
//!
//! The shared world every patrol agent moves through: an undirected,
//! weighted graph of waypoints with precomputed shortest paths.
//!
//! # Data Model
//!
//! - **Waypoint**: stable id, integer 2D position, partition tag, last
//!   visited tick. Created once at map-build time, never destroyed.
//! - **Edges**: undirected, weighted by path cost (rounded Euclidean length
//!   unless the map says otherwise).
//! - **Paths**: all-pairs shortest distances computed at build time;
//!   segment lists are reconstructed on demand.
//!
//! # Travel Time
//!
//! The [`TravelEstimator`] trait is the seam through which the coordination
//! layer asks "how long from here to there". [`ConstantSpeed`] quantizes
//! every edge to whole ticks, the same way agents actually move.

mod error;
mod graph;
mod ids;
#[cfg(feature = "serde")]
mod map;
mod point;
mod travel;

pub use error::{Result, TopologyError};
pub use graph::{GraphBuilder, Waypoint, WaypointGraph};
pub use ids::{AgentId, PartitionId, Tick, VertexId};
#[cfg(feature = "serde")]
pub use map::{MapEdge, MapSpec, MapVertex};
pub use point::Point;
pub use travel::{ConstantSpeed, TravelEstimator};
