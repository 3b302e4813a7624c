//! Vigil Meeting Planning
//!
//! Agents never talk to each other on a whim: they exchange state at
//! scheduled rendezvous on waypoints shared between partitions.
//!
//! # Planning
//!
//! 1. Partition pairs that touch through a graph edge but share no vertex are
//!    repaired: both endpoints of the cheapest crossing edge join the smaller
//!    partition.
//! 2. Every vertex contained in two or more partitions becomes a meeting
//!    point whose participants are those partitions' original owners.
//! 3. Each partition's interval is `2 * ceil(|V| / |meetings|) * max_travel`;
//!    the global interval is the maximum.
//! 4. Meetings whose participants overlap conflict; Welsh–Powell coloring
//!    gives each meeting a color and its offset is `color * global_interval`.
//!
//! # Schedule
//!
//! Every meeting recurs every `global_interval * color_count` ticks, so two
//! meetings of different colors never fall on the same tick and an agent is
//! never expected at two places at once.

mod coloring;
mod error;
mod interval;
mod meeting;
mod planner;

pub use coloring::{color_count, conflicts, welsh_powell};
pub use error::{PlanError, Result};
pub use interval::{max_pairwise_travel, partition_interval, traversal_interval};
pub use meeting::{MeetingId, MeetingPoint};
pub use planner::{repair_adjacent_partitions, MeetingPlan, MeetingPlanner, Repair};
