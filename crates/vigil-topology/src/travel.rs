//! Travel-time estimation between waypoints.
//!
//! Agents move edge by edge. An edge of cost `c` takes `ceil(c / speed)`
//! ticks (at least one), and an estimate along a route is the sum over its
//! edges. Because the engine moves with the same quantization, the estimate
//! for a shortest path is exact.

use crate::{Tick, VertexId, WaypointGraph};

/// Estimates how many ticks an agent needs between two waypoints.
pub trait TravelEstimator {
    /// Ticks to travel from `from` to `to`, or `None` if unreachable.
    fn travel_ticks(&self, graph: &WaypointGraph, from: VertexId, to: VertexId) -> Option<Tick>;

    /// Ticks to traverse a single edge of the given cost.
    fn edge_ticks(&self, cost: u64) -> Tick;
}

/// Every agent moves at the same constant speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantSpeed {
    units_per_tick: u64,
}

impl ConstantSpeed {
    /// Create an estimator; a speed of zero is treated as one.
    pub const fn new(units_per_tick: u64) -> Self {
        Self {
            units_per_tick: if units_per_tick == 0 { 1 } else { units_per_tick },
        }
    }

    /// Distance units covered per tick.
    pub const fn units_per_tick(&self) -> u64 {
        self.units_per_tick
    }
}

impl Default for ConstantSpeed {
    fn default() -> Self {
        Self::new(1)
    }
}

impl TravelEstimator for ConstantSpeed {
    fn travel_ticks(&self, graph: &WaypointGraph, from: VertexId, to: VertexId) -> Option<Tick> {
        let path = graph.path(from, to).ok()?;
        path.windows(2).try_fold(0, |acc: Tick, pair| {
            let cost = graph.edge_cost(pair[0], pair[1])?;
            Some(acc + self.edge_ticks(cost))
        })
    }

    fn edge_ticks(&self, cost: u64) -> Tick {
        cost.div_ceil(self.units_per_tick).max(1)
    }
}
