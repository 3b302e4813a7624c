//! Meeting interval derived from worst-case partition traversal.
//!
//! For a partition with `n` vertices and `m` meeting points:
//!
//! ```text
//! interval = 2 * ceil(n / m) * max_travel
//! ```
//!
//! where `max_travel` is the longest travel time between any two of its
//! vertices. The global interval is the maximum over partitions, so every
//! meeting shares one rendezvous rhythm.

use std::collections::BTreeSet;

use vigil_topology::{Tick, TravelEstimator, VertexId, WaypointGraph};

/// Interval for a partition of `vertex_count` vertices and `meeting_count`
/// meetings. Partitions without meetings need no interval (0).
///
/// # Examples
///
/// ```
/// use vigil_meeting::traversal_interval;
///
/// assert_eq!(traversal_interval(6, 1, 4), 48);
/// assert_eq!(traversal_interval(7, 2, 4), 32); // ceil(7/2) = 4
/// assert_eq!(traversal_interval(5, 0, 4), 0);
/// ```
pub const fn traversal_interval(vertex_count: usize, meeting_count: usize, max_travel: Tick) -> Tick {
    if meeting_count == 0 {
        return 0;
    }
    2 * (vertex_count.div_ceil(meeting_count) as Tick) * max_travel
}

/// Longest travel time between any two vertices of the set. Unreachable
/// pairs are ignored.
pub fn max_pairwise_travel<E>(graph: &WaypointGraph, estimator: &E, vertices: &BTreeSet<VertexId>) -> Tick
where
    E: TravelEstimator + ?Sized,
{
    let list: Vec<VertexId> = vertices.iter().copied().collect();
    let mut worst = 0;
    for (i, &a) in list.iter().enumerate() {
        for &b in &list[i + 1..] {
            if let Some(t) = estimator.travel_ticks(graph, a, b) {
                worst = worst.max(t);
            }
        }
    }
    worst
}

/// Interval for one partition given its meeting count.
pub fn partition_interval<E>(
    graph: &WaypointGraph,
    estimator: &E,
    vertices: &BTreeSet<VertexId>,
    meeting_count: usize,
) -> Tick
where
    E: TravelEstimator + ?Sized,
{
    if meeting_count == 0 {
        return 0;
    }
    traversal_interval(vertices.len(), meeting_count, max_pairwise_travel(graph, estimator, vertices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_topology::ConstantSpeed;

    #[test]
    fn formula() {
        assert_eq!(traversal_interval(1, 1, 0), 0);
        assert_eq!(traversal_interval(4, 4, 3), 6);
        assert_eq!(traversal_interval(10, 3, 2), 16);
    }

    #[test]
    fn line_partition() {
        // 0 - 1 - 2 - 3 with edges of cost 10, speed 5: 2 ticks per edge
        let graph = WaypointGraph::grid(4, 1, 10).unwrap();
        let speed = ConstantSpeed::new(5);
        let all: BTreeSet<_> = graph.vertex_ids().collect();

        assert_eq!(max_pairwise_travel(&graph, &speed, &all), 6);
        assert_eq!(partition_interval(&graph, &speed, &all, 1), 2 * 4 * 6);
        assert_eq!(partition_interval(&graph, &speed, &all, 2), 2 * 2 * 6);
        assert_eq!(partition_interval(&graph, &speed, &all, 0), 0);
    }
}
