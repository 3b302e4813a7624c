//! Single-cycle partitioning: one Christofides tour over every waypoint,
//! cut into contiguous arcs.

use std::collections::BTreeSet;

use tracing::debug;
use vigil_topology::{VertexId, WaypointGraph};

use crate::christofides::{christofides_cycle, UNREACHABLE_COST};
use crate::error::Result;
use crate::partition::{check_request, PartitionSet, Partitioner};

/// Cut a global patrol tour into `agent_count` arcs of near-equal length
/// (vertex count). The tour is rotated so that its longest hop falls on an
/// arc boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleCycle;

impl SingleCycle {
    pub fn new() -> Self {
        Self
    }

    /// The global tour, rotated to start right after its longest hop.
    pub fn tour(&self, graph: &WaypointGraph) -> Vec<VertexId> {
        let cost = |a: VertexId, b: VertexId| graph.distance(a, b).unwrap_or(UNREACHABLE_COST);
        let all: Vec<VertexId> = graph.vertex_ids().collect();
        let mut tour = christofides_cycle(&all, cost);

        let n = tour.len();
        if n > 1 {
            let longest = (0..n)
                .max_by_key(|&i| (cost(tour[i], tour[(i + 1) % n]), std::cmp::Reverse(i)))
                .unwrap_or(0);
            tour.rotate_left((longest + 1) % n);
        }
        tour
    }
}

impl Partitioner for SingleCycle {
    fn name(&self) -> &'static str {
        "single-cycle"
    }

    fn partition(&self, graph: &WaypointGraph, agent_count: usize) -> Result<PartitionSet> {
        check_request(graph, agent_count)?;

        let tour = self.tour(graph);
        let base = tour.len() / agent_count;
        let extra = tour.len() % agent_count;

        let mut clusters: Vec<BTreeSet<VertexId>> = Vec::with_capacity(agent_count);
        let mut rest = tour.as_slice();
        for i in 0..agent_count {
            let size = base + usize::from(i < extra);
            let (arc, tail) = rest.split_at(size);
            clusters.push(arc.iter().copied().collect());
            rest = tail;
        }

        let set = PartitionSet::from_clusters(clusters);
        debug!(strategy = self.name(), partitions = set.len(), "Partitioned waypoint graph");
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_topology::Point;

    #[test]
    fn arcs_have_near_equal_size() {
        let graph = WaypointGraph::grid(5, 2, 10).unwrap();
        let set = SingleCycle::new().partition(&graph, 3).unwrap();

        let mut sizes: Vec<usize> = set.iter().map(|p| p.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![3, 3, 4]);
        assert_eq!(set.coverage().len(), 10);
    }

    #[test]
    fn rotation_cuts_at_longest_hop() {
        // Two clumps far apart: the tour crosses the gap twice, one crossing
        // becomes the arc boundary
        let graph = WaypointGraph::builder()
            .vertex(0, Point::new(0, 0))
            .vertex(1, Point::new(10, 0))
            .vertex(2, Point::new(500, 0))
            .vertex(3, Point::new(510, 0))
            .edge(0, 1)
            .edge(1, 2)
            .edge(2, 3)
            .build()
            .unwrap();
        let tour = SingleCycle::new().tour(&graph);
        let n = tour.len();
        let closing = graph.distance(tour[n - 1], tour[0]).unwrap();
        assert!(closing >= 490);

        let set = SingleCycle::new().partition(&graph, 2).unwrap();
        let first: Vec<u32> = set.iter().next().unwrap().vertices.iter().map(|v| v.0).collect();
        assert_eq!(first, vec![0, 1]);
    }
}
