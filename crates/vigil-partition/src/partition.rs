//! Partition types and the strategy seam.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use vigil_topology::{AgentId, PartitionId, VertexId, WaypointGraph};

use crate::error::{PartitionError, Result};

/// A set of waypoints patrolled by one agent.
///
/// The id is fixed for the whole run; `owner` is the agent the partition was
/// created for. Later ownership changes live in the stigmergy store, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: PartitionId,
    pub owner: AgentId,
    pub vertices: BTreeSet<VertexId>,
}

impl Partition {
    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Check if the partition holds no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Check membership.
    pub fn contains(&self, vertex: VertexId) -> bool {
        self.vertices.contains(&vertex)
    }
}

/// The full assignment of waypoints to agents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSet {
    partitions: Vec<Partition>,
}

impl PartitionSet {
    /// Turn raw clusters into partitions.
    ///
    /// Clusters are ordered by their smallest vertex id, then partition `i`
    /// is created for agent `i`. Empty clusters are dropped.
    pub fn from_clusters(clusters: Vec<BTreeSet<VertexId>>) -> Self {
        let mut clusters: Vec<_> = clusters.into_iter().filter(|c| !c.is_empty()).collect();
        clusters.sort_by_key(|c| c.first().copied());

        let partitions = clusters
            .into_iter()
            .enumerate()
            .map(|(i, vertices)| Partition {
                id: PartitionId(i as u32),
                owner: AgentId(i as u32),
                vertices,
            })
            .collect();

        Self { partitions }
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Check if there are no partitions.
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Iterate partitions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.iter()
    }

    /// Look up a partition.
    pub fn get(&self, id: PartitionId) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.id == id)
    }

    /// Mutable lookup (used when meeting planning grows a partition).
    pub fn get_mut(&mut self, id: PartitionId) -> Option<&mut Partition> {
        self.partitions.iter_mut().find(|p| p.id == id)
    }

    /// Union of all partitions' vertices.
    pub fn coverage(&self) -> BTreeSet<VertexId> {
        self.partitions
            .iter()
            .flat_map(|p| p.vertices.iter().copied())
            .collect()
    }

    /// Partitions containing a vertex.
    pub fn owner_of_vertex(&self, vertex: VertexId) -> Vec<PartitionId> {
        self.partitions
            .iter()
            .filter(|p| p.contains(vertex))
            .map(|p| p.id)
            .collect()
    }

    /// Original creator of every partition.
    pub fn original_owners(&self) -> BTreeMap<PartitionId, AgentId> {
        self.partitions.iter().map(|p| (p.id, p.owner)).collect()
    }

    /// Agent to vertex-set view.
    pub fn as_map(&self) -> BTreeMap<AgentId, BTreeSet<VertexId>> {
        self.partitions
            .iter()
            .map(|p| (p.owner, p.vertices.clone()))
            .collect()
    }

    /// Write partition tags onto the graph (first containing partition wins).
    pub fn tag_graph(&self, graph: &mut WaypointGraph) -> Result<()> {
        for partition in self.partitions.iter().rev() {
            for &v in &partition.vertices {
                graph.set_partition_tag(v, Some(partition.id))?;
            }
        }
        Ok(())
    }
}

/// A strategy splitting the waypoint graph into one cluster per agent.
///
/// Strategies are interchangeable and selected, never composed.
pub trait Partitioner {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    /// Split every vertex of `graph` into exactly `agent_count` partitions.
    fn partition(&self, graph: &WaypointGraph, agent_count: usize) -> Result<PartitionSet>;
}

/// Reject requests with no agents or more agents than vertices.
pub(crate) fn check_request(graph: &WaypointGraph, agent_count: usize) -> Result<()> {
    if agent_count == 0 || agent_count > graph.len() {
        return Err(PartitionError::InvalidPartitionRequest {
            agents: agent_count,
            vertices: graph.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u32]) -> BTreeSet<VertexId> {
        ids.iter().map(|&i| VertexId(i)).collect()
    }

    #[test]
    fn clusters_ordered_by_smallest_vertex() {
        let ps = PartitionSet::from_clusters(vec![set(&[5, 6]), set(&[]), set(&[1, 9])]);

        assert_eq!(ps.len(), 2);
        let first = ps.get(PartitionId(0)).unwrap();
        assert_eq!(first.owner, AgentId(0));
        assert_eq!(first.vertices, set(&[1, 9]));
        assert_eq!(ps.get(PartitionId(1)).unwrap().vertices, set(&[5, 6]));
    }

    #[test]
    fn coverage_and_lookup() {
        let ps = PartitionSet::from_clusters(vec![set(&[0, 1, 2]), set(&[2, 3])]);
        assert_eq!(ps.coverage(), set(&[0, 1, 2, 3]));
        assert_eq!(ps.owner_of_vertex(VertexId(2)), vec![PartitionId(0), PartitionId(1)]);
        assert!(ps.owner_of_vertex(VertexId(7)).is_empty());
        assert_eq!(ps.as_map()[&AgentId(1)], set(&[2, 3]));
    }

    #[test]
    fn tags_prefer_lowest_partition() {
        let mut graph = WaypointGraph::grid(4, 1, 10).unwrap();
        let ps = PartitionSet::from_clusters(vec![set(&[0, 1, 2]), set(&[2, 3])]);
        ps.tag_graph(&mut graph).unwrap();

        assert_eq!(graph.vertex(VertexId(2)).unwrap().partition, Some(PartitionId(0)));
        assert_eq!(graph.vertex(VertexId(3)).unwrap().partition, Some(PartitionId(1)));
    }

    #[test]
    fn request_validation() {
        let graph = WaypointGraph::grid(2, 2, 10).unwrap();
        assert!(check_request(&graph, 4).is_ok());
        assert_eq!(
            check_request(&graph, 5),
            Err(PartitionError::InvalidPartitionRequest { agents: 5, vertices: 4 })
        );
        assert!(check_request(&graph, 0).is_err());
    }
}
