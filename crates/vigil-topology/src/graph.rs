//! Waypoint graph with precomputed shortest paths.
//!
//! The graph is built once per scenario by the map builder and never loses
//! vertices during a run. Only two pieces of per-vertex state change while
//! agents patrol: the partition tag and the last-visited tick.
//!
//! Edges are undirected and weighted by path cost. All-pairs shortest
//! distances are computed at build time (one Dijkstra per source), so
//! `distance` is a table lookup and `path` reconstructs a segment list by
//! walking neighbors that stay on a shortest path.

use std::collections::BTreeMap;

use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use tracing::debug;

use crate::error::{Result, TopologyError};
use crate::{PartitionId, Point, Tick, VertexId};

/// A waypoint vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Waypoint {
    /// Stable id
    pub id: VertexId,
    /// Position on the plane
    pub position: Point,
    /// Partition the vertex was assigned to (primary partition only)
    pub partition: Option<PartitionId>,
    /// Tick of the most recent visit by any agent
    pub last_visited: Option<Tick>,
}

/// Builder for a [`WaypointGraph`].
#[derive(Debug, Default, Clone)]
pub struct GraphBuilder {
    vertices: Vec<(VertexId, Point)>,
    edges: Vec<(VertexId, VertexId, Option<u64>)>,
}

impl GraphBuilder {
    /// Declare a vertex.
    #[must_use]
    pub fn vertex(mut self, id: u32, position: Point) -> Self {
        self.vertices.push((VertexId(id), position));
        self
    }

    /// Connect two vertices; the cost is their rounded Euclidean distance.
    #[must_use]
    pub fn edge(mut self, a: u32, b: u32) -> Self {
        self.edges.push((VertexId(a), VertexId(b), None));
        self
    }

    /// Connect two vertices with an explicit path cost.
    #[must_use]
    pub fn weighted_edge(mut self, a: u32, b: u32, cost: u64) -> Self {
        self.edges.push((VertexId(a), VertexId(b), Some(cost.max(1))));
        self
    }

    /// Build the graph and its shortest path table.
    pub fn build(self) -> Result<WaypointGraph> {
        if self.vertices.is_empty() {
            return Err(TopologyError::EmptyGraph);
        }

        let mut graph = UnGraph::with_capacity(self.vertices.len(), self.edges.len());
        let mut index = BTreeMap::new();

        for (id, position) in self.vertices {
            if index.contains_key(&id) {
                return Err(TopologyError::DuplicateVertex(id));
            }
            let node = graph.add_node(Waypoint {
                id,
                position,
                partition: None,
                last_visited: None,
            });
            index.insert(id, node);
        }

        for (a, b, cost) in self.edges {
            if a == b {
                return Err(TopologyError::SelfLoop(a));
            }
            let na = *index.get(&a).ok_or(TopologyError::UnknownVertex(a))?;
            let nb = *index.get(&b).ok_or(TopologyError::UnknownVertex(b))?;
            let cost = cost.unwrap_or_else(|| graph[na].position.edge_cost(&graph[nb].position));

            // Parallel edges collapse to the cheaper one
            match graph.find_edge(na, nb) {
                Some(existing) if graph[existing] <= cost => {}
                Some(existing) => graph[existing] = cost,
                None => {
                    graph.add_edge(na, nb, cost);
                }
            }
        }

        let distances = all_pairs_shortest(&graph);

        debug!(
            vertices = graph.node_count(),
            edges = graph.edge_count(),
            "Built waypoint graph"
        );

        Ok(WaypointGraph {
            graph,
            index,
            distances,
        })
    }
}

fn all_pairs_shortest(graph: &UnGraph<Waypoint, u64>) -> Vec<Vec<Option<u64>>> {
    let n = graph.node_count();
    graph
        .node_indices()
        .map(|source| {
            let reached = dijkstra(graph, source, None, |e| *e.weight());
            let mut row = vec![None; n];
            for (node, cost) in reached {
                row[node.index()] = Some(cost);
            }
            row
        })
        .collect()
}

/// Immutable waypoint graph plus per-vertex patrol state.
#[derive(Debug, Clone)]
pub struct WaypointGraph {
    graph: UnGraph<Waypoint, u64>,
    index: BTreeMap<VertexId, NodeIndex>,
    distances: Vec<Vec<Option<u64>>>,
}

impl WaypointGraph {
    /// Start building a graph.
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    /// Rectangular 4-connected grid.
    ///
    /// Vertex ids are assigned row-major starting at 0; vertex `(c, r)` sits
    /// at `(c * spacing, r * spacing)`.
    pub fn grid(cols: u32, rows: u32, spacing: i64) -> Result<Self> {
        let mut builder = Self::builder();
        let id = |c: u32, r: u32| r * cols + c;

        for r in 0..rows {
            for c in 0..cols {
                builder = builder.vertex(id(c, r), Point::new(c as i64 * spacing, r as i64 * spacing));
            }
        }
        for r in 0..rows {
            for c in 0..cols {
                if c + 1 < cols {
                    builder = builder.edge(id(c, r), id(c + 1, r));
                }
                if r + 1 < rows {
                    builder = builder.edge(id(c, r), id(c, r + 1));
                }
            }
        }
        builder.build()
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if the graph has no vertices (never true for a built graph).
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Check if a vertex exists.
    pub fn contains(&self, id: VertexId) -> bool {
        self.index.contains_key(&id)
    }

    /// All vertex ids in ascending order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.index.keys().copied()
    }

    /// All waypoints in ascending id order.
    pub fn vertices(&self) -> impl Iterator<Item = &Waypoint> + '_ {
        self.index.values().map(move |&n| &self.graph[n])
    }

    /// Look up a waypoint.
    pub fn vertex(&self, id: VertexId) -> Option<&Waypoint> {
        self.index.get(&id).map(|&n| &self.graph[n])
    }

    /// Position of a waypoint.
    pub fn position(&self, id: VertexId) -> Result<Point> {
        self.vertex(id)
            .map(|w| w.position)
            .ok_or(TopologyError::UnknownVertex(id))
    }

    /// Direct neighbors with edge costs, sorted by id.
    pub fn neighbors(&self, id: VertexId) -> Vec<(VertexId, u64)> {
        let Some(&node) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut out: Vec<_> = self
            .graph
            .edges(node)
            .map(|e| {
                let other = if e.source() == node { e.target() } else { e.source() };
                (self.graph[other].id, *e.weight())
            })
            .collect();
        out.sort_unstable();
        out
    }

    /// Cost of the direct edge between two vertices, if any.
    pub fn edge_cost(&self, a: VertexId, b: VertexId) -> Option<u64> {
        let na = *self.index.get(&a)?;
        let nb = *self.index.get(&b)?;
        self.graph.find_edge(na, nb).map(|e| self.graph[e])
    }

    /// All undirected edges as `(low id, high id, cost)`, sorted.
    pub fn edges(&self) -> Vec<(VertexId, VertexId, u64)> {
        let mut out: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| {
                let a = self.graph[e.source()].id;
                let b = self.graph[e.target()].id;
                (a.min(b), a.max(b), *e.weight())
            })
            .collect();
        out.sort_unstable();
        out
    }

    /// Shortest path cost between two vertices.
    pub fn distance(&self, a: VertexId, b: VertexId) -> Option<u64> {
        let na = self.index.get(&a)?;
        let nb = self.index.get(&b)?;
        self.distances[na.index()][nb.index()]
    }

    /// Shortest path from `from` to `to`, both endpoints included.
    pub fn path(&self, from: VertexId, to: VertexId) -> Result<Vec<VertexId>> {
        if !self.contains(from) {
            return Err(TopologyError::UnknownVertex(from));
        }
        if !self.contains(to) {
            return Err(TopologyError::UnknownVertex(to));
        }
        let unreachable = TopologyError::PathUnreachable { from, to };
        let mut remaining = self.distance(from, to).ok_or(unreachable.clone())?;

        let mut path = vec![from];
        let mut current = from;
        while current != to {
            let (next, cost) = self
                .neighbors(current)
                .into_iter()
                .find(|&(w, cost)| {
                    self.distance(w, to)
                        .is_some_and(|rest| cost.saturating_add(rest) == remaining)
                })
                .ok_or(unreachable.clone())?;
            remaining -= cost;
            path.push(next);
            current = next;
        }
        Ok(path)
    }

    /// Check that every vertex can reach every other vertex.
    pub fn is_connected(&self) -> bool {
        self.distances
            .first()
            .is_some_and(|row| row.iter().all(Option::is_some))
    }

    /// Record a visit.
    pub fn mark_visited(&mut self, id: VertexId, tick: Tick) -> Result<()> {
        let node = *self.index.get(&id).ok_or(TopologyError::UnknownVertex(id))?;
        self.graph[node].last_visited = Some(tick);
        Ok(())
    }

    /// Tick of the most recent visit, if any.
    pub fn last_visited(&self, id: VertexId) -> Option<Tick> {
        self.vertex(id).and_then(|w| w.last_visited)
    }

    /// Tag a vertex with its primary partition.
    pub fn set_partition_tag(&mut self, id: VertexId, partition: Option<PartitionId>) -> Result<()> {
        let node = *self.index.get(&id).ok_or(TopologyError::UnknownVertex(id))?;
        self.graph[node].partition = partition;
        Ok(())
    }
}
