//! Spectral bisection.
//!
//! # Affinity
//!
//! Waypoints are compared through their precomputed shortest-path distance
//! with a Gaussian kernel:
//!
//! ```text
//! w(i, j) = exp(-d(i, j)^2 / (2 * sigma^2))      (i != j, 0 if unreachable)
//! ```
//!
//! # Recursive Bisection
//!
//! The cluster is split along the sign of the Fiedler vector (eigenvector of
//! the second smallest eigenvalue of `L = D - W`). The currently largest
//! cluster is always bisected next until there is one cluster per agent.
//! Clusters are connected-ish, not guaranteed connected; meeting planning
//! repairs connectivity between partitions.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use tracing::{debug, trace};
use vigil_topology::{VertexId, WaypointGraph};

use crate::eigen::symmetric_eigen;
use crate::error::Result;
use crate::partition::{check_request, PartitionSet, Partitioner};

/// Gaussian-kernel affinity matrix over `vertices`.
///
/// Without an explicit `sigma`, the mean finite pairwise distance is used.
pub fn affinity_matrix(graph: &WaypointGraph, vertices: &[VertexId], sigma: Option<f64>) -> Vec<Vec<f64>> {
    let n = vertices.len();
    let distances: Vec<Vec<Option<u64>>> = vertices
        .iter()
        .map(|&a| vertices.iter().map(|&b| graph.distance(a, b)).collect())
        .collect();

    let sigma = sigma.filter(|s| *s > 0.0).unwrap_or_else(|| {
        let finite: Vec<f64> = distances
            .iter()
            .flatten()
            .filter_map(|d| d.filter(|&d| d > 0))
            .map(|d| d as f64)
            .collect();
        if finite.is_empty() {
            1.0
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        }
    });
    let denom = 2.0 * sigma * sigma;

    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| match distances[i][j] {
                    Some(d) if i != j => (-(d as f64).powi(2) / denom).exp(),
                    _ => 0.0,
                })
                .collect()
        })
        .collect()
}

/// Unnormalized graph Laplacian `L = D - W`.
pub fn laplacian(affinity: &[Vec<f64>]) -> Vec<Vec<f64>> {
    affinity
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let degree: f64 = row.iter().sum();
            row.iter()
                .enumerate()
                .map(|(j, w)| if i == j { degree - w } else { -w })
                .collect()
        })
        .collect()
}

/// Spectral bisection partitioner (the default strategy).
#[derive(Debug, Clone, Default)]
pub struct SpectralBisection {
    /// Kernel width; `None` picks the mean pairwise distance of each cluster
    pub sigma: Option<f64>,
}

impl SpectralBisection {
    /// Create with automatic kernel width.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit kernel width.
    #[must_use]
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = Some(sigma);
        self
    }

    /// Split one cluster in two along the Fiedler vector.
    ///
    /// Both halves are non-empty whenever the cluster has at least two
    /// vertices: a degenerate sign split falls back to a median split.
    pub fn bisect(&self, graph: &WaypointGraph, cluster: &[VertexId]) -> (Vec<VertexId>, Vec<VertexId>) {
        if cluster.len() < 2 {
            return (cluster.to_vec(), Vec::new());
        }

        let l = laplacian(&affinity_matrix(graph, cluster, self.sigma));
        let eig = symmetric_eigen(&l);
        let fiedler = eig.vector(1).unwrap_or_default();

        let (positive, negative): (Vec<_>, Vec<_>) = cluster
            .iter()
            .zip(fiedler)
            .partition(|(_, f)| **f >= 0.0);

        if !positive.is_empty() && !negative.is_empty() {
            return (
                positive.into_iter().map(|(&v, _)| v).collect(),
                negative.into_iter().map(|(&v, _)| v).collect(),
            );
        }

        trace!(size = cluster.len(), "Degenerate Fiedler split, using median");
        let mut ranked: Vec<(f64, VertexId)> = cluster
            .iter()
            .zip(fiedler.iter().copied().chain(std::iter::repeat(0.0)))
            .map(|(&v, f)| (f, v))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let upper = ranked.split_off(ranked.len() / 2);
        (
            ranked.into_iter().map(|(_, v)| v).collect(),
            upper.into_iter().map(|(_, v)| v).collect(),
        )
    }
}

impl Partitioner for SpectralBisection {
    fn name(&self) -> &'static str {
        "spectral-bisection"
    }

    fn partition(&self, graph: &WaypointGraph, agent_count: usize) -> Result<PartitionSet> {
        check_request(graph, agent_count)?;

        // Largest cluster first; among equal sizes, the oldest
        let mut clusters: Vec<Vec<VertexId>> = vec![graph.vertex_ids().collect()];
        let mut queue = BinaryHeap::new();
        queue.push((clusters[0].len(), Reverse(0usize)));
        let mut done: Vec<Vec<VertexId>> = Vec::new();

        while queue.len() + done.len() < agent_count {
            let Some((size, Reverse(slot))) = queue.pop() else {
                break;
            };
            let cluster = std::mem::take(&mut clusters[slot]);
            if size < 2 {
                done.push(cluster);
                continue;
            }

            let (left, right) = self.bisect(graph, &cluster);
            trace!(size, left = left.len(), right = right.len(), "Bisected cluster");
            for half in [left, right] {
                queue.push((half.len(), Reverse(clusters.len())));
                clusters.push(half);
            }
        }

        let result: Vec<BTreeSet<VertexId>> = queue
            .into_iter()
            .map(|(_, Reverse(slot))| std::mem::take(&mut clusters[slot]))
            .chain(done)
            .map(|c| c.into_iter().collect())
            .collect();

        let set = PartitionSet::from_clusters(result);
        debug!(
            strategy = self.name(),
            partitions = set.len(),
            sizes = ?set.iter().map(|p| p.len()).collect::<Vec<_>>(),
            "Partitioned waypoint graph"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_topology::Point;

    #[test]
    fn affinity_is_symmetric_with_zero_diagonal() {
        let graph = WaypointGraph::grid(3, 3, 10).unwrap();
        let vertices: Vec<_> = graph.vertex_ids().collect();
        let w = affinity_matrix(&graph, &vertices, None);

        for i in 0..vertices.len() {
            assert_eq!(w[i][i], 0.0);
            for j in 0..vertices.len() {
                assert!((w[i][j] - w[j][i]).abs() < 1e-12);
                assert!(w[i][j] >= 0.0 && w[i][j] <= 1.0);
            }
        }
        // Closer pairs have higher affinity
        assert!(w[0][1] > w[0][8]);
    }

    #[test]
    fn laplacian_rows_sum_to_zero() {
        let graph = WaypointGraph::grid(4, 2, 10).unwrap();
        let vertices: Vec<_> = graph.vertex_ids().collect();
        let l = laplacian(&affinity_matrix(&graph, &vertices, Some(15.0)));
        for row in l {
            assert!(row.iter().sum::<f64>().abs() < 1e-9);
        }
    }

    #[test]
    fn bisects_two_clumps() {
        // Two tight triangles joined by one long bridge
        let graph = WaypointGraph::builder()
            .vertex(0, Point::new(0, 0))
            .vertex(1, Point::new(5, 0))
            .vertex(2, Point::new(0, 5))
            .vertex(3, Point::new(100, 0))
            .vertex(4, Point::new(105, 0))
            .vertex(5, Point::new(100, 5))
            .edge(0, 1)
            .edge(1, 2)
            .edge(0, 2)
            .edge(3, 4)
            .edge(4, 5)
            .edge(3, 5)
            .edge(1, 3)
            .build()
            .unwrap();

        let set = SpectralBisection::new().partition(&graph, 2).unwrap();
        let first: Vec<u32> = set.iter().next().unwrap().vertices.iter().map(|v| v.0).collect();
        assert_eq!(first, vec![0, 1, 2]);
    }

    #[test]
    fn long_strip_splits_across_the_long_axis() {
        let graph = WaypointGraph::grid(8, 2, 10).unwrap();
        let set = SpectralBisection::new().partition(&graph, 2).unwrap();

        for p in set.iter() {
            assert_eq!(p.len(), 8);
            let xs: BTreeSet<i64> = p
                .vertices
                .iter()
                .map(|&v| graph.position(v).unwrap().x)
                .collect();
            // Each half is a contiguous block of four columns
            assert_eq!(xs.len(), 4);
        }
    }

    #[test]
    fn one_partition_per_vertex() {
        let graph = WaypointGraph::grid(3, 2, 10).unwrap();
        let set = SpectralBisection::new().partition(&graph, 6).unwrap();
        assert_eq!(set.len(), 6);
        assert!(set.iter().all(|p| p.len() == 1));
    }

    #[test]
    fn median_fallback_keeps_both_halves() {
        let graph = WaypointGraph::builder()
            .vertex(0, Point::ORIGIN)
            .vertex(1, Point::new(10, 0))
            .build()
            .unwrap();
        let (a, b) = SpectralBisection::new().bisect(&graph, &[VertexId(0), VertexId(1)]);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
