//! Spectral k-means.
//!
//! Embeds every waypoint as the row of the first `k` Laplacian eigenvectors
//! (same affinity as [`SpectralBisection`](crate::SpectralBisection)) and
//! clusters the embedding with seeded k-means++ and Lloyd iterations.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};
use vigil_topology::{VertexId, WaypointGraph};

use crate::eigen::symmetric_eigen;
use crate::error::Result;
use crate::partition::{check_request, PartitionSet, Partitioner};
use crate::spectral::{affinity_matrix, laplacian};

/// Default cap on Lloyd iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// K-means over the spectral embedding.
#[derive(Debug, Clone)]
pub struct SpectralKMeans {
    pub sigma: Option<f64>,
    pub max_iterations: usize,
    /// Seed for k-means++ initialization
    pub seed: u64,
}

impl Default for SpectralKMeans {
    fn default() -> Self {
        Self {
            sigma: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: 0,
        }
    }
}

impl SpectralKMeans {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = Some(sigma);
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// One row per vertex, `k` columns.
    pub fn embedding(&self, graph: &WaypointGraph, vertices: &[VertexId], k: usize) -> Vec<Vec<f64>> {
        let eig = symmetric_eigen(&laplacian(&affinity_matrix(graph, vertices, self.sigma)));
        (0..vertices.len())
            .map(|row| (0..k).map(|col| eig.vectors.get(col).map_or(0.0, |v| v[row])).collect())
            .collect()
    }

    /// Cluster points into exactly `k` non-empty groups. Returns the group
    /// index of every point.
    pub fn cluster(&self, points: &[Vec<f64>], k: usize) -> Vec<usize> {
        let n = points.len();
        if k == 0 || n == 0 {
            return vec![0; n];
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centers = plus_plus_init(points, k, &mut rng);
        let mut labels = vec![usize::MAX; n];

        for iteration in 0..self.max_iterations {
            let mut changed = false;
            for (i, point) in points.iter().enumerate() {
                let nearest = nearest_center(point, &centers);
                if labels[i] != nearest {
                    labels[i] = nearest;
                    changed = true;
                }
            }

            repair_empty(points, &mut labels, &centers, k);
            centers = centroids(points, &labels, k);

            if !changed {
                trace!(iteration, "K-means converged");
                break;
            }
        }

        repair_empty(points, &mut labels, &centers, k);
        labels
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the closest center; ties go to the lowest index.
fn nearest_center(point: &[f64], centers: &[Vec<f64>]) -> usize {
    centers
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, best_d), (i, c)| {
            let d = squared_distance(point, c);
            if d < best_d {
                (i, d)
            } else {
                (best, best_d)
            }
        })
        .0
}

fn plus_plus_init(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut chosen: Vec<usize> = vec![rng.gen_range(0..n)];

    while chosen.len() < k.min(n) {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| {
                chosen
                    .iter()
                    .map(|&c| squared_distance(p, &points[c]))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            weights
                .iter()
                .position(|&w| {
                    target -= w;
                    target <= 0.0 && w > 0.0
                })
                .unwrap_or_else(|| weights.iter().rposition(|&w| w > 0.0).unwrap_or(0))
        } else {
            // All remaining points coincide with a center
            (0..n).find(|i| !chosen.contains(i)).unwrap_or(0)
        };
        chosen.push(next);
    }

    chosen.into_iter().map(|i| points[i].clone()).collect()
}

fn centroids(points: &[Vec<f64>], labels: &[usize], k: usize) -> Vec<Vec<f64>> {
    let dim = points.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];

    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (s, x) in sums[label].iter_mut().zip(point) {
            *s += x;
        }
    }
    for (sum, &count) in sums.iter_mut().zip(&counts) {
        if count > 0 {
            sum.iter_mut().for_each(|s| *s /= count as f64);
        }
    }
    sums
}

/// Move the point farthest from its center out of the largest cluster into
/// each empty cluster.
fn repair_empty(points: &[Vec<f64>], labels: &mut [usize], centers: &[Vec<f64>], k: usize) {
    loop {
        let mut counts = vec![0usize; k];
        for &label in labels.iter() {
            counts[label] += 1;
        }
        let Some(empty) = counts.iter().position(|&c| c == 0) else {
            return;
        };
        let largest = (0..k).max_by_key(|&c| (counts[c], std::cmp::Reverse(c))).unwrap_or(0);
        if counts[largest] < 2 {
            return;
        }

        let farthest = (0..points.len())
            .filter(|&i| labels[i] == largest)
            .max_by(|&a, &b| {
                squared_distance(&points[a], &centers[largest])
                    .total_cmp(&squared_distance(&points[b], &centers[largest]))
                    .then(b.cmp(&a))
            });
        match farthest {
            Some(i) => labels[i] = empty,
            None => return,
        }
    }
}

impl Partitioner for SpectralKMeans {
    fn name(&self) -> &'static str {
        "spectral-kmeans"
    }

    fn partition(&self, graph: &WaypointGraph, agent_count: usize) -> Result<PartitionSet> {
        check_request(graph, agent_count)?;

        let vertices: Vec<VertexId> = graph.vertex_ids().collect();
        let points = self.embedding(graph, &vertices, agent_count);
        let labels = self.cluster(&points, agent_count);

        let mut clusters = vec![BTreeSet::new(); agent_count];
        for (&v, &label) in vertices.iter().zip(&labels) {
            clusters[label].insert(v);
        }

        let set = PartitionSet::from_clusters(clusters);
        debug!(
            strategy = self.name(),
            partitions = set.len(),
            seed = self.seed,
            "Partitioned waypoint graph"
        );
        Ok(set)
    }
}
