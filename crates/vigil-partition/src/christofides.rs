//! Christofides patrol-cycle ordering.
//!
//! Orders a vertex set into a single closed tour:
//!
//! 1. Minimum spanning tree of the complete graph over the vertices
//! 2. Odd-degree vertices of the tree
//! 3. Greedy nearest-unmatched pairing of the odd vertices
//! 4. Eulerian circuit over tree + pairing (Hierholzer stack walk)
//! 5. Shortcut repeated vertices
//!
//! The pairing is greedy rather than a minimum-weight perfect matching, so
//! the result is an approximation. It is always a valid cycle visiting every
//! vertex exactly once.

use std::collections::BTreeSet;

use petgraph::algo::min_spanning_tree;
use petgraph::data::Element;
use petgraph::graph::UnGraph;
use tracing::trace;
use vigil_topology::{VertexId, WaypointGraph};

/// Cost used for pairs with no path between them.
pub const UNREACHABLE_COST: u64 = u64::MAX / 4;

/// Order `vertices` into a closed tour using `cost` as the pairwise metric.
///
/// Duplicates are ignored. The tour starts at the smallest vertex id and the
/// closing edge back to it is implicit.
pub fn christofides_cycle<F>(vertices: &[VertexId], cost: F) -> Vec<VertexId>
where
    F: Fn(VertexId, VertexId) -> u64,
{
    let ids: Vec<VertexId> = vertices.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    let n = ids.len();
    if n <= 2 {
        return ids;
    }

    let weight = |i: usize, j: usize| {
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        cost(ids[a], ids[b])
    };

    let mut complete = UnGraph::<VertexId, u64>::with_capacity(n, n * (n - 1) / 2);
    let nodes: Vec<_> = ids.iter().map(|&v| complete.add_node(v)).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            complete.add_edge(nodes[i], nodes[j], weight(i, j));
        }
    }

    // Multigraph as an edge list; node order of the MST matches `ids`
    let mut edges: Vec<(usize, usize)> = min_spanning_tree(&complete)
        .filter_map(|element| match element {
            Element::Edge { source, target, .. } => Some((source, target)),
            Element::Node { .. } => None,
        })
        .collect();

    let mut degree = vec![0usize; n];
    for &(a, b) in &edges {
        degree[a] += 1;
        degree[b] += 1;
    }
    let odd: Vec<usize> = (0..n).filter(|&i| degree[i] % 2 == 1).collect();
    trace!(vertices = n, odd = odd.len(), "Spanning tree built");

    edges.extend(greedy_pairing(&odd, &weight));

    let circuit = eulerian_circuit(n, &edges);

    let mut seen = vec![false; n];
    let tour: Vec<VertexId> = circuit
        .into_iter()
        .filter(|&i| !std::mem::replace(&mut seen[i], true))
        .map(|i| ids[i])
        .collect();

    debug_assert_eq!(tour.len(), n);
    tour
}

/// Pair every odd vertex with its nearest still-unpaired odd vertex.
fn greedy_pairing<W>(odd: &[usize], weight: &W) -> Vec<(usize, usize)>
where
    W: Fn(usize, usize) -> u64,
{
    let mut unpaired: BTreeSet<usize> = odd.iter().copied().collect();
    let mut pairs = Vec::with_capacity(odd.len() / 2);

    while let Some(a) = unpaired.pop_first() {
        let nearest = unpaired
            .iter()
            .copied()
            .min_by_key(|&b| (weight(a, b), b));
        if let Some(b) = nearest {
            unpaired.remove(&b);
            pairs.push((a, b));
        }
    }
    pairs
}

/// Hierholzer stack walk from vertex 0. Every vertex must have even degree.
fn eulerian_circuit(n: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (e, &(a, b)) in edges.iter().enumerate() {
        incident[a].push(e);
        incident[b].push(e);
    }

    let mut used = vec![false; edges.len()];
    let mut cursor = vec![0usize; n];
    let mut stack = vec![0usize];
    let mut circuit = Vec::with_capacity(edges.len() + 1);

    while let Some(&u) = stack.last() {
        while cursor[u] < incident[u].len() && used[incident[u][cursor[u]]] {
            cursor[u] += 1;
        }
        match incident[u].get(cursor[u]) {
            Some(&e) => {
                used[e] = true;
                let (a, b) = edges[e];
                stack.push(if a == u { b } else { a });
            }
            None => {
                circuit.push(u);
                stack.pop();
            }
        }
    }
    circuit
}

/// Total length of a closed tour, including the edge back to the start.
pub fn cycle_length<F>(cycle: &[VertexId], cost: F) -> u64
where
    F: Fn(VertexId, VertexId) -> u64,
{
    if cycle.len() < 2 {
        return 0;
    }
    let open: u64 = cycle
        .windows(2)
        .fold(0u64, |acc, w| acc.saturating_add(cost(w[0], w[1])));
    open.saturating_add(cost(cycle[cycle.len() - 1], cycle[0]))
}

/// Christofides tour over a set of waypoints using graph distances.
pub fn patrol_cycle(graph: &WaypointGraph, vertices: &BTreeSet<VertexId>) -> Vec<VertexId> {
    let ids: Vec<VertexId> = vertices.iter().copied().collect();
    christofides_cycle(&ids, |a, b| graph.distance(a, b).unwrap_or(UNREACHABLE_COST))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<VertexId> {
        raw.iter().map(|&i| VertexId(i)).collect()
    }

    fn table(d: [[u64; 4]; 4]) -> impl Fn(VertexId, VertexId) -> u64 {
        move |a, b| d[a.0 as usize][b.0 as usize]
    }

    fn permutations(items: &[VertexId]) -> Vec<Vec<VertexId>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn four_vertex_cycle_within_bound() {
        let d = [[0, 2, 3, 4], [2, 0, 2, 3], [3, 2, 0, 2], [4, 3, 2, 0]];
        let vertices = ids(&[0, 1, 2, 3]);

        let tour = christofides_cycle(&vertices, table(d));
        let unique: BTreeSet<_> = tour.iter().copied().collect();
        assert_eq!(tour.len(), 4);
        assert_eq!(unique.len(), 4);

        let optimal = permutations(&vertices)
            .iter()
            .map(|p| cycle_length(p, table(d)))
            .min()
            .unwrap();
        assert_eq!(optimal, 10);
        assert!(cycle_length(&tour, table(d)) * 2 <= optimal * 3);
    }

    #[test]
    fn trivial_inputs() {
        assert!(christofides_cycle(&[], |_, _| 1).is_empty());
        assert_eq!(christofides_cycle(&ids(&[4]), |_, _| 1), ids(&[4]));
        assert_eq!(christofides_cycle(&ids(&[7, 3, 7]), |_, _| 1), ids(&[3, 7]));
        assert_eq!(cycle_length(&ids(&[3, 7]), |_, _| 5), 10);
        assert_eq!(cycle_length(&ids(&[3]), |_, _| 5), 0);
    }

    #[test]
    fn ring_is_recovered() {
        // Eight waypoints on a ring; the tour should walk around it
        let graph = WaypointGraph::grid(4, 2, 10).unwrap();
        let all: BTreeSet<_> = graph.vertex_ids().collect();
        let tour = patrol_cycle(&graph, &all);

        assert_eq!(tour.len(), 8);
        assert_eq!(tour[0], VertexId(0));
        let length = cycle_length(&tour, |a, b| graph.distance(a, b).unwrap());
        // Optimal perimeter tour is 80
        assert!(length <= 120, "length {length}");
    }

    #[test]
    fn unreachable_pairs_still_yield_a_tour() {
        let graph = WaypointGraph::builder()
            .vertex(0, vigil_topology::Point::ORIGIN)
            .vertex(1, vigil_topology::Point::new(10, 0))
            .vertex(2, vigil_topology::Point::new(50, 0))
            .edge(0, 1)
            .build()
            .unwrap();
        let all: BTreeSet<_> = graph.vertex_ids().collect();
        let tour = patrol_cycle(&graph, &all);
        assert_eq!(tour.len(), 3);
        assert!(cycle_length(&tour, |a, b| graph.distance(a, b).unwrap_or(UNREACHABLE_COST)) > 0);
    }
}
