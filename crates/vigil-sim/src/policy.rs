//! Patrol policies: which vertex to head for next.
//!
//! A policy only ever proposes a vertex from the agent's current patrol set
//! that is reachable from where the agent stands. Unreachable vertices are
//! skipped; when nothing is reachable the policy returns `None` and the
//! agent holds position.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use vigil_partition::patrol_cycle;
use vigil_topology::{AgentId, Tick, VertexId, WaypointGraph};

/// What a policy sees when choosing.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    pub agent: AgentId,
    pub current: VertexId,
    pub now: Tick,
    pub graph: &'a WaypointGraph,
    /// Vertices of every partition the agent currently owns
    pub vertices: &'a BTreeSet<VertexId>,
}

impl PolicyContext<'_> {
    fn reachable(&self, vertex: VertexId) -> bool {
        self.graph.distance(self.current, vertex).is_some()
    }
}

/// Pluggable patrol target selection.
pub trait PatrolPolicy {
    /// Short policy name for logs.
    fn name(&self) -> &'static str;

    /// Next vertex to patrol toward.
    fn next_vertex(&mut self, ctx: &PolicyContext<'_>) -> Option<VertexId>;
}

/// Walk the Christofides cycle of the patrol set.
///
/// The cycle is recomputed whenever the patrol set changes, e.g. after a
/// takeover. An agent off the cycle first heads for the nearest cycle vertex.
#[derive(Debug, Clone, Default)]
pub struct CyclePolicy {
    vertices: BTreeSet<VertexId>,
    cycle: Vec<VertexId>,
}

impl CyclePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cycle order.
    pub fn cycle(&self) -> &[VertexId] {
        &self.cycle
    }
}

impl PatrolPolicy for CyclePolicy {
    fn name(&self) -> &'static str {
        "cycle"
    }

    fn next_vertex(&mut self, ctx: &PolicyContext<'_>) -> Option<VertexId> {
        if *ctx.vertices != self.vertices {
            self.vertices = ctx.vertices.clone();
            self.cycle = patrol_cycle(ctx.graph, ctx.vertices);
        }
        if self.cycle.len() == 1 {
            return Some(self.cycle[0]).filter(|&v| ctx.reachable(v));
        }

        match self.cycle.iter().position(|&v| v == ctx.current) {
            Some(at) => (1..self.cycle.len())
                .map(|step| self.cycle[(at + step) % self.cycle.len()])
                .find(|&v| ctx.reachable(v)),
            None => self
                .cycle
                .iter()
                .filter_map(|&v| ctx.graph.distance(ctx.current, v).map(|d| (d, v)))
                .min()
                .map(|(_, v)| v),
        }
    }
}

/// Head for the vertex that has gone unvisited the longest.
///
/// Never-visited vertices come first. Ties go to the closer vertex, then the
/// lower id.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdlenessPolicy;

impl PatrolPolicy for IdlenessPolicy {
    fn name(&self) -> &'static str {
        "idleness"
    }

    fn next_vertex(&mut self, ctx: &PolicyContext<'_>) -> Option<VertexId> {
        let candidates = || ctx.vertices.iter().copied().filter(|&v| v != ctx.current || ctx.vertices.len() == 1);
        candidates()
            .filter_map(|v| {
                let distance = ctx.graph.distance(ctx.current, v)?;
                // Never visited sorts before any visit
                let last = ctx.graph.last_visited(v).map_or(0, |t| t + 1);
                Some((last, distance, v))
            })
            .min()
            .map(|(_, _, v)| v)
    }
}

/// Pick a reachable vertex uniformly at random.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl PatrolPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn next_vertex(&mut self, ctx: &PolicyContext<'_>) -> Option<VertexId> {
        let choices: Vec<VertexId> = ctx
            .vertices
            .iter()
            .copied()
            .filter(|&v| (v != ctx.current || ctx.vertices.len() == 1) && ctx.reachable(v))
            .collect();
        choices.choose(&mut self.rng).copied()
    }
}
