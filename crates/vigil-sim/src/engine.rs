//! Per-agent patrol engine.
//!
//! Each tick the engine advances movement, asks the patrol policy for a
//! target when the previous one was reached, lets the coordinator override
//! it and then starts the next edge toward whatever target won. Edges take
//! `ceil(cost / speed)` ticks, the same quantization the travel estimator
//! uses, so meeting arrival estimates are exact.

use tracing::{trace, warn};
use vigil_protocols::{AgentCoordinator, Directive, Position, TickOutput};
use vigil_topology::{AgentId, ConstantSpeed, Tick, TravelEstimator, VertexId, WaypointGraph};

use crate::channel::Location;
use crate::policy::{PatrolPolicy, PolicyContext};

/// An edge being traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    pub from: VertexId,
    pub to: VertexId,
    pub total: Tick,
    pub remaining: Tick,
}

/// Result of one engine step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStep {
    /// Vertex arrived at this tick
    pub arrived: Option<VertexId>,
    pub coordination: TickOutput,
}

/// Drives one agent.
pub struct PatrolEngine {
    coordinator: AgentCoordinator,
    policy: Box<dyn PatrolPolicy + Send>,
    /// Last vertex stood on
    at: VertexId,
    leg: Option<Leg>,
    /// Policy's current target, kept across meeting diversions
    patrol_target: Option<VertexId>,
    /// Target chosen by the last directive
    heading_for: Option<VertexId>,
}

impl std::fmt::Debug for PatrolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatrolEngine")
            .field("agent", &self.coordinator.agent())
            .field("policy", &self.policy.name())
            .field("at", &self.at)
            .field("leg", &self.leg)
            .field("patrol_target", &self.patrol_target)
            .finish()
    }
}

impl PatrolEngine {
    /// Place an agent on `start`.
    pub fn new(coordinator: AgentCoordinator, policy: Box<dyn PatrolPolicy + Send>, start: VertexId) -> Self {
        Self {
            coordinator,
            policy,
            at: start,
            leg: None,
            patrol_target: None,
            heading_for: None,
        }
    }

    pub fn agent(&self) -> AgentId {
        self.coordinator.agent()
    }

    pub fn coordinator(&self) -> &AgentCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut AgentCoordinator {
        &mut self.coordinator
    }

    /// Vertex the agent stands on, `None` while on an edge.
    pub fn vertex(&self) -> Option<VertexId> {
        self.leg.is_none().then_some(self.at)
    }

    /// Edge being traversed, if any.
    pub fn leg(&self) -> Option<Leg> {
        self.leg
    }

    /// Where the agent is on the plane.
    pub fn location(&self, graph: &WaypointGraph) -> Location {
        let Ok(from) = graph.position(self.at) else {
            return (0.0, 0.0);
        };
        match self.leg {
            Some(leg) => {
                let to = graph.position(leg.to).unwrap_or(from);
                let done = (leg.total - leg.remaining) as f64 / leg.total.max(1) as f64;
                from.lerp(&to, done)
            }
            None => (from.x as f64, from.y as f64),
        }
    }

    fn position(&self) -> Position {
        match self.leg {
            Some(leg) => Position::moving(leg.to, leg.remaining),
            None => Position::at(self.at),
        }
    }

    /// Advance one tick.
    pub fn step(&mut self, now: Tick, graph: &WaypointGraph, speed: &ConstantSpeed) -> EngineStep {
        let arrived = self.advance();

        let candidate = self.candidate(now, graph);
        let coordination = self.coordinator.tick(now, self.position(), candidate, graph, speed);

        self.heading_for = match coordination.directive {
            Directive::Patrol(v) | Directive::Divert(v) => Some(v),
            Directive::Hold => None,
        };
        if self.leg.is_none() {
            self.start_leg(graph, speed);
        }

        EngineStep { arrived, coordination }
    }

    fn advance(&mut self) -> Option<VertexId> {
        let leg = self.leg.as_mut()?;
        leg.remaining = leg.remaining.saturating_sub(1);
        if leg.remaining > 0 {
            return None;
        }
        let to = leg.to;
        self.at = to;
        self.leg = None;
        Some(to)
    }

    /// The policy's proposal, asked for only once the last one is reached
    /// or dropped out of the patrol set.
    fn candidate(&mut self, now: Tick, graph: &WaypointGraph) -> VertexId {
        let anchor = self.leg.map_or(self.at, |l| l.to);
        let vertices = self.coordinator.patrol_vertices();

        let stale = match self.patrol_target {
            None => true,
            Some(t) => (self.leg.is_none() && t == self.at) || !vertices.contains(&t),
        };
        if stale {
            let ctx = PolicyContext {
                agent: self.agent(),
                current: anchor,
                now,
                graph,
                vertices: &vertices,
            };
            self.patrol_target = self.policy.next_vertex(&ctx);
            trace!(agent = %self.agent(), target = ?self.patrol_target, policy = self.policy.name(), "New patrol target");
        }
        self.patrol_target.unwrap_or(anchor)
    }

    fn start_leg(&mut self, graph: &WaypointGraph, speed: &ConstantSpeed) {
        let Some(target) = self.heading_for.filter(|&t| t != self.at) else {
            return;
        };
        let next = match graph.path(self.at, target) {
            Ok(path) => path.get(1).copied(),
            Err(err) => {
                warn!(agent = %self.agent(), from = %self.at, to = %target, %err, "No path to target, dropping it");
                if self.patrol_target == Some(target) {
                    self.patrol_target = None;
                }
                None
            }
        };
        let Some(next) = next else {
            return;
        };
        let ticks = graph.edge_cost(self.at, next).map_or(1, |cost| speed.edge_ticks(cost));
        self.leg = Some(Leg {
            from: self.at,
            to: next,
            total: ticks,
            remaining: ticks,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CyclePolicy;
    use std::sync::Arc;
    use vigil_meeting::MeetingPlanner;
    use vigil_partition::PartitionSet;
    use vigil_protocols::{CoordinatorConfig, LoadBalancedTakeover};

    fn solo(graph: &WaypointGraph, speed: &ConstantSpeed) -> PatrolEngine {
        let partitions = PartitionSet::from_clusters(vec![graph.vertex_ids().collect()]);
        let plan = MeetingPlanner::new().plan(graph, speed, partitions).unwrap();
        let coordinator =
            AgentCoordinator::new(AgentId(0), Arc::new(plan), Box::new(LoadBalancedTakeover), CoordinatorConfig::default());
        PatrolEngine::new(coordinator, Box::new(CyclePolicy::new()), VertexId(0))
    }

    #[test]
    fn edges_take_quantized_ticks() {
        // Spacing 25 at speed 10: three ticks per edge
        let graph = WaypointGraph::grid(3, 1, 25).unwrap();
        let speed = ConstantSpeed::new(10);
        let mut engine = solo(&graph, &speed);

        let arrivals: Vec<(Tick, VertexId)> = (0..7)
            .filter_map(|t| engine.step(t, &graph, &speed).arrived.map(|v| (t, v)))
            .collect();
        assert_eq!(arrivals[0], (3, VertexId(1)));
        assert_eq!(arrivals[1].0, 6);
    }

    #[test]
    fn location_interpolates_along_edge() {
        let graph = WaypointGraph::grid(2, 1, 20).unwrap();
        let speed = ConstantSpeed::new(10);
        let mut engine = solo(&graph, &speed);

        engine.step(0, &graph, &speed);
        assert_eq!(engine.vertex(), None);
        assert_eq!(engine.location(&graph), (0.0, 0.0));
        engine.step(1, &graph, &speed);
        assert_eq!(engine.location(&graph), (10.0, 0.0));
        assert_eq!(engine.step(2, &graph, &speed).arrived, Some(VertexId(1)));
    }

    #[test]
    fn lone_agent_covers_its_partition() {
        let graph = WaypointGraph::grid(3, 3, 10).unwrap();
        let speed = ConstantSpeed::new(10);
        let mut engine = solo(&graph, &speed);

        let mut seen = std::collections::BTreeSet::new();
        for t in 0..40 {
            if let Some(v) = engine.step(t, &graph, &speed).arrived {
                seen.insert(v);
            }
        }
        assert_eq!(seen.len(), graph.len());
    }
}
