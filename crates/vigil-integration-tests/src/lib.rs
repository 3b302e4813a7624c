//! Shared fixtures for the Vigil scenario tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use vigil_meeting::{MeetingPlan, MeetingPlanner};
use vigil_partition::PartitionSet;
use vigil_protocols::{AgentCoordinator, CoordinatorConfig, CoordinatorEvent, Envelope, Position, TakeoverStrategy};
use vigil_topology::{AgentId, ConstantSpeed, Tick, VertexId, WaypointGraph};

/// Vertex set from raw ids.
pub fn vertices(ids: &[u32]) -> BTreeSet<VertexId> {
    ids.iter().map(|&i| VertexId(i)).collect()
}

/// Plan meetings for hand-made clusters.
pub fn plan_for(graph: &WaypointGraph, speed: &ConstantSpeed, clusters: &[&[u32]]) -> Arc<MeetingPlan> {
    let partitions = PartitionSet::from_clusters(clusters.iter().map(|c| vertices(c)).collect());
    let plan = MeetingPlanner::new()
        .plan(graph, speed, partitions)
        .expect("fixture clusters are valid");
    Arc::new(plan)
}

/// One coordinator per listed agent.
pub fn coordinators(
    plan: &Arc<MeetingPlan>,
    agents: &[u32],
    strategy: impl Fn(AgentId) -> Box<dyn TakeoverStrategy + Send>,
) -> Vec<AgentCoordinator> {
    agents
        .iter()
        .map(|&i| AgentCoordinator::new(AgentId(i), plan.clone(), strategy(AgentId(i)), CoordinatorConfig::default()))
        .collect()
}

/// Drive coordinators parked on `vertex` over `ticks`, delivering every
/// message to everyone on the following tick. Returns all events.
pub fn run_parked(
    agents: &mut [AgentCoordinator],
    graph: &WaypointGraph,
    speed: &ConstantSpeed,
    vertex: VertexId,
    ticks: std::ops::RangeInclusive<Tick>,
) -> Vec<(AgentId, CoordinatorEvent)> {
    let mut events = Vec::new();
    let mut in_flight: Vec<Envelope> = Vec::new();

    for now in ticks {
        for envelope in std::mem::take(&mut in_flight) {
            for agent in agents.iter_mut() {
                agent.receive(&envelope).expect("fixture messages name planned meetings");
            }
        }
        for agent in agents.iter_mut() {
            let out = agent.tick(now, Position::at(vertex), vertex, graph, speed);
            let me = agent.agent();
            events.extend(out.events.into_iter().map(|e| (me, e)));
            in_flight.extend(out.outgoing.into_iter().map(|m| Envelope::new(me, now, m)));
        }
    }
    events
}
