//! Vigil Protocols - Meetings, Presence and Takeover
//!
//! This crate turns a [`MeetingPlan`](vigil_meeting::MeetingPlan) into
//! per-agent behaviour:
//!
//! - [`MeetingRuntime`] decides each tick whether an agent keeps patrolling,
//!   diverts to a meeting, waits there, or exchanges information.
//! - [`OwnershipLedger`] reads and writes partition ownership in the
//!   agent's stigmergy [`Replica`](vigil_stigmergy::Replica).
//! - [`TakeoverStrategy`] decides who absorbs the partitions of agents that
//!   failed to show up.
//! - [`AgentCoordinator`] ties the three together for one agent.
//!
//! # Presence
//!
//! When an exchange opens, every participant broadcasts
//! [`CoordinationMessage::Presence`]. A participant that hears it answers
//! once with [`CoordinationMessage::PresenceReply`]. Any of the three meeting
//! messages counts as "heard from". The window closes one tick later and
//! expected participants that were never heard are missing.
//!
//! # Takeover
//!
//! Every present agent runs its strategy on the same inputs and only claims
//! for itself. Claims are stigmergy writes to `partition/<id>/<generation>`,
//! so simultaneous claims on one partition land on the same key and settle
//! to the lowest claimant like any other conflict.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut coordinator = AgentCoordinator::new(
//!     AgentId(0),
//!     plan.clone(),
//!     Box::new(LoadBalancedTakeover),
//!     CoordinatorConfig::default().with_meet_early(true),
//! );
//!
//! let out = coordinator.tick(now, Position::at(here), next_patrol_vertex, &graph, &speed);
//! for message in out.outgoing {
//!     channel.broadcast(Envelope::new(coordinator.agent(), now, message));
//! }
//! ```

mod agent;
mod error;
mod messages;
mod ownership;
mod runtime;
mod takeover;

pub use agent::{AgentCoordinator, CoordinatorConfig, CoordinatorEvent, TickOutput};
pub use error::{Error, Result};
pub use messages::{CoordinationMessage, Envelope};
pub use ownership::{partition_key, OwnershipLedger};
pub use runtime::{
    Conclusion, Directive, MeetingRuntime, MeetingView, Position, RuntimeEvent, RuntimeState, Step, Upcoming,
};
pub use takeover::{LoadBalancedTakeover, RandomTakeover, Reassignment, TakeoverContext, TakeoverStrategy};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Arc;
    use vigil_meeting::{MeetingPlan, MeetingPlanner};
    use vigil_partition::PartitionSet;
    use vigil_topology::{AgentId, ConstantSpeed, PartitionId, VertexId, WaypointGraph};

    /// Three partitions on a 3x3 grid all meeting at the center vertex 4
    fn star() -> (WaypointGraph, Arc<MeetingPlan>, ConstantSpeed) {
        let graph = WaypointGraph::grid(3, 3, 10).unwrap();
        let speed = ConstantSpeed::new(10);
        let set = |ids: &[u32]| ids.iter().map(|&i| VertexId(i)).collect::<BTreeSet<_>>();
        let partitions = PartitionSet::from_clusters(vec![set(&[0, 1, 3, 4]), set(&[2, 4, 5]), set(&[4, 6, 7, 8])]);
        let plan = MeetingPlanner::new().plan(&graph, &speed, partitions).unwrap();
        (graph, Arc::new(plan), speed)
    }

    /// Run the given agents, all parked on vertex 4, through one meeting
    /// occurrence with lossless delivery among them. Returns every agent's
    /// takeover claims.
    fn run_meeting(agents: &mut [AgentCoordinator], graph: &WaypointGraph, speed: &ConstantSpeed) -> Vec<Reassignment> {
        let tick = agents[0].plan().meetings[0].first_tick;
        let mut claims = Vec::new();
        for now in tick..=tick + 2 {
            let mut sent = Vec::new();
            for a in agents.iter_mut() {
                let out = a.tick(now, Position::at(VertexId(4)), VertexId(4), graph, speed);
                for e in out.events {
                    if let CoordinatorEvent::Takeover(r) = e {
                        claims.push(r);
                    }
                }
                sent.extend(out.outgoing.into_iter().map(|m| Envelope::new(a.agent(), now, m)));
            }
            for envelope in &sent {
                for a in agents.iter_mut() {
                    a.receive(envelope).unwrap();
                }
            }
        }
        claims
    }

    #[test]
    fn single_meeting_at_shared_center() {
        let (_, plan, _) = star();
        assert_eq!(plan.meetings.len(), 1);
        assert_eq!(plan.meetings[0].vertex, VertexId(4));
        assert_eq!(plan.meetings[0].participants.len(), 3);
    }

    #[test]
    fn two_of_three_present_yields_one_absorber() {
        let (graph, plan, speed) = star();
        let mut agents: Vec<AgentCoordinator> = (0..2)
            .map(|i| {
                AgentCoordinator::new(AgentId(i), plan.clone(), Box::new(LoadBalancedTakeover), CoordinatorConfig::default())
            })
            .collect();

        let claims = run_meeting(&mut agents, &graph, &speed);

        // Partition 2 belonged to the silent agent 2; exactly one agent took it
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].partition, PartitionId(2));
        assert_eq!(claims[0].from, AgentId(2));

        // Agent 1 holds 3 vertices against agent 0's 4, so it absorbs
        assert_eq!(claims[0].to, AgentId(1));

        // Both replicas agree once the claim has spread
        let owner_0 = agents[0].ledger().owner_of(agents[0].replica(), PartitionId(2));
        let owner_1 = agents[1].ledger().owner_of(agents[1].replica(), PartitionId(2));
        assert_eq!(owner_0, Some(AgentId(1)));
        assert_eq!(owner_1, Some(AgentId(1)));
    }

    proptest! {
        #[test]
        fn random_takeover_claims_converge_to_one_owner(seeds in proptest::collection::vec(any::<u64>(), 2)) {
            let (graph, plan, speed) = star();
            let mut agents: Vec<AgentCoordinator> = seeds
                .iter()
                .enumerate()
                .map(|(i, &seed)| {
                    AgentCoordinator::new(
                        AgentId(i as u32),
                        plan.clone(),
                        Box::new(RandomTakeover::new(seed)),
                        CoordinatorConfig::default(),
                    )
                })
                .collect();

            run_meeting(&mut agents, &graph, &speed);

            let owners: Vec<BTreeMap<PartitionId, AgentId>> =
                agents.iter().map(|a| a.ledger().owners(a.replica())).collect();
            // Every partition has exactly one owner and both agents agree
            prop_assert_eq!(owners[0].len(), 3);
            prop_assert_eq!(&owners[0], &owners[1]);
            prop_assert_eq!(agents[0].replica().digest(), agents[1].replica().digest());
        }
    }
}
