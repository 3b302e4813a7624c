//! Property tests over random grids, fleets and write histories.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use vigil_meeting::{conflicts, MeetingId, MeetingPlanner, MeetingPoint};
use vigil_partition::{Partitioner, SingleCycle, SpectralBisection, SpectralKMeans};
use vigil_protocols::{LoadBalancedTakeover, TakeoverContext, TakeoverStrategy};
use vigil_stigmergy::Replica;
use vigil_topology::{AgentId, ConstantSpeed, PartitionId, VertexId, WaypointGraph};

fn partitioners(seed: u64) -> Vec<Box<dyn Partitioner>> {
    vec![
        Box::new(SpectralBisection::new()),
        Box::new(SpectralKMeans::new(seed)),
        Box::new(SingleCycle::new()),
    ]
}

/// Deliver every queued message to every other replica until nothing moves.
fn flood(replicas: &mut [Replica]) -> usize {
    for round in 0..64 {
        let mut queued = Vec::new();
        for (i, replica) in replicas.iter_mut().enumerate() {
            queued.extend(replica.drain_outbox().into_iter().map(|m| (i, m)));
        }
        if queued.is_empty() {
            return round;
        }
        for (from, message) in queued {
            for (i, replica) in replicas.iter_mut().enumerate() {
                if i != from {
                    replica.receive(message.clone());
                }
            }
        }
    }
    usize::MAX
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn partitions_cover_every_vertex_once(
        cols in 2u32..6,
        rows in 1u32..5,
        agents in 1usize..5,
        seed in any::<u64>(),
    ) {
        let graph = WaypointGraph::grid(cols, rows, 10).unwrap();
        let agents = agents.min(graph.len());
        let all: BTreeSet<VertexId> = graph.vertex_ids().collect();

        for partitioner in partitioners(seed) {
            let set = partitioner.partition(&graph, agents).unwrap();
            prop_assert_eq!(set.len(), agents, "{}", partitioner.name());
            prop_assert!(set.iter().all(|p| !p.is_empty()));
            prop_assert_eq!(set.coverage(), all.clone());
            let total: usize = set.iter().map(|p| p.len()).sum();
            prop_assert_eq!(total, all.len(), "{} overlaps", partitioner.name());
        }
    }

    #[test]
    fn planned_meetings_never_double_book_an_agent(
        cols in 2u32..6,
        rows in 2u32..5,
        agents in 2usize..5,
        seed in any::<u64>(),
    ) {
        let graph = WaypointGraph::grid(cols, rows, 10).unwrap();
        let speed = ConstantSpeed::new(10);
        let agents = agents.min(graph.len());

        for partitioner in partitioners(seed) {
            let set = partitioner.partition(&graph, agents).unwrap();
            let plan = MeetingPlanner::new().plan(&graph, &speed, set).unwrap();

            prop_assert!(plan.global_interval >= 1);
            for m in &plan.meetings {
                prop_assert!(m.partitions.len() >= 2);
                for p in &m.partitions {
                    prop_assert!(plan.partitions.get(*p).unwrap().contains(m.vertex));
                }
                prop_assert_eq!(m.offset, m.color as u64 * plan.global_interval);
                prop_assert_eq!(m.period, plan.global_interval * plan.color_count as u64);
            }
            for (i, a) in plan.meetings.iter().enumerate() {
                for b in &plan.meetings[i + 1..] {
                    if conflicts(&a.participants, &b.participants) {
                        prop_assert_ne!(a.color, b.color);
                        prop_assert_ne!(a.first_tick, b.first_tick);
                    }
                }
            }
        }
    }

    #[test]
    fn replicas_converge_after_flooding(
        writes in proptest::collection::vec((0u32..4, 0usize..3, 0u64..100), 1..20),
    ) {
        let mut replicas: Vec<Replica> = (0..4).map(|i| Replica::new(AgentId(i))).collect();
        for (agent, key, value) in writes {
            replicas[agent as usize].put(format!("key/{key}").as_str(), value);
        }

        let rounds = flood(&mut replicas);
        prop_assert!(rounds < 64, "flooding never settled");
        let digest = replicas[0].digest();
        for replica in &replicas[1..] {
            prop_assert_eq!(replica.digest(), digest);
        }
    }

    #[test]
    fn load_balanced_takeover_assigns_every_orphan_once(
        present in proptest::collection::btree_set(0u32..8, 1..4),
        missing in proptest::collection::btree_set(8u32..12, 1..4),
        sizes in proptest::collection::vec(1usize..10, 12),
    ) {
        let present: BTreeSet<AgentId> = present.into_iter().map(AgentId).collect();
        let missing: BTreeSet<AgentId> = missing.into_iter().map(AgentId).collect();
        let participants: BTreeSet<AgentId> = present.union(&missing).copied().collect();

        // Partition i starts with agent i
        let owners: BTreeMap<PartitionId, AgentId> =
            participants.iter().map(|a| (PartitionId(a.0), *a)).collect();
        let sizes: BTreeMap<PartitionId, usize> =
            owners.keys().map(|p| (*p, sizes[p.0 as usize])).collect();
        let meeting = MeetingPoint {
            id: MeetingId(0),
            vertex: VertexId(0),
            partitions: owners.keys().copied().collect(),
            participants,
            color: 0,
            offset: 0,
            first_tick: 1,
            period: 1,
        };

        let mut claimed: BTreeMap<PartitionId, Vec<AgentId>> = BTreeMap::new();
        for &me in &present {
            let ctx = TakeoverContext {
                me,
                meeting: &meeting,
                present: &present,
                missing: &missing,
                owners: &owners,
                sizes: &sizes,
            };
            for r in LoadBalancedTakeover.on_missing_participants(&ctx) {
                prop_assert_eq!(r.to, me);
                prop_assert!(missing.contains(&r.from));
                claimed.entry(r.partition).or_default().push(me);
            }
        }

        let orphaned: BTreeSet<PartitionId> = missing.iter().map(|a| PartitionId(a.0)).collect();
        prop_assert_eq!(claimed.keys().copied().collect::<BTreeSet<_>>(), orphaned);
        prop_assert!(claimed.values().all(|claimers| claimers.len() == 1));
    }
}
