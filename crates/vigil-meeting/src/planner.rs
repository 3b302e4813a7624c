//! Meeting planning: shared vertices, repairs, intervals and offsets.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vigil_partition::PartitionSet;
use vigil_topology::{AgentId, PartitionId, Tick, TopologyError, TravelEstimator, VertexId, WaypointGraph};

use crate::coloring::{color_count, welsh_powell};
use crate::error::{PlanError, Result};
use crate::interval::partition_interval;
use crate::meeting::{MeetingId, MeetingPoint};

/// A manufactured meeting point between two touching partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repair {
    /// Partition that received both endpoints
    pub grown: PartitionId,
    pub other: PartitionId,
    pub edge: (VertexId, VertexId),
    pub cost: u64,
}

/// Make every pair of adjacent partitions share at least one vertex.
///
/// For each pair with no common vertex, the cheapest graph edge crossing
/// between them (ties by vertex ids) is found and both endpoints are added to
/// the smaller partition (ties: lower partition id). Pairs with no crossing
/// edge are left alone.
pub fn repair_adjacent_partitions(graph: &WaypointGraph, partitions: &mut PartitionSet) -> Vec<Repair> {
    let ids: Vec<PartitionId> = partitions.iter().map(|p| p.id).collect();
    let edges = graph.edges();
    let mut repairs = Vec::new();

    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            let (Some(pa), Some(pb)) = (partitions.get(a), partitions.get(b)) else {
                continue;
            };
            if pa.vertices.intersection(&pb.vertices).next().is_some() {
                continue;
            }

            let crossing = edges
                .iter()
                .filter(|&&(u, v, _)| (pa.contains(u) && pb.contains(v)) || (pa.contains(v) && pb.contains(u)))
                .min_by_key(|&&(u, v, cost)| (cost, u, v));
            let Some(&(u, v, cost)) = crossing else {
                continue;
            };

            let grown = if pa.len() <= pb.len() { a } else { b };
            let other = if grown == a { b } else { a };
            if let Some(p) = partitions.get_mut(grown) {
                p.vertices.insert(u);
                p.vertices.insert(v);
            }

            debug!(%grown, %other, %u, %v, cost, "Repaired partition pair with crossing edge");
            repairs.push(Repair {
                grown,
                other,
                edge: (u, v),
                cost,
            });
        }
    }
    repairs
}

/// Builds the meeting schedule for a partitioning.
#[derive(Debug, Clone, Default)]
pub struct MeetingPlanner {
    /// Replaces the computed global interval
    pub interval_override: Option<Tick>,
    /// Tick of the first color-0 occurrence; defaults to one global interval
    pub start_tick: Option<Tick>,
}

impl MeetingPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_interval_override(mut self, interval: Option<Tick>) -> Self {
        self.interval_override = interval;
        self
    }

    #[must_use]
    pub fn with_start_tick(mut self, tick: Tick) -> Self {
        self.start_tick = Some(tick);
        self
    }

    /// Plan meetings for `partitions`.
    ///
    /// Partitions are repaired first, so the returned plan owns the (possibly
    /// grown) partition set the agents must patrol.
    pub fn plan<E>(&self, graph: &WaypointGraph, estimator: &E, mut partitions: PartitionSet) -> Result<MeetingPlan>
    where
        E: TravelEstimator + ?Sized,
    {
        for partition in partitions.iter() {
            if partition.is_empty() {
                return Err(PlanError::EmptyPartition(partition.id));
            }
            if let Some(&v) = partition.vertices.iter().find(|&&v| !graph.contains(v)) {
                return Err(TopologyError::UnknownVertex(v).into());
            }
        }

        let repairs = repair_adjacent_partitions(graph, &mut partitions);

        // Every vertex in two or more partitions becomes a meeting point
        let mut sharing: BTreeMap<VertexId, BTreeSet<PartitionId>> = BTreeMap::new();
        for partition in partitions.iter() {
            for &v in &partition.vertices {
                sharing.entry(v).or_default().insert(partition.id);
            }
        }
        sharing.retain(|_, ps| ps.len() >= 2);

        let owners = partitions.original_owners();
        let candidates: Vec<(VertexId, BTreeSet<PartitionId>, BTreeSet<AgentId>)> = sharing
            .into_iter()
            .map(|(vertex, ps)| {
                let agents = ps.iter().filter_map(|p| owners.get(p).copied()).collect();
                (vertex, ps, agents)
            })
            .collect();

        let mut meeting_counts: BTreeMap<PartitionId, usize> = BTreeMap::new();
        for (_, ps, _) in &candidates {
            for &p in ps {
                *meeting_counts.entry(p).or_default() += 1;
            }
        }

        let computed = partitions
            .iter()
            .map(|p| {
                let count = meeting_counts.get(&p.id).copied().unwrap_or(0);
                partition_interval(graph, estimator, &p.vertices, count)
            })
            .max()
            .unwrap_or(0);
        let global_interval = self.interval_override.unwrap_or(computed).max(1);

        let participant_sets: Vec<BTreeSet<AgentId>> = candidates.iter().map(|(_, _, a)| a.clone()).collect();
        let colors = welsh_powell(&participant_sets);
        let colors_used = color_count(&colors).max(1);
        let period = global_interval * colors_used as Tick;
        let start = self.start_tick.unwrap_or(global_interval);

        let meetings: Vec<MeetingPoint> = candidates
            .into_iter()
            .zip(colors)
            .enumerate()
            .map(|(i, ((vertex, partitions, participants), color))| {
                let offset = color as Tick * global_interval;
                MeetingPoint {
                    id: MeetingId(i as u32),
                    vertex,
                    partitions,
                    participants,
                    color,
                    offset,
                    first_tick: start + offset,
                    period,
                }
            })
            .collect();

        info!(
            meetings = meetings.len(),
            repairs = repairs.len(),
            colors = colors_used,
            global_interval,
            computed_interval = computed,
            "Planned meeting schedule"
        );

        Ok(MeetingPlan {
            partitions,
            meetings,
            repairs,
            global_interval,
            color_count: colors_used,
        })
    }
}

/// The complete schedule shared by every agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingPlan {
    /// Partitions after repair
    pub partitions: PartitionSet,
    pub meetings: Vec<MeetingPoint>,
    pub repairs: Vec<Repair>,
    pub global_interval: Tick,
    pub color_count: usize,
}

impl MeetingPlan {
    /// Look up a meeting.
    pub fn meeting(&self, id: MeetingId) -> Option<&MeetingPoint> {
        self.meetings.get(id.0 as usize).filter(|m| m.id == id)
    }

    /// Meetings of a single partition.
    pub fn meetings_for_partition(&self, partition: PartitionId) -> Vec<&MeetingPoint> {
        self.meetings.iter().filter(|m| m.involves(partition)).collect()
    }

    /// Meetings involving any of `partitions` (an agent's current holdings).
    pub fn meetings_for_partitions(&self, partitions: &BTreeSet<PartitionId>) -> Vec<&MeetingPoint> {
        self.meetings
            .iter()
            .filter(|m| m.partitions.iter().any(|p| partitions.contains(p)))
            .collect()
    }

    /// Soonest upcoming occurrence among `partitions`' meetings.
    ///
    /// `attended` maps meetings to the last occurrence index already held.
    /// Ties break toward the lower meeting id.
    pub fn next_meeting(
        &self,
        partitions: &BTreeSet<PartitionId>,
        now: Tick,
        attended: &BTreeMap<MeetingId, u64>,
    ) -> Option<(MeetingId, u64, Tick)> {
        self.meetings_for_partitions(partitions)
            .into_iter()
            .map(|m| {
                let (index, tick) = m.next_occurrence(now, attended.get(&m.id).copied());
                (m.id, index, tick)
            })
            .min_by_key(|&(id, _, tick)| (tick, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_partition::{Partitioner, SpectralBisection};
    use vigil_topology::{ConstantSpeed, Point};

    fn set(ids: &[u32]) -> BTreeSet<VertexId> {
        ids.iter().map(|&i| VertexId(i)).collect()
    }

    #[test]
    fn one_shared_vertex_one_meeting() {
        // Line 0-1-2-3-4; partitions {0,1,2} and {2,3,4} share vertex 2
        let graph = WaypointGraph::grid(5, 1, 10).unwrap();
        let speed = ConstantSpeed::new(10);
        let partitions = PartitionSet::from_clusters(vec![set(&[0, 1, 2]), set(&[2, 3, 4])]);

        let plan = MeetingPlanner::new().plan(&graph, &speed, partitions).unwrap();

        assert_eq!(plan.meetings.len(), 1);
        assert!(plan.repairs.is_empty());
        let m = &plan.meetings[0];
        assert_eq!(m.vertex, VertexId(2));
        assert_eq!(m.participants, [AgentId(0), AgentId(1)].into_iter().collect());
        assert_eq!(m.offset, 0);

        // Each partition: 3 vertices, 1 meeting, 2 ticks across
        assert_eq!(plan.global_interval, 2 * 3 * 2);
        assert_eq!(m.period, plan.global_interval);
        assert_eq!(m.first_tick, plan.global_interval);
    }

    #[test]
    fn disjoint_neighbors_are_repaired() {
        let graph = WaypointGraph::grid(5, 1, 10).unwrap();
        let speed = ConstantSpeed::new(10);
        let partitions = PartitionSet::from_clusters(vec![set(&[0, 1]), set(&[2, 3, 4])]);

        let plan = MeetingPlanner::new().plan(&graph, &speed, partitions).unwrap();

        assert_eq!(plan.repairs.len(), 1);
        assert_eq!(plan.repairs[0].grown, PartitionId(0));
        assert_eq!(plan.repairs[0].edge, (VertexId(1), VertexId(2)));
        assert_eq!(plan.partitions.get(PartitionId(0)).unwrap().vertices, set(&[0, 1, 2]));
        assert_eq!(plan.meetings.len(), 1);
        assert_eq!(plan.meetings[0].vertex, VertexId(2));
    }

    #[test]
    fn far_apart_partitions_get_no_meeting() {
        let graph = WaypointGraph::builder()
            .vertex(0, Point::ORIGIN)
            .vertex(1, Point::new(10, 0))
            .vertex(2, Point::new(100, 0))
            .vertex(3, Point::new(110, 0))
            .edge(0, 1)
            .edge(2, 3)
            .build()
            .unwrap();
        let partitions = PartitionSet::from_clusters(vec![set(&[0, 1]), set(&[2, 3])]);
        let plan = MeetingPlanner::new()
            .plan(&graph, &ConstantSpeed::new(1), partitions)
            .unwrap();

        assert!(plan.meetings.is_empty());
        assert_eq!(plan.global_interval, 1);
    }

    #[test]
    fn shared_agent_meetings_are_offset() {
        // Three partitions in a row: p1 meets both neighbors
        let graph = WaypointGraph::grid(7, 1, 10).unwrap();
        let partitions = PartitionSet::from_clusters(vec![set(&[0, 1, 2]), set(&[2, 3, 4]), set(&[4, 5, 6])]);
        let plan = MeetingPlanner::new()
            .with_interval_override(Some(20))
            .plan(&graph, &ConstantSpeed::new(10), partitions)
            .unwrap();

        assert_eq!(plan.meetings.len(), 2);
        assert_eq!(plan.color_count, 2);
        let (a, b) = (&plan.meetings[0], &plan.meetings[1]);
        assert_eq!((a.offset, b.offset), (0, 20));
        assert_eq!(a.period, 40);

        // Occurrences of the two meetings never coincide
        let ticks_a: BTreeSet<Tick> = (0..10).map(|i| a.occurrence_tick(i)).collect();
        assert!((0..10).all(|i| !ticks_a.contains(&b.occurrence_tick(i))));

        let p1: BTreeSet<_> = [PartitionId(1)].into_iter().collect();
        assert_eq!(plan.meetings_for_partitions(&p1).len(), 2);
        assert_eq!(plan.next_meeting(&p1, 0, &BTreeMap::new()), Some((MeetingId(0), 0, 20)));
        assert_eq!(plan.meeting(MeetingId(1)).unwrap().vertex, VertexId(4));
    }

    #[test]
    fn bisection_output_gets_meetings() {
        let graph = WaypointGraph::grid(4, 4, 10).unwrap();
        let partitions = SpectralBisection::new().partition(&graph, 4).unwrap();
        let plan = MeetingPlanner::new()
            .plan(&graph, &ConstantSpeed::new(5), partitions)
            .unwrap();

        assert!(!plan.meetings.is_empty());
        for p in plan.partitions.iter() {
            assert!(!plan.meetings_for_partition(p.id).is_empty(), "{} has no meeting", p.id);
        }
    }

    #[test]
    fn empty_partition_rejected() {
        let graph = WaypointGraph::grid(2, 1, 10).unwrap();
        let mut partitions = PartitionSet::from_clusters(vec![set(&[0]), set(&[1])]);
        partitions.get_mut(PartitionId(1)).unwrap().vertices.clear();
        assert_eq!(
            MeetingPlanner::new().plan(&graph, &ConstantSpeed::new(1), partitions),
            Err(PlanError::EmptyPartition(PartitionId(1)))
        );
    }
}
