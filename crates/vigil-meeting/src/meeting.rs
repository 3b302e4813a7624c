//! Meeting points and occurrence arithmetic.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use vigil_topology::{AgentId, PartitionId, Tick, VertexId};

/// Meeting identifier, stable for one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct MeetingId(pub u32);

impl std::fmt::Display for MeetingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// A recurring rendezvous at a shared waypoint.
///
/// Occurrence `i` happens at `first_tick + i * period`. Everything an agent
/// needs to find its next meeting is computable from `(now, first_tick,
/// period)` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingPoint {
    pub id: MeetingId,
    pub vertex: VertexId,
    /// Partitions containing the vertex
    pub partitions: BTreeSet<PartitionId>,
    /// Original owners of those partitions
    pub participants: BTreeSet<AgentId>,
    /// Conflict-graph color
    pub color: usize,
    /// `color * global_interval`
    pub offset: Tick,
    pub first_tick: Tick,
    /// Ticks between occurrences (never zero)
    pub period: Tick,
}

impl MeetingPoint {
    /// Tick of occurrence `index`.
    pub fn occurrence_tick(&self, index: u64) -> Tick {
        self.first_tick.saturating_add(index.saturating_mul(self.period))
    }

    /// Index of the first occurrence at or after `now`:
    /// `ceil((now - first_tick) / period)`.
    pub fn occurrence_index(&self, now: Tick) -> u64 {
        if now <= self.first_tick {
            0
        } else {
            (now - self.first_tick).div_ceil(self.period.max(1))
        }
    }

    /// Next occurrence at or after `now`, skipping every cycle up to and
    /// including `attended`. Returns `(index, tick)`.
    ///
    /// For a fixed meeting, successive calls that pass the previously
    /// returned index as `attended` yield strictly increasing ticks.
    pub fn next_occurrence(&self, now: Tick, attended: Option<u64>) -> (u64, Tick) {
        let mut index = self.occurrence_index(now);
        if let Some(done) = attended {
            index = index.max(done + 1);
        }
        (index, self.occurrence_tick(index))
    }

    /// Occurrences with ticks in `from..=to`, as `(index, tick)`.
    pub fn occurrences_between(&self, from: Tick, to: Tick) -> impl Iterator<Item = (u64, Tick)> + '_ {
        let end = if to < self.first_tick {
            0
        } else {
            (to - self.first_tick) / self.period.max(1) + 1
        };
        (self.occurrence_index(from)..end).map(move |index| (index, self.occurrence_tick(index)))
    }

    /// Check whether a partition takes part in this meeting.
    pub fn involves(&self, partition: PartitionId) -> bool {
        self.partitions.contains(&partition)
    }

    /// Check whether an agent was an original participant.
    pub fn has_participant(&self, agent: AgentId) -> bool {
        self.participants.contains(&agent)
    }
}
