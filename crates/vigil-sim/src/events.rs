//! Track events for external logging and visualization.
//!
//! Events are recorded after the fact and never read back by coordination.

use serde::{Deserialize, Serialize};
use vigil_meeting::MeetingId;
use vigil_protocols::{CoordinatorEvent, RuntimeEvent};
use vigil_topology::{AgentId, PartitionId, Tick, VertexId};

/// Observable things that happen during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackEvent {
    /// An agent arrived at a vertex
    VertexVisited { agent: AgentId, vertex: VertexId, tick: Tick },

    /// An agent left its patrol route for a meeting
    MeetingDiverted {
        agent: AgentId,
        meeting: MeetingId,
        occurrence: u64,
        scheduled: Tick,
        tick: Tick,
    },

    /// An agent reached a meeting early and is waiting
    MeetingWaiting {
        agent: AgentId,
        meeting: MeetingId,
        occurrence: u64,
        scheduled: Tick,
        tick: Tick,
    },

    /// An agent reached a meeting after its scheduled tick
    MeetingOverrun {
        agent: AgentId,
        meeting: MeetingId,
        occurrence: u64,
        scheduled: Tick,
        tick: Tick,
    },

    /// An agent could not reach a meeting vertex and skipped the occurrence
    MeetingSkipped {
        agent: AgentId,
        meeting: MeetingId,
        occurrence: u64,
        tick: Tick,
    },

    /// An agent opened its exchange window
    ExchangeStarted {
        agent: AgentId,
        meeting: MeetingId,
        occurrence: u64,
        tick: Tick,
    },

    /// An agent's exchange closed with every expected participant heard
    MeetingHeld {
        agent: AgentId,
        meeting: MeetingId,
        occurrence: u64,
        present: Vec<AgentId>,
        tick: Tick,
    },

    /// `reporter` did not hear from `missing` at a meeting
    AgentMissing {
        reporter: AgentId,
        missing: AgentId,
        meeting: MeetingId,
        occurrence: u64,
        tick: Tick,
    },

    /// A partition changed hands
    PartitionTakeover {
        partition: PartitionId,
        from: AgentId,
        to: AgentId,
        tick: Tick,
    },

    /// Fault injection removed an agent
    AgentRemoved { agent: AgentId, tick: Tick },
}

impl TrackEvent {
    /// Tick the event happened on.
    pub fn tick(&self) -> Tick {
        match self {
            Self::VertexVisited { tick, .. }
            | Self::MeetingDiverted { tick, .. }
            | Self::MeetingWaiting { tick, .. }
            | Self::MeetingOverrun { tick, .. }
            | Self::MeetingSkipped { tick, .. }
            | Self::ExchangeStarted { tick, .. }
            | Self::MeetingHeld { tick, .. }
            | Self::AgentMissing { tick, .. }
            | Self::PartitionTakeover { tick, .. }
            | Self::AgentRemoved { tick, .. } => *tick,
        }
    }

    /// Translate a coordinator event reported by `agent`.
    pub fn from_coordinator(agent: AgentId, tick: Tick, event: CoordinatorEvent) -> Self {
        match event {
            CoordinatorEvent::Runtime(RuntimeEvent::Diverted {
                meeting,
                occurrence,
                scheduled,
                ..
            }) => Self::MeetingDiverted {
                agent,
                meeting,
                occurrence,
                scheduled,
                tick,
            },
            CoordinatorEvent::Runtime(RuntimeEvent::Waiting {
                meeting,
                occurrence,
                scheduled,
            }) => Self::MeetingWaiting {
                agent,
                meeting,
                occurrence,
                scheduled,
                tick,
            },
            CoordinatorEvent::Runtime(RuntimeEvent::Overrun {
                meeting,
                occurrence,
                scheduled,
                ..
            }) => Self::MeetingOverrun {
                agent,
                meeting,
                occurrence,
                scheduled,
                tick,
            },
            CoordinatorEvent::Runtime(RuntimeEvent::Skipped { meeting, occurrence }) => Self::MeetingSkipped {
                agent,
                meeting,
                occurrence,
                tick,
            },
            CoordinatorEvent::Runtime(RuntimeEvent::ExchangeStarted { meeting, occurrence }) => Self::ExchangeStarted {
                agent,
                meeting,
                occurrence,
                tick,
            },
            CoordinatorEvent::Held {
                meeting,
                occurrence,
                present,
            } => Self::MeetingHeld {
                agent,
                meeting,
                occurrence,
                present: present.into_iter().collect(),
                tick,
            },
            CoordinatorEvent::Missing {
                meeting,
                occurrence,
                agent: missing,
            } => Self::AgentMissing {
                reporter: agent,
                missing,
                meeting,
                occurrence,
                tick,
            },
            CoordinatorEvent::Takeover(r) => Self::PartitionTakeover {
                partition: r.partition,
                from: r.from,
                to: r.to,
                tick,
            },
        }
    }
}
