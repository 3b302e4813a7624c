//! Per-agent coordinator: runtime, replica, ledger and takeover in one place.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vigil_meeting::{MeetingId, MeetingPlan, MeetingPoint};
use vigil_stigmergy::Replica;
use vigil_topology::{AgentId, PartitionId, Tick, TravelEstimator, VertexId, WaypointGraph};

use crate::error::{Error, Result};
use crate::messages::{CoordinationMessage, Envelope};
use crate::ownership::OwnershipLedger;
use crate::runtime::{Conclusion, Directive, MeetingRuntime, MeetingView, Position, RuntimeEvent, RuntimeState, Upcoming};
use crate::takeover::{Reassignment, TakeoverContext, TakeoverStrategy};

/// Configuration for an agent coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Start a meeting before its tick once every participant is there.
    pub meet_early: bool,

    /// Re-broadcast the whole replica every this many ticks.
    /// Zero disables periodic refresh; meetings still refresh.
    pub refresh_ticks: Tick,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            meet_early: false,
            refresh_ticks: 0,
        }
    }
}

impl CoordinatorConfig {
    /// Enable or disable early meetings.
    #[must_use]
    pub fn with_meet_early(mut self, meet_early: bool) -> Self {
        self.meet_early = meet_early;
        self
    }

    /// Set the periodic refresh interval.
    #[must_use]
    pub fn with_refresh_ticks(mut self, ticks: Tick) -> Self {
        self.refresh_ticks = ticks;
        self
    }
}

/// Everything a coordinator reports about one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorEvent {
    Runtime(RuntimeEvent),
    /// The exchange window closed with everyone expected heard from
    Held {
        meeting: MeetingId,
        occurrence: u64,
        present: BTreeSet<AgentId>,
    },
    /// An expected participant was not heard from
    Missing {
        meeting: MeetingId,
        occurrence: u64,
        agent: AgentId,
    },
    /// This agent claimed a partition
    Takeover(Reassignment),
}

/// Output of [`AgentCoordinator::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutput {
    pub directive: Directive,
    pub outgoing: Vec<CoordinationMessage>,
    pub events: Vec<CoordinatorEvent>,
}

/// Plan lookups for the runtime from one agent's point of view.
struct PlanView<'a, E: ?Sized> {
    me: AgentId,
    plan: &'a MeetingPlan,
    owned: BTreeSet<PartitionId>,
    owners: BTreeMap<PartitionId, AgentId>,
    graph: &'a WaypointGraph,
    estimator: &'a E,
}

impl<E: TravelEstimator + ?Sized> MeetingView for PlanView<'_, E> {
    fn upcoming(&self, now: Tick, attended: &BTreeMap<MeetingId, u64>) -> Option<Upcoming> {
        let (meeting, occurrence, tick) = self.plan.next_meeting(&self.owned, now, attended)?;
        let vertex = self.plan.meeting(meeting)?.vertex;
        Some(Upcoming {
            meeting,
            occurrence,
            tick,
            vertex,
        })
    }

    fn expected(&self, meeting: MeetingId, tick: Tick) -> BTreeSet<AgentId> {
        let Some(point) = self.plan.meeting(meeting) else {
            return BTreeSet::new();
        };
        let owners: BTreeSet<AgentId> = point
            .partitions
            .iter()
            .filter_map(|p| self.owners.get(p).copied())
            .filter(|&a| a != self.me)
            .collect();
        owners
            .into_iter()
            .filter(|&a| !self.committed_elsewhere(a, point, tick))
            .collect()
    }

    fn occurrence_tick(&self, meeting: MeetingId, occurrence: u64) -> Option<Tick> {
        Some(self.plan.meeting(meeting)?.occurrence_tick(occurrence))
    }

    fn travel(&self, from: VertexId, to: VertexId) -> Option<Tick> {
        self.estimator.travel_ticks(self.graph, from, to)
    }
}

impl<E: TravelEstimator + ?Sized> PlanView<'_, E> {
    /// Whether `agent`'s other meetings keep it from `meeting` at `tick`.
    ///
    /// After a takeover an agent can hold partitions in meetings that share
    /// a tick, or sit too close together to walk between. This replays its
    /// schedule over the preceding period the way its runtime would: each
    /// occurrence still ahead when it is free is attended in `(tick, id)`
    /// order, late if the walk takes longer, and anything already past is
    /// skipped.
    fn committed_elsewhere(&self, agent: AgentId, meeting: &MeetingPoint, tick: Tick) -> bool {
        let held: BTreeSet<PartitionId> = self
            .owners
            .iter()
            .filter(|(_, owner)| **owner == agent)
            .map(|(p, _)| *p)
            .collect();
        let since = tick.saturating_sub(meeting.period);
        let mut schedule: Vec<(Tick, MeetingId, VertexId)> = self
            .plan
            .meetings_for_partitions(&held)
            .into_iter()
            .flat_map(|m| m.occurrences_between(since, tick).map(move |(_, t)| (t, m.id, m.vertex)))
            .filter(|&(t, id, _)| (t, id) < (tick, meeting.id))
            .collect();
        schedule.sort_unstable();

        let mut free_at = since;
        let mut last: Option<VertexId> = None;
        for (t, _, vertex) in schedule {
            if t < free_at {
                continue;
            }
            let Some(walk) = self.walk(last, vertex) else {
                continue;
            };
            free_at = t.max(free_at + walk) + 1;
            last = Some(vertex);
        }
        self.walk(last, meeting.vertex).map_or(true, |walk| free_at + walk > tick)
    }

    fn walk(&self, from: Option<VertexId>, to: VertexId) -> Option<Tick> {
        match from {
            Some(from) => self.travel(from, to),
            None => Some(0),
        }
    }
}

/// One agent's coordination layer.
///
/// Drives the meeting runtime, keeps the agent's stigmergy replica and
/// applies takeovers after meetings with missing participants. The
/// coordinator never moves the agent; it returns a [`Directive`] and the
/// messages to broadcast.
pub struct AgentCoordinator {
    agent: AgentId,
    plan: Arc<MeetingPlan>,
    ledger: OwnershipLedger,
    replica: Replica,
    runtime: MeetingRuntime,
    strategy: Box<dyn TakeoverStrategy + Send>,
    config: CoordinatorConfig,
    /// Replies queued by `receive`, sent next tick
    replies: Vec<CoordinationMessage>,
}

impl std::fmt::Debug for AgentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCoordinator")
            .field("agent", &self.agent)
            .field("state", &self.runtime.state())
            .field("strategy", &self.strategy.name())
            .field("replica", &self.replica.digest())
            .finish()
    }
}

impl AgentCoordinator {
    pub fn new(
        agent: AgentId,
        plan: Arc<MeetingPlan>,
        strategy: Box<dyn TakeoverStrategy + Send>,
        config: CoordinatorConfig,
    ) -> Self {
        let ledger = OwnershipLedger::from_partitions(&plan.partitions);
        Self {
            agent,
            ledger,
            replica: Replica::new(agent),
            runtime: MeetingRuntime::new(agent, config.meet_early),
            strategy,
            config,
            plan,
            replies: Vec::new(),
        }
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    pub fn state(&self) -> RuntimeState {
        self.runtime.state()
    }

    pub fn replica(&self) -> &Replica {
        &self.replica
    }

    pub fn ledger(&self) -> &OwnershipLedger {
        &self.ledger
    }

    pub fn plan(&self) -> &MeetingPlan {
        &self.plan
    }

    /// Partitions this agent currently owns according to its replica.
    pub fn owned_partitions(&self) -> BTreeSet<PartitionId> {
        self.ledger.partitions_owned_by(&self.replica, self.agent)
    }

    /// Every vertex of every owned partition.
    pub fn patrol_vertices(&self) -> BTreeSet<VertexId> {
        self.owned_partitions()
            .into_iter()
            .filter_map(|p| self.plan.partitions.get(p))
            .flat_map(|p| p.vertices.iter().copied())
            .collect()
    }

    /// Handle a message heard on the channel.
    pub fn receive(&mut self, envelope: &Envelope) -> Result<()> {
        if envelope.sender == self.agent {
            return Ok(());
        }
        match &envelope.message {
            CoordinationMessage::Stigmergy(message) => {
                let receipt = self.replica.receive(message.clone());
                debug!(agent = %self.agent, sender = %envelope.sender, key = %message.key(), ?receipt, "Stigmergy message");
            }
            message => {
                let Some((meeting_id, _)) = message.meeting() else {
                    return Ok(());
                };
                let meeting = self.plan.meeting(meeting_id).ok_or(Error::UnknownMeeting(meeting_id))?;
                let owned = self.owned_partitions();
                let participates = meeting.partitions.iter().any(|p| owned.contains(p));
                if let Some(reply) = self.runtime.receive(envelope.sender, message, participates) {
                    self.replies.push(reply);
                }
            }
        }
        Ok(())
    }

    /// Advance one tick.
    ///
    /// `candidate` is the patrol policy's next vertex; it is returned as the
    /// directive unless a meeting takes precedence.
    pub fn tick<E: TravelEstimator + ?Sized>(
        &mut self,
        now: Tick,
        position: Position,
        candidate: VertexId,
        graph: &WaypointGraph,
        estimator: &E,
    ) -> TickOutput {
        let plan = Arc::clone(&self.plan);
        let owners = self.ledger.owners(&self.replica);
        let view = PlanView {
            me: self.agent,
            plan: &plan,
            owned: owners
                .iter()
                .filter(|(_, a)| **a == self.agent)
                .map(|(p, _)| *p)
                .collect(),
            owners,
            graph,
            estimator,
        };

        let step = self.runtime.tick(now, position, candidate, &view);
        let mut events: Vec<CoordinatorEvent> = step.events.into_iter().map(CoordinatorEvent::Runtime).collect();
        let mut outgoing = std::mem::take(&mut self.replies);
        outgoing.extend(step.outgoing);

        if let Some(conclusion) = step.concluded {
            self.conclude(conclusion, &view, &mut events);
        }

        let refresh = self.config.refresh_ticks > 0 && now > 0 && now % self.config.refresh_ticks == 0;
        if step.exchange_opened || refresh {
            self.replica.rebroadcast_all();
        }
        outgoing.extend(self.replica.drain_outbox().into_iter().map(CoordinationMessage::Stigmergy));

        TickOutput {
            directive: step.directive,
            outgoing,
            events,
        }
    }

    fn conclude<E: TravelEstimator + ?Sized>(
        &mut self,
        conclusion: Conclusion,
        view: &PlanView<'_, E>,
        events: &mut Vec<CoordinatorEvent>,
    ) {
        let Conclusion {
            meeting: meeting_id,
            occurrence,
            heard,
        } = conclusion;
        let Some(meeting) = view.plan.meeting(meeting_id) else {
            warn!(agent = %self.agent, meeting = %meeting_id, "Concluded a meeting missing from the plan");
            return;
        };
        let owners = &view.owners;

        let expected = view.expected(meeting_id, meeting.occurrence_tick(occurrence));
        let missing: BTreeSet<AgentId> = expected.difference(&heard).copied().collect();
        let mut present: BTreeSet<AgentId> = heard;
        present.insert(self.agent);

        if missing.is_empty() {
            debug!(agent = %self.agent, meeting = %meeting_id, occurrence, present = present.len(), "Meeting held");
            events.push(CoordinatorEvent::Held {
                meeting: meeting_id,
                occurrence,
                present,
            });
            return;
        }

        for &agent in &missing {
            warn!(me = %self.agent, meeting = %meeting_id, occurrence, %agent, "Participant missing");
            events.push(CoordinatorEvent::Missing {
                meeting: meeting_id,
                occurrence,
                agent,
            });
        }

        let sizes: BTreeMap<PartitionId, usize> = view.plan.partitions.iter().map(|p| (p.id, p.len())).collect();
        let ctx = TakeoverContext {
            me: self.agent,
            meeting,
            present: &present,
            missing: &missing,
            owners,
            sizes: &sizes,
        };
        let claims = self.strategy.on_missing_participants(&ctx);

        for claim in claims {
            if claim.to != self.agent || owners.get(&claim.partition) != Some(&claim.from) {
                continue;
            }
            info!(
                agent = %self.agent,
                partition = %claim.partition,
                from = %claim.from,
                strategy = self.strategy.name(),
                "Taking over partition"
            );
            self.ledger.assign(&mut self.replica, claim.partition, self.agent);
            events.push(CoordinatorEvent::Takeover(claim));
        }
    }
}
