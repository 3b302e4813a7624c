//! Meeting runtime: the per-tick rendezvous state machine.
//!
//! ```text
//!             divert condition holds
//! Patrolling ───────────────────────▶ DivertingToMeeting
//!     ▲                                   │ arrive before tick
//!     │                                   ├──────────────────▶ WaitingAtMeeting
//!     │                                   │ arrive at/after tick     │ tick reached, or
//!     │                                   ▼                          │ everyone already here
//!     └──── window closed ◀──────── ExchangingInfo ◀─────────────────┘
//! ```
//!
//! Waiting is an explicit state re-entered every tick, never a blocking call.
//! The exchange window is one tick: presence goes out when it opens and
//! whoever has not been heard from when it closes is missing. A meeting with
//! permanently absent peers therefore resolves one tick after it opens.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use vigil_meeting::MeetingId;
use vigil_topology::{AgentId, Tick, VertexId};

use crate::messages::CoordinationMessage;

/// A scheduled occurrence an agent is heading for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upcoming {
    pub meeting: MeetingId,
    pub occurrence: u64,
    pub tick: Tick,
    pub vertex: VertexId,
}

/// Runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeState {
    Patrolling,
    DivertingToMeeting(Upcoming),
    WaitingAtMeeting(Upcoming),
    ExchangingInfo { meeting: Upcoming, opened: Tick },
}

impl RuntimeState {
    /// Short state name for logs and snapshots.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Patrolling => "patrolling",
            Self::DivertingToMeeting(_) => "diverting",
            Self::WaitingAtMeeting(_) => "waiting",
            Self::ExchangingInfo { .. } => "exchanging",
        }
    }
}

impl std::fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the agent is this tick.
///
/// `anchor` is the vertex the agent stands on, or the one it is walking
/// toward, reached in `eta` ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub here: Option<VertexId>,
    pub anchor: VertexId,
    pub eta: Tick,
}

impl Position {
    /// Standing on a vertex.
    pub fn at(vertex: VertexId) -> Self {
        Self {
            here: Some(vertex),
            anchor: vertex,
            eta: 0,
        }
    }

    /// Walking toward `vertex`, arriving in `eta` ticks.
    pub fn moving(vertex: VertexId, eta: Tick) -> Self {
        Self {
            here: None,
            anchor: vertex,
            eta,
        }
    }
}

/// What the runtime asks of the world around it.
pub trait MeetingView {
    /// Soonest occurrence this agent should attend, skipping attended cycles.
    fn upcoming(&self, now: Tick, attended: &BTreeMap<MeetingId, u64>) -> Option<Upcoming>;

    /// Agents expected at the occurrence of `meeting` at `tick`, besides
    /// this one. Agents whose other meetings keep them away are left out.
    fn expected(&self, meeting: MeetingId, tick: Tick) -> BTreeSet<AgentId>;

    /// Scheduled tick of an occurrence, `None` for unknown meetings.
    fn occurrence_tick(&self, meeting: MeetingId, occurrence: u64) -> Option<Tick>;

    /// Travel time estimate, `None` if unreachable.
    fn travel(&self, from: VertexId, to: VertexId) -> Option<Tick>;
}

/// Where the agent should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Keep patrolling toward this vertex
    Patrol(VertexId),
    /// Head to the meeting vertex instead
    Divert(VertexId),
    /// Stay put
    Hold,
}

/// Observable runtime transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeEvent {
    Diverted { meeting: MeetingId, occurrence: u64, scheduled: Tick, vertex: VertexId },
    Waiting { meeting: MeetingId, occurrence: u64, scheduled: Tick },
    Overrun { meeting: MeetingId, occurrence: u64, scheduled: Tick, arrived: Tick },
    ExchangeStarted { meeting: MeetingId, occurrence: u64 },
    Skipped { meeting: MeetingId, occurrence: u64 },
}

/// A closed exchange window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conclusion {
    pub meeting: MeetingId,
    pub occurrence: u64,
    /// Everyone heard from for this occurrence
    pub heard: BTreeSet<AgentId>,
}

/// Output of one runtime tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub directive: Directive,
    pub outgoing: Vec<CoordinationMessage>,
    pub events: Vec<RuntimeEvent>,
    /// An exchange just opened; replicas should re-broadcast everything
    pub exchange_opened: bool,
    pub concluded: Option<Conclusion>,
}

impl Step {
    fn new(directive: Directive) -> Self {
        Self {
            directive,
            outgoing: Vec::new(),
            events: Vec::new(),
            exchange_opened: false,
            concluded: None,
        }
    }
}

type OccurrenceKey = (MeetingId, u64);

/// Per-agent meeting state machine.
#[derive(Debug, Clone)]
pub struct MeetingRuntime {
    agent: AgentId,
    meet_early: bool,
    state: RuntimeState,
    /// Last occurrence index held per meeting
    attended: BTreeMap<MeetingId, u64>,
    /// Presence, replies and early arrivals heard per occurrence
    heard: BTreeMap<OccurrenceKey, BTreeSet<AgentId>>,
    /// `AlreadyHere` senders per occurrence
    early: BTreeMap<OccurrenceKey, BTreeSet<AgentId>>,
    replied: BTreeSet<OccurrenceKey>,
}

impl MeetingRuntime {
    pub fn new(agent: AgentId, meet_early: bool) -> Self {
        Self {
            agent,
            meet_early,
            state: RuntimeState::Patrolling,
            attended: BTreeMap::new(),
            heard: BTreeMap::new(),
            early: BTreeMap::new(),
            replied: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn attended(&self) -> &BTreeMap<MeetingId, u64> {
        &self.attended
    }

    /// The occurrence the agent is committed to, if any.
    pub fn committed(&self) -> Option<Upcoming> {
        match self.state {
            RuntimeState::Patrolling => None,
            RuntimeState::DivertingToMeeting(up) | RuntimeState::WaitingAtMeeting(up) => Some(up),
            RuntimeState::ExchangingInfo { meeting, .. } => Some(meeting),
        }
    }

    /// Record a meeting message from a peer. Returns a reply to send, if
    /// any. `participates` says whether this agent currently holds one of
    /// the meeting's partitions; other meetings' traffic is dropped.
    pub fn receive(&mut self, sender: AgentId, message: &CoordinationMessage, participates: bool) -> Option<CoordinationMessage> {
        let (meeting, occurrence) = message.meeting()?;
        if sender == self.agent || !participates {
            return None;
        }
        if self.attended.get(&meeting).is_some_and(|&done| occurrence <= done) {
            trace!(agent = %self.agent, %sender, %meeting, occurrence, "Ignoring message for a past occurrence");
            return None;
        }

        let key = (meeting, occurrence);
        self.heard.entry(key).or_default().insert(sender);

        match message {
            CoordinationMessage::AlreadyHere { .. } => {
                self.early.entry(key).or_default().insert(sender);
                None
            }
            CoordinationMessage::Presence { .. } if self.replied.insert(key) => {
                trace!(agent = %self.agent, %sender, %meeting, occurrence, "Replying to presence");
                Some(CoordinationMessage::PresenceReply { meeting, occurrence })
            }
            _ => None,
        }
    }

    /// Advance one tick.
    pub fn tick(&mut self, now: Tick, position: Position, candidate: VertexId, view: &dyn MeetingView) -> Step {
        match self.state {
            RuntimeState::Patrolling => self.patrol(now, position, candidate, view),
            RuntimeState::DivertingToMeeting(up) => {
                if position.here == Some(up.vertex) {
                    self.arrive(now, up, view)
                } else {
                    Step::new(Directive::Divert(up.vertex))
                }
            }
            RuntimeState::WaitingAtMeeting(up) => {
                let mut step = Step::new(Directive::Hold);
                if now >= up.tick || self.everyone_here(up, view) {
                    self.open_exchange(now, up, &mut step);
                }
                step
            }
            RuntimeState::ExchangingInfo { meeting, opened } => {
                if now > opened {
                    let mut step = Step::new(Directive::Patrol(candidate));
                    step.concluded = Some(self.close_exchange(now, meeting, view));
                    step
                } else {
                    Step::new(Directive::Hold)
                }
            }
        }
    }

    fn patrol(&mut self, now: Tick, position: Position, candidate: VertexId, view: &dyn MeetingView) -> Step {
        let Some(up) = view.upcoming(now, &self.attended) else {
            return Step::new(Directive::Patrol(candidate));
        };

        let Some(direct) = view.travel(position.anchor, up.vertex) else {
            warn!(agent = %self.agent, meeting = %up.meeting, vertex = %up.vertex, "Meeting vertex unreachable, skipping occurrence");
            self.attended.insert(up.meeting, up.occurrence);
            let mut step = Step::new(Directive::Patrol(candidate));
            step.events.push(RuntimeEvent::Skipped {
                meeting: up.meeting,
                occurrence: up.occurrence,
            });
            return step;
        };

        // Ticks to reach the candidate, then from there to the meeting
        let via_candidate = view
            .travel(position.anchor, candidate)
            .zip(view.travel(candidate, up.vertex))
            .map(|(a, b)| position.eta + a + b)
            .unwrap_or(position.eta + direct);

        if now + via_candidate < up.tick {
            return Step::new(Directive::Patrol(candidate));
        }

        debug!(
            agent = %self.agent,
            meeting = %up.meeting,
            occurrence = up.occurrence,
            scheduled = up.tick,
            now,
            "Diverting to meeting"
        );
        self.state = RuntimeState::DivertingToMeeting(up);
        let mut step = if position.here == Some(up.vertex) {
            self.arrive(now, up, view)
        } else {
            Step::new(Directive::Divert(up.vertex))
        };
        step.events.insert(
            0,
            RuntimeEvent::Diverted {
                meeting: up.meeting,
                occurrence: up.occurrence,
                scheduled: up.tick,
                vertex: up.vertex,
            },
        );
        step
    }

    fn arrive(&mut self, now: Tick, up: Upcoming, view: &dyn MeetingView) -> Step {
        let mut step = Step::new(Directive::Hold);

        if now < up.tick {
            debug!(agent = %self.agent, meeting = %up.meeting, scheduled = up.tick, now, "Waiting at meeting");
            self.state = RuntimeState::WaitingAtMeeting(up);
            step.events.push(RuntimeEvent::Waiting {
                meeting: up.meeting,
                occurrence: up.occurrence,
                scheduled: up.tick,
            });
            if self.meet_early {
                step.outgoing.push(CoordinationMessage::AlreadyHere {
                    meeting: up.meeting,
                    occurrence: up.occurrence,
                });
                if self.everyone_here(up, view) {
                    self.open_exchange(now, up, &mut step);
                }
            }
            return step;
        }

        if now > up.tick {
            warn!(
                agent = %self.agent,
                meeting = %up.meeting,
                scheduled = up.tick,
                arrived = now,
                "Meeting overrun, exchanging late"
            );
            step.events.push(RuntimeEvent::Overrun {
                meeting: up.meeting,
                occurrence: up.occurrence,
                scheduled: up.tick,
                arrived: now,
            });
        }
        self.open_exchange(now, up, &mut step);
        step
    }

    /// Everyone expected has announced `AlreadyHere`. Only consulted with
    /// meet-early enabled.
    fn everyone_here(&self, up: Upcoming, view: &dyn MeetingView) -> bool {
        if !self.meet_early {
            return false;
        }
        let expected = view.expected(up.meeting, up.tick);
        let early = self.early.get(&(up.meeting, up.occurrence));
        expected.iter().all(|a| early.is_some_and(|e| e.contains(a)))
    }

    fn open_exchange(&mut self, now: Tick, up: Upcoming, step: &mut Step) {
        debug!(agent = %self.agent, meeting = %up.meeting, occurrence = up.occurrence, now, "Exchange window open");
        self.state = RuntimeState::ExchangingInfo { meeting: up, opened: now };
        step.directive = Directive::Hold;
        step.exchange_opened = true;
        step.outgoing.push(CoordinationMessage::Presence {
            meeting: up.meeting,
            occurrence: up.occurrence,
        });
        step.events.push(RuntimeEvent::ExchangeStarted {
            meeting: up.meeting,
            occurrence: up.occurrence,
        });
    }

    fn close_exchange(&mut self, now: Tick, up: Upcoming, view: &dyn MeetingView) -> Conclusion {
        let key = (up.meeting, up.occurrence);
        let heard = self.heard.remove(&key).unwrap_or_default();

        self.attended.insert(up.meeting, up.occurrence);
        self.state = RuntimeState::Patrolling;

        // Nothing before now can be booked again, whichever meeting it was
        let stale = |k: &OccurrenceKey| {
            (k.0 == up.meeting && k.1 <= up.occurrence) || view.occurrence_tick(k.0, k.1).map_or(true, |t| t < now)
        };
        self.heard.retain(|k, _| !stale(k));
        self.early.retain(|k, _| !stale(k));
        self.replied.retain(|k| !stale(k));

        debug!(agent = %self.agent, meeting = %up.meeting, occurrence = up.occurrence, heard = heard.len(), "Exchange window closed");
        Conclusion {
            meeting: up.meeting,
            occurrence: up.occurrence,
            heard,
        }
    }
}
