//! Scenario runner with event recording.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vigil_meeting::{MeetingPlan, MeetingPlanner};
use vigil_protocols::{AgentCoordinator, CoordinatorConfig, Envelope};
use vigil_topology::{AgentId, ConstantSpeed, PartitionId, Tick, VertexId, WaypointGraph};

use crate::channel::{BroadcastChannel, Location, RangeLimited};
use crate::config::{agent_seed, PolicyKind, ScenarioConfig};
use crate::engine::PatrolEngine;
use crate::error::Result;
use crate::events::TrackEvent;
use crate::policy::{CyclePolicy, IdlenessPolicy, PatrolPolicy, RandomPolicy};

/// Callback invoked on every vertex arrival.
pub type VisitSubscriber = Box<dyn FnMut(AgentId, VertexId, Tick) + Send>;

/// State of one agent at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent: AgentId,
    /// Vertex stood on, `None` while on an edge
    pub vertex: Option<VertexId>,
    pub location: Location,
    pub state: String,
    pub owned: Vec<PartitionId>,
    pub digest: String,
    pub removed: bool,
}

/// The whole fleet at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub tick: Tick,
    pub agents: Vec<AgentSnapshot>,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub ticks: Tick,
    pub visits: usize,
    /// Vertices nobody ever reached
    pub unvisited: usize,
    pub meetings_held: usize,
    pub overruns: usize,
    pub missing_reports: usize,
    pub takeovers: usize,
    /// Active agents hold identical replicas
    pub converged: bool,
    /// Partition owners as the lowest-id active agent sees them
    pub owners: BTreeMap<PartitionId, AgentId>,
    pub messages_sent: u64,
    pub messages_delivered: u64,
}

/// Runs a fleet of agents over one waypoint graph.
pub struct Simulation {
    config: ScenarioConfig,
    graph: WaypointGraph,
    speed: ConstantSpeed,
    plan: Arc<MeetingPlan>,
    engines: Vec<PatrolEngine>,
    channel: BroadcastChannel,
    removed: BTreeSet<AgentId>,
    events: Vec<TrackEvent>,
    subscribers: Vec<VisitSubscriber>,
    now: Tick,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("now", &self.now)
            .field("agents", &self.engines.len())
            .field("removed", &self.removed)
            .field("events", &self.events.len())
            .finish()
    }
}

impl Simulation {
    /// Load the configured map and set up the scenario.
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        config.validate()?;
        let graph = config.map.load()?;
        Self::with_graph(config, graph)
    }

    /// Set up a scenario over an already built graph; `config.map` is ignored.
    pub fn with_graph(config: ScenarioConfig, mut graph: WaypointGraph) -> Result<Self> {
        config.validate()?;
        let speed = ConstantSpeed::new(config.speed);

        let partitioner = config.partition_strategy.build(config.seed);
        let partitions = partitioner.partition(&graph, config.agent_count)?;
        let plan = MeetingPlanner::new()
            .with_interval_override(config.meeting_interval_override)
            .plan(&graph, &speed, partitions)?;
        plan.partitions.tag_graph(&mut graph)?;
        let plan = Arc::new(plan);

        info!(
            agents = config.agent_count,
            vertices = graph.len(),
            partitioner = partitioner.name(),
            meetings = plan.meetings.len(),
            interval = plan.global_interval,
            colors = plan.color_count,
            "Scenario ready"
        );

        let coordinator_config = CoordinatorConfig::default()
            .with_meet_early(config.meet_early)
            .with_refresh_ticks(config.stigmergy_refresh_ticks);

        let engines = plan
            .partitions
            .iter()
            .filter_map(|partition| {
                let agent = partition.owner;
                let start = partition.vertices.first().copied()?;
                let coordinator = AgentCoordinator::new(
                    agent,
                    plan.clone(),
                    config.takeover_strategy.build(config.seed, agent),
                    coordinator_config,
                );
                let policy: Box<dyn PatrolPolicy + Send> = match config.patrol_policy {
                    PolicyKind::Cycle => Box::new(CyclePolicy::new()),
                    PolicyKind::Idleness => Box::new(IdlenessPolicy),
                    PolicyKind::Random => Box::new(RandomPolicy::new(agent_seed(config.seed, agent))),
                };
                Some(PatrolEngine::new(coordinator, policy, start))
            })
            .collect();

        let channel = if config.comm_range.is_none() && config.delivery_probability >= 1.0 {
            BroadcastChannel::lossless()
        } else {
            BroadcastChannel::new(Box::new(RangeLimited::new(
                config.comm_range,
                config.delivery_probability,
                config.seed.wrapping_add(1),
            )))
        };

        Ok(Self {
            config,
            graph,
            speed,
            plan,
            engines,
            channel,
            removed: BTreeSet::new(),
            events: Vec::new(),
            subscribers: Vec::new(),
            now: 0,
        })
    }

    /// Register a vertex-visit observer.
    pub fn on_visit(&mut self, subscriber: impl FnMut(AgentId, VertexId, Tick) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Next tick to run.
    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn graph(&self) -> &WaypointGraph {
        &self.graph
    }

    pub fn plan(&self) -> &MeetingPlan {
        &self.plan
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn engines(&self) -> &[PatrolEngine] {
        &self.engines
    }

    /// Every track event so far.
    pub fn events(&self) -> &[TrackEvent] {
        &self.events
    }

    /// Remove an agent now. It stops moving and transmitting.
    pub fn remove_agent(&mut self, agent: AgentId) {
        if self.removed.insert(agent) {
            info!(%agent, tick = self.now, "Agent removed");
            self.events.push(TrackEvent::AgentRemoved { agent, tick: self.now });
        }
    }

    pub fn is_active(&self, agent: AgentId) -> bool {
        !self.removed.contains(&agent)
    }

    /// Run one tick.
    pub fn step(&mut self) {
        let now = self.now;

        let due: Vec<AgentId> = self
            .config
            .failures
            .iter()
            .filter(|f| f.tick == now)
            .map(|f| f.agent)
            .collect();
        for agent in due {
            self.remove_agent(agent);
        }

        self.deliver(now);

        for engine in self.engines.iter_mut() {
            let agent = engine.agent();
            if self.removed.contains(&agent) {
                continue;
            }

            let step = engine.step(now, &self.graph, &self.speed);

            if let Some(vertex) = step.arrived {
                if let Err(err) = self.graph.mark_visited(vertex, now) {
                    warn!(%agent, %vertex, %err, "Could not record visit");
                }
                for subscriber in self.subscribers.iter_mut() {
                    subscriber(agent, vertex, now);
                }
                self.events.push(TrackEvent::VertexVisited { agent, vertex, tick: now });
            }

            self.events.extend(
                step.coordination
                    .events
                    .into_iter()
                    .map(|e| TrackEvent::from_coordinator(agent, now, e)),
            );

            let origin = engine.location(&self.graph);
            for message in step.coordination.outgoing {
                match Envelope::new(agent, now, message).to_bytes() {
                    Ok(bytes) => self.channel.broadcast(agent, origin, now, bytes),
                    Err(err) => warn!(%agent, %err, "Could not encode message"),
                }
            }
        }

        self.now += 1;
    }

    fn deliver(&mut self, now: Tick) {
        let receivers: Vec<(AgentId, Location)> = self
            .engines
            .iter()
            .filter(|e| !self.removed.contains(&e.agent()))
            .map(|e| (e.agent(), e.location(&self.graph)))
            .collect();
        let mut inboxes = self.channel.deliver(now, &receivers);

        for engine in self.engines.iter_mut() {
            let agent = engine.agent();
            let Some(inbox) = inboxes.remove(&agent) else {
                continue;
            };
            for bytes in inbox {
                let envelope = match Envelope::from_bytes(&bytes) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        warn!(%agent, %err, "Dropping undecodable message");
                        continue;
                    }
                };
                if let Err(err) = engine.coordinator_mut().receive(&envelope) {
                    warn!(%agent, sender = %envelope.sender, %err, "Dropping message");
                }
            }
        }
    }

    /// Run until `max_ticks`, then summarize.
    pub fn run(&mut self) -> SimulationReport {
        while self.now < self.config.max_ticks {
            self.step();
            if self.now % 100 == 0 {
                debug!(tick = self.now, events = self.events.len(), "Simulation progress");
            }
        }
        let report = self.report();
        info!(
            ticks = report.ticks,
            visits = report.visits,
            meetings = report.meetings_held,
            takeovers = report.takeovers,
            converged = report.converged,
            "Simulation finished"
        );
        report
    }

    /// Current fleet state.
    pub fn snapshot(&self) -> SimulationSnapshot {
        let agents = self
            .engines
            .iter()
            .map(|engine| {
                let coordinator = engine.coordinator();
                AgentSnapshot {
                    agent: engine.agent(),
                    vertex: engine.vertex(),
                    location: engine.location(&self.graph),
                    state: coordinator.state().to_string(),
                    owned: coordinator.owned_partitions().into_iter().collect(),
                    digest: coordinator.replica().digest().to_string(),
                    removed: !self.is_active(engine.agent()),
                }
            })
            .collect();
        SimulationSnapshot { tick: self.now, agents }
    }

    /// Summary of the run so far.
    pub fn report(&self) -> SimulationReport {
        let count = |f: fn(&TrackEvent) -> bool| self.events.iter().filter(|e| f(e)).count();

        let active: Vec<&PatrolEngine> = self.engines.iter().filter(|e| self.is_active(e.agent())).collect();
        let converged = active
            .windows(2)
            .all(|w| w[0].coordinator().replica().digest() == w[1].coordinator().replica().digest());
        let owners = active
            .first()
            .map(|e| e.coordinator().ledger().owners(e.coordinator().replica()))
            .unwrap_or_default();

        SimulationReport {
            ticks: self.now,
            visits: count(|e| matches!(e, TrackEvent::VertexVisited { .. })),
            unvisited: self.graph.vertices().filter(|w| w.last_visited.is_none()).count(),
            meetings_held: count(|e| matches!(e, TrackEvent::MeetingHeld { .. })),
            overruns: count(|e| matches!(e, TrackEvent::MeetingOverrun { .. })),
            missing_reports: count(|e| matches!(e, TrackEvent::AgentMissing { .. })),
            takeovers: count(|e| matches!(e, TrackEvent::PartitionTakeover { .. })),
            converged,
            owners,
            messages_sent: self.channel.sent(),
            messages_delivered: self.channel.delivered(),
        }
    }
}
