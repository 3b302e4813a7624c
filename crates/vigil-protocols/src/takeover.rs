//! Takeover strategies: who absorbs a missing agent's partitions.
//!
//! Every present agent runs its strategy independently after a meeting and
//! only ever claims partitions for itself. If two agents claim the same
//! partition, the stigmergy conflict resolver settles the race.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vigil_meeting::MeetingPoint;
use vigil_topology::{AgentId, PartitionId};

/// A partition changing hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub partition: PartitionId,
    pub from: AgentId,
    pub to: AgentId,
}

/// What a strategy knows when participants are missing.
#[derive(Debug, Clone, Copy)]
pub struct TakeoverContext<'a> {
    /// The deciding agent
    pub me: AgentId,
    pub meeting: &'a MeetingPoint,
    /// Includes `me`
    pub present: &'a BTreeSet<AgentId>,
    pub missing: &'a BTreeSet<AgentId>,
    /// Current owner of every partition
    pub owners: &'a BTreeMap<PartitionId, AgentId>,
    /// Vertex count of every partition
    pub sizes: &'a BTreeMap<PartitionId, usize>,
}

impl TakeoverContext<'_> {
    /// Everything `agent` currently holds, including partitions it absorbed
    /// away from this meeting.
    pub fn transferable(&self, agent: AgentId) -> Vec<PartitionId> {
        self.owners
            .iter()
            .filter(|(_, owner)| **owner == agent)
            .map(|(p, _)| *p)
            .collect()
    }

    /// Total vertices held by `agent`.
    pub fn load(&self, agent: AgentId) -> usize {
        self.owners
            .iter()
            .filter(|(_, owner)| **owner == agent)
            .map(|(p, _)| self.sizes.get(p).copied().unwrap_or(0))
            .sum()
    }

    fn claim(&self, missing: AgentId) -> Vec<Reassignment> {
        self.transferable(missing)
            .into_iter()
            .map(|partition| Reassignment {
                partition,
                from: missing,
                to: self.me,
            })
            .collect()
    }
}

/// Decides ownership reassignments when meeting participants are missing.
pub trait TakeoverStrategy {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    /// Reassignments this agent should make. Every returned entry has
    /// `to == ctx.me`.
    fn on_missing_participants(&mut self, ctx: &TakeoverContext<'_>) -> Vec<Reassignment>;
}

/// Pick one missing agent uniformly, or none with probability
/// `1 / (missing + 1)`, and absorb its partitions.
#[derive(Debug, Clone)]
pub struct RandomTakeover {
    rng: StdRng,
}

impl RandomTakeover {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl TakeoverStrategy for RandomTakeover {
    fn name(&self) -> &'static str {
        "random"
    }

    fn on_missing_participants(&mut self, ctx: &TakeoverContext<'_>) -> Vec<Reassignment> {
        let missing: Vec<AgentId> = ctx.missing.iter().copied().collect();
        let pick = self.rng.gen_range(0..=missing.len());
        match missing.get(pick) {
            Some(&agent) => {
                debug!(me = %ctx.me, %agent, "Random takeover chose agent");
                ctx.claim(agent)
            }
            None => Vec::new(),
        }
    }
}

/// Present agents holding fewer vertices absorb first.
///
/// Present agents are ranked by `(load, id)` and missing agents are dealt out
/// in id order, so every agent with the same ownership view reaches the same
/// assignment and exactly one absorber exists per missing agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadBalancedTakeover;

impl TakeoverStrategy for LoadBalancedTakeover {
    fn name(&self) -> &'static str {
        "load-balanced"
    }

    fn on_missing_participants(&mut self, ctx: &TakeoverContext<'_>) -> Vec<Reassignment> {
        let mut ranked: Vec<AgentId> = ctx.present.iter().copied().collect();
        ranked.sort_by_key(|&a| (ctx.load(a), a));
        if ranked.is_empty() {
            return Vec::new();
        }

        ctx.missing
            .iter()
            .enumerate()
            .filter(|&(i, _)| ranked[i % ranked.len()] == ctx.me)
            .flat_map(|(_, &agent)| ctx.claim(agent))
            .collect()
    }
}
