//! Partition ownership recorded in the stigmergy store.
//!
//! Each transfer writes a new generation key (`partition/<id>/<generation>`)
//! holding the new owner's agent id; the highest generation present is the
//! current owner. A partition with no entry yet belongs to the agent it was
//! created for, so every partition always has exactly one owner.
//!
//! Two agents claiming the same partition off the same view write the same
//! generation key, and the store's lowest-owner rule settles it. A later
//! takeover writes a fresh key, so it never has to beat an earlier writer.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use vigil_partition::PartitionSet;
use vigil_stigmergy::{ConflictResolver, Replica, StigmergyKey};
use vigil_topology::{AgentId, PartitionId};

/// Stigmergy key holding the owner of a partition after its
/// `generation`-th transfer.
pub fn partition_key(partition: PartitionId, generation: u64) -> StigmergyKey {
    StigmergyKey::new(format!("{}{generation}", partition_prefix(partition)))
}

fn partition_prefix(partition: PartitionId) -> String {
    format!("partition/{}/", partition.0)
}

/// Resolves partition ownership through a replica.
#[derive(Debug, Clone, Default)]
pub struct OwnershipLedger {
    original: BTreeMap<PartitionId, AgentId>,
}

impl OwnershipLedger {
    pub fn new(original: BTreeMap<PartitionId, AgentId>) -> Self {
        Self { original }
    }

    pub fn from_partitions(partitions: &PartitionSet) -> Self {
        Self::new(partitions.original_owners())
    }

    /// Known partitions.
    pub fn partitions(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.original.keys().copied()
    }

    /// Creator of a partition.
    pub fn original_owner(&self, partition: PartitionId) -> Option<AgentId> {
        self.original.get(&partition).copied()
    }

    /// Current owner as seen by `replica`; `None` only for unknown partitions.
    pub fn owner_of<R: ConflictResolver>(&self, replica: &Replica<R>, partition: PartitionId) -> Option<AgentId> {
        let original = self.original_owner(partition)?;
        Some(latest(replica, partition).map_or(original, |(_, owner)| owner))
    }

    /// Number of transfers `replica` has seen for a partition.
    pub fn generation<R: ConflictResolver>(&self, replica: &Replica<R>, partition: PartitionId) -> u64 {
        latest(replica, partition).map_or(0, |(generation, _)| generation)
    }

    /// Current owner of every partition.
    pub fn owners<R: ConflictResolver>(&self, replica: &Replica<R>) -> BTreeMap<PartitionId, AgentId> {
        self.partitions()
            .filter_map(|p| self.owner_of(replica, p).map(|a| (p, a)))
            .collect()
    }

    /// Partitions currently owned by `agent`.
    pub fn partitions_owned_by<R: ConflictResolver>(&self, replica: &Replica<R>, agent: AgentId) -> BTreeSet<PartitionId> {
        self.partitions()
            .filter(|&p| self.owner_of(replica, p) == Some(agent))
            .collect()
    }

    /// Record a new owner. The write spreads with the replica's next drain.
    pub fn assign<R: ConflictResolver>(&self, replica: &mut Replica<R>, partition: PartitionId, agent: AgentId) {
        let generation = self.generation(replica, partition) + 1;
        debug!(%partition, %agent, generation, writer = %replica.agent(), "Recording partition owner");
        replica.put(partition_key(partition, generation), u64::from(agent.0));
    }
}

/// Highest generation recorded for a partition and its owner.
fn latest<R: ConflictResolver>(replica: &Replica<R>, partition: PartitionId) -> Option<(u64, AgentId)> {
    let prefix = partition_prefix(partition);
    replica
        .iter_prefix(&prefix)
        .filter_map(|entry| {
            let generation = entry.key.as_str()[prefix.len()..].parse::<u64>().ok()?;
            let owner = u32::try_from(entry.value.as_u64()?).ok()?;
            Some((generation, AgentId(owner)))
        })
        .max_by_key(|(generation, _)| *generation)
}
