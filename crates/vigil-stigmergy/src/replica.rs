//! Per-agent stigmergy replica.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};
use vigil_topology::AgentId;

use crate::entry::{StigmergyEntry, StigmergyKey, StigmergyValue};
use crate::message::StigmergyMessage;
use crate::resolver::{ConflictResolver, LowestOwnerWins, Resolution};

/// What [`Replica::receive`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    /// Incoming entry was new or won; it is now local and queued onward.
    Applied,
    /// Already held exactly this write.
    Unchanged,
    /// Local entry won; it was queued back if the sender would accept it.
    Rejected,
    /// A request for a key we hold; our entry was queued.
    Answered,
    /// A request for a key we do not hold.
    Ignored,
}

/// Blake3 digest of a replica's entry set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplicaDigest(pub [u8; 32]);

impl ReplicaDigest {
    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for ReplicaDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 hex chars
        write!(f, "{}...", &self.to_hex()[..8])
    }
}

/// One agent's copy of the shared key-value store.
///
/// Nothing is sent directly: writes and requests land in an outbox that the
/// caller drains onto the broadcast channel. The outbox holds at most one
/// put per key, and a missing key is requested at most once until an entry
/// for it arrives.
#[derive(Debug, Clone)]
pub struct Replica<R = LowestOwnerWins> {
    agent: AgentId,
    resolver: R,
    entries: BTreeMap<StigmergyKey, StigmergyEntry>,
    /// Highest version written or seen
    clock: u64,
    outbox_puts: BTreeSet<StigmergyKey>,
    outbox_gets: Vec<StigmergyKey>,
    pending_gets: BTreeSet<StigmergyKey>,
}

impl Replica<LowestOwnerWins> {
    /// Create an empty replica with the default resolver.
    pub fn new(agent: AgentId) -> Self {
        Self::with_resolver(agent, LowestOwnerWins)
    }
}

impl<R: ConflictResolver> Replica<R> {
    /// Create an empty replica with a caller-supplied resolver.
    pub fn with_resolver(agent: AgentId, resolver: R) -> Self {
        Self {
            agent,
            resolver,
            entries: BTreeMap::new(),
            clock: 0,
            outbox_puts: BTreeSet::new(),
            outbox_gets: Vec::new(),
            pending_gets: BTreeSet::new(),
        }
    }

    /// The owning agent.
    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// Highest version written or seen.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Write locally and queue the entry for broadcast.
    pub fn put(&mut self, key: impl Into<StigmergyKey>, value: impl Into<StigmergyValue>) -> &StigmergyEntry {
        let key = key.into();
        self.clock += 1;
        let entry = StigmergyEntry::new(key.clone(), value.into(), self.agent, self.clock);
        trace!(agent = %self.agent, %key, version = entry.version, "Stigmergy put");

        self.pending_gets.remove(&key);
        self.outbox_puts.insert(key.clone());
        match self.entries.entry(key) {
            Entry::Occupied(mut slot) => {
                slot.insert(entry);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(entry),
        }
    }

    /// Local-only read. Never produces traffic.
    pub fn try_get_non_sending(&self, key: &StigmergyKey) -> Option<&StigmergyValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Read, requesting the key from neighbors on a miss.
    ///
    /// A miss returns `None` immediately; the value can only show up on a
    /// later tick. Repeated misses send no further requests.
    pub fn try_get(&mut self, key: &StigmergyKey) -> Option<&StigmergyValue> {
        if !self.entries.contains_key(key) {
            if self.pending_gets.insert(key.clone()) {
                trace!(agent = %self.agent, %key, "Requesting missing key");
                self.outbox_gets.push(key.clone());
            }
            return None;
        }
        self.try_get_non_sending(key)
    }

    /// Full entry for a key.
    pub fn entry(&self, key: &StigmergyKey) -> Option<&StigmergyEntry> {
        self.entries.get(key)
    }

    /// Check whether a request for `key` is outstanding.
    pub fn is_pending(&self, key: &StigmergyKey) -> bool {
        self.pending_gets.contains(key)
    }

    /// Apply a message from a peer.
    pub fn receive(&mut self, message: StigmergyMessage) -> Receipt {
        match message {
            StigmergyMessage::Put(entry) => self.receive_entry(entry),
            StigmergyMessage::Get(key) => {
                if self.entries.contains_key(&key) {
                    self.outbox_puts.insert(key);
                    Receipt::Answered
                } else {
                    Receipt::Ignored
                }
            }
        }
    }

    fn receive_entry(&mut self, incoming: StigmergyEntry) -> Receipt {
        self.clock = self.clock.max(incoming.version);
        self.pending_gets.remove(&incoming.key);

        let Some(local) = self.entries.get(&incoming.key) else {
            trace!(agent = %self.agent, key = %incoming.key, owner = %incoming.owner, "Learned new key");
            self.outbox_puts.insert(incoming.key.clone());
            self.entries.insert(incoming.key.clone(), incoming);
            return Receipt::Applied;
        };

        if local.same_write(&incoming) {
            return Receipt::Unchanged;
        }

        match self.resolver.resolve(&incoming.key, local, &incoming) {
            Resolution::TakeIncoming => {
                trace!(
                    agent = %self.agent,
                    key = %incoming.key,
                    from = %local.owner,
                    to = %incoming.owner,
                    version = incoming.version,
                    "Incoming entry won"
                );
                self.outbox_puts.insert(incoming.key.clone());
                self.entries.insert(incoming.key.clone(), incoming);
                Receipt::Applied
            }
            Resolution::KeepLocal => {
                // Send ours back only if the sender's side would take it
                if self.resolver.resolve(&incoming.key, &incoming, local) == Resolution::TakeIncoming {
                    debug!(
                        agent = %self.agent,
                        key = %incoming.key,
                        stale_owner = %incoming.owner,
                        "Rejected stale entry, re-broadcasting local"
                    );
                    self.outbox_puts.insert(incoming.key);
                }
                Receipt::Rejected
            }
        }
    }

    /// Take everything queued for broadcast: puts in key order, then
    /// requests in the order they were made.
    pub fn drain_outbox(&mut self) -> Vec<StigmergyMessage> {
        let puts = std::mem::take(&mut self.outbox_puts);
        let mut out: Vec<StigmergyMessage> = puts
            .into_iter()
            .filter_map(|key| self.entries.get(&key).cloned())
            .map(StigmergyMessage::Put)
            .collect();
        out.extend(self.outbox_gets.drain(..).map(StigmergyMessage::Get));
        out
    }

    /// Check whether anything is queued.
    pub fn has_outbox(&self) -> bool {
        !self.outbox_puts.is_empty() || !self.outbox_gets.is_empty()
    }

    /// Queue every entry again (anti-entropy).
    pub fn rebroadcast_all(&mut self) {
        self.outbox_puts.extend(self.entries.keys().cloned());
    }

    /// Entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = &StigmergyEntry> {
        self.entries.values()
    }

    /// Keys starting with a prefix.
    pub fn iter_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a StigmergyEntry> {
        self.entries
            .range(StigmergyKey::from(prefix)..)
            .take_while(move |(k, _)| k.as_str().starts_with(prefix))
            .map(|(_, e)| e)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Digest of the entry set. Two replicas with equal digests hold the
    /// same writes for the same keys.
    pub fn digest(&self) -> ReplicaDigest {
        let mut hasher = blake3::Hasher::new();
        for entry in self.entries.values() {
            // Length-prefixed so adjacent fields cannot alias
            let key = entry.key.as_str().as_bytes();
            let value = entry.value.as_bytes();
            hasher.update(&(key.len() as u64).to_le_bytes());
            hasher.update(key);
            hasher.update(&(value.len() as u64).to_le_bytes());
            hasher.update(value);
            hasher.update(&entry.owner.0.to_le_bytes());
            hasher.update(&entry.version.to_le_bytes());
        }
        ReplicaDigest(*hasher.finalize().as_bytes())
    }
}
