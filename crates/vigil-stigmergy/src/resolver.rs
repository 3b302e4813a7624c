//! Conflict resolution between a local and an incoming entry.
//!
//! Resolvers must be deterministic and agree when the arguments are swapped
//! (if `a` beats `b` locally, `a` beats `b` on the peer too), otherwise
//! replicas never converge.

use crate::entry::{StigmergyEntry, StigmergyKey};

/// Outcome of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepLocal,
    TakeIncoming,
}

/// Decides between two entries for the same key.
pub trait ConflictResolver {
    fn resolve(&self, key: &StigmergyKey, local: &StigmergyEntry, incoming: &StigmergyEntry) -> Resolution;
}

impl<F> ConflictResolver for F
where
    F: Fn(&StigmergyKey, &StigmergyEntry, &StigmergyEntry) -> Resolution,
{
    fn resolve(&self, key: &StigmergyKey, local: &StigmergyEntry, incoming: &StigmergyEntry) -> Resolution {
        self(key, local, incoming)
    }
}

/// Higher version wins; equal versions go to the lower owner id.
///
/// A write made after observing the current value supersedes it, so the
/// writer's id only matters for concurrent writes. Useful for stores where
/// the latest informed write should stick; not the replica default.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionedPriority;

impl ConflictResolver for VersionedPriority {
    fn resolve(&self, _key: &StigmergyKey, local: &StigmergyEntry, incoming: &StigmergyEntry) -> Resolution {
        let better = incoming.version > local.version
            || (incoming.version == local.version && incoming.owner < local.owner);
        if better {
            Resolution::TakeIncoming
        } else {
            Resolution::KeepLocal
        }
    }
}

/// The lower owner id always wins; a writer's own entries order by version.
///
/// The default for [`Replica`](crate::Replica). Versions never compare
/// across writers, so how many keys an agent has written has no bearing on
/// which of two conflicting writes survives.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowestOwnerWins;

impl ConflictResolver for LowestOwnerWins {
    fn resolve(&self, _key: &StigmergyKey, local: &StigmergyEntry, incoming: &StigmergyEntry) -> Resolution {
        let better = incoming.owner < local.owner
            || (incoming.owner == local.owner && incoming.version > local.version);
        if better {
            Resolution::TakeIncoming
        } else {
            Resolution::KeepLocal
        }
    }
}
