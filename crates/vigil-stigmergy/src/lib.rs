//! Vigil Virtual Stigmergy
//!
//! Each agent holds a [`Replica`] of a shared key-value store. Replicas never
//! address each other: writes and requests go out over the local broadcast
//! channel and spread opportunistically as agents come within range.
//!
//! # Conflict Resolution
//!
//! Entries carry their writer (`owner`) and a per-replica `version`. The
//! default [`LowestOwnerWins`] resolver keeps the entry written by the lower
//! agent id whatever the arrival order, and only uses the version to order
//! one writer's successive writes. [`VersionedPriority`] and any other
//! deterministic [`ConflictResolver`], including a plain closure, can be
//! supplied instead.
//!
//! # Convergence
//!
//! A replica forwards an entry only when its own state changed, and answers
//! a stale entry with its winner. Given a communication graph that is
//! eventually connected, every replica ends with the same entry per key.
//! [`Replica::rebroadcast_all`] re-queues everything for lossy channels.

mod entry;
mod error;
mod message;
mod replica;
mod resolver;

pub use entry::{StigmergyEntry, StigmergyKey, StigmergyValue};
pub use error::{Result, StigmergyError};
pub use message::StigmergyMessage;
pub use replica::{Receipt, Replica, ReplicaDigest};
pub use resolver::{ConflictResolver, LowestOwnerWins, Resolution, VersionedPriority};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use vigil_topology::AgentId;

    /// Run gossip rounds until every outbox is empty. Each message reaches
    /// every other replica, in shuffled order, unless dropped.
    fn gossip(replicas: &mut [Replica], rng: &mut StdRng, drop_probability: f64, max_rounds: usize) {
        for _ in 0..max_rounds {
            let mut in_flight: Vec<(usize, StigmergyMessage)> = replicas
                .iter_mut()
                .enumerate()
                .flat_map(|(i, r)| r.drain_outbox().into_iter().map(move |m| (i, m)))
                .collect();
            if in_flight.is_empty() {
                return;
            }
            in_flight.shuffle(rng);

            for (sender, message) in in_flight {
                for (i, replica) in replicas.iter_mut().enumerate() {
                    if i != sender && !rng.gen_bool(drop_probability) {
                        replica.receive(message.clone());
                    }
                }
            }
        }
    }

    proptest! {
        #[test]
        fn replicas_converge_under_any_delivery_order(
            writes in proptest::collection::vec((0u32..4, 0u8..3, 0u8..10), 1..20),
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut replicas: Vec<Replica> = (0..4).map(|i| Replica::new(AgentId(i))).collect();

            for (agent, key, value) in writes {
                replicas[agent as usize].put(format!("k{key}"), u64::from(value));
            }
            gossip(&mut replicas, &mut rng, 0.0, 64);

            let digest = replicas[0].digest();
            for r in &replicas {
                prop_assert_eq!(r.digest(), digest);
                prop_assert!(!r.has_outbox());
            }
        }

        #[test]
        fn lossy_delivery_converges_with_anti_entropy(
            writes in proptest::collection::vec((0u32..4, 0u8..3, 0u8..10), 1..20),
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut replicas: Vec<Replica> = (0..4).map(|i| Replica::new(AgentId(i))).collect();

            for (agent, key, value) in writes {
                replicas[agent as usize].put(format!("k{key}"), u64::from(value));
            }
            gossip(&mut replicas, &mut rng, 0.5, 8);

            // Channel recovers; one anti-entropy pass from everyone
            for r in replicas.iter_mut() {
                r.rebroadcast_all();
            }
            gossip(&mut replicas, &mut rng, 0.0, 64);

            let digest = replicas[0].digest();
            for r in &replicas {
                prop_assert_eq!(r.digest(), digest);
            }
        }

        #[test]
        fn converged_values_are_stable(
            writes in proptest::collection::vec((0u32..3, 0u8..10), 1..10),
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut replicas: Vec<Replica> = (0..3).map(|i| Replica::new(AgentId(i))).collect();
            for (agent, value) in writes {
                replicas[agent as usize].put("k", u64::from(value));
            }
            gossip(&mut replicas, &mut rng, 0.0, 64);
            let before = replicas[0].digest();

            // More anti-entropy without new writes changes nothing
            for r in replicas.iter_mut() {
                r.rebroadcast_all();
            }
            gossip(&mut replicas, &mut rng, 0.0, 64);
            prop_assert_eq!(replicas[0].digest(), before);
        }
    }

    #[test]
    fn concurrent_writes_pick_lower_agent() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut replicas = vec![Replica::new(AgentId(1)), Replica::new(AgentId(2))];
        replicas[0].put("k", "A");
        replicas[1].put("k", "B");

        gossip(&mut replicas, &mut rng, 0.0, 16);

        let key = StigmergyKey::from("k");
        for r in &replicas {
            assert_eq!(r.try_get_non_sending(&key).and_then(|v| v.as_str()), Some("A"));
        }
    }
}
