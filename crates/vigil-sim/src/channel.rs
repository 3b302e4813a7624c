//! Tick-quantized local broadcast.
//!
//! A packet sent on tick `T` can be received from tick `T + 1` on, and only
//! by agents for which the [`TransmissionModel`] says the transmission
//! succeeds. Undelivered packets are gone; there are no retries.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;
use vigil_topology::{AgentId, Tick};

/// Continuous position of an agent on the plane.
pub type Location = (f64, f64);

fn distance(a: Location, b: Location) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Decides whether a single transmission reaches a receiver.
pub trait TransmissionModel {
    /// `distance` is the straight-line distance between sender and
    /// receiver; `obstructed` is the part of it blocked by obstacles.
    fn succeeds(&mut self, distance: f64, obstructed: f64) -> bool;
}

impl<F> TransmissionModel for F
where
    F: FnMut(f64, f64) -> bool,
{
    fn succeeds(&mut self, distance: f64, obstructed: f64) -> bool {
        self(distance, obstructed)
    }
}

/// Every transmission succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lossless;

impl TransmissionModel for Lossless {
    fn succeeds(&mut self, _distance: f64, _obstructed: f64) -> bool {
        true
    }
}

/// Unobstructed transmissions within `range` succeed with `probability`.
#[derive(Debug, Clone)]
pub struct RangeLimited {
    range: Option<f64>,
    probability: f64,
    rng: StdRng,
}

impl RangeLimited {
    pub fn new(range: Option<f64>, probability: f64, seed: u64) -> Self {
        Self {
            range,
            probability: probability.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl TransmissionModel for RangeLimited {
    fn succeeds(&mut self, distance: f64, obstructed: f64) -> bool {
        if obstructed > 0.0 || self.range.is_some_and(|r| distance > r) {
            return false;
        }
        self.probability >= 1.0 || self.rng.gen_bool(self.probability)
    }
}

#[derive(Debug, Clone)]
struct Packet {
    sender: AgentId,
    origin: Location,
    sent: Tick,
    payload: Vec<u8>,
}

/// Broadcast medium shared by every agent in a run.
pub struct BroadcastChannel {
    model: Box<dyn TransmissionModel + Send>,
    in_flight: Vec<Packet>,
    sent: u64,
    delivered: u64,
}

impl std::fmt::Debug for BroadcastChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastChannel")
            .field("in_flight", &self.in_flight.len())
            .field("sent", &self.sent)
            .field("delivered", &self.delivered)
            .finish()
    }
}

impl BroadcastChannel {
    pub fn new(model: Box<dyn TransmissionModel + Send>) -> Self {
        Self {
            model,
            in_flight: Vec::new(),
            sent: 0,
            delivered: 0,
        }
    }

    /// A channel on which everything arrives.
    pub fn lossless() -> Self {
        Self::new(Box::new(Lossless))
    }

    /// Queue a payload sent from `origin` on tick `now`.
    pub fn broadcast(&mut self, sender: AgentId, origin: Location, now: Tick, payload: Vec<u8>) {
        self.sent += 1;
        self.in_flight.push(Packet {
            sender,
            origin,
            sent: now,
            payload,
        });
    }

    /// Hand out every packet sent before `now` to the receivers it reaches.
    ///
    /// Packets sent on `now` itself stay queued for the next tick. Senders
    /// never hear their own packets.
    pub fn deliver(&mut self, now: Tick, receivers: &[(AgentId, Location)]) -> BTreeMap<AgentId, Vec<Vec<u8>>> {
        let (ready, pending): (Vec<Packet>, Vec<Packet>) =
            std::mem::take(&mut self.in_flight).into_iter().partition(|p| p.sent < now);
        self.in_flight = pending;

        let mut inboxes: BTreeMap<AgentId, Vec<Vec<u8>>> = BTreeMap::new();
        for packet in ready {
            for &(agent, location) in receivers {
                if agent == packet.sender {
                    continue;
                }
                if self.model.succeeds(distance(packet.origin, location), 0.0) {
                    self.delivered += 1;
                    inboxes.entry(agent).or_default().push(packet.payload.clone());
                }
            }
            trace!(sender = %packet.sender, sent = packet.sent, now, "Packet delivered");
        }
        inboxes
    }

    /// Packets sent so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Successful receptions so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}
