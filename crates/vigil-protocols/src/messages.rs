//! Messages agents put on the broadcast channel.

use serde::{Deserialize, Serialize};
use vigil_meeting::MeetingId;
use vigil_stigmergy::StigmergyMessage;
use vigil_topology::{AgentId, Tick};

use crate::error::Result;

/// Coordination payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinationMessage {
    /// Stigmergy gossip.
    Stigmergy(StigmergyMessage),
    /// "I am at the meeting and exchanging now."
    Presence { meeting: MeetingId, occurrence: u64 },
    /// Answer to a presence from a participant that heard it.
    PresenceReply { meeting: MeetingId, occurrence: u64 },
    /// "I am already waiting at the meeting vertex."
    AlreadyHere { meeting: MeetingId, occurrence: u64 },
}

impl CoordinationMessage {
    /// Meeting occurrence this message is about, if any.
    pub fn meeting(&self) -> Option<(MeetingId, u64)> {
        match *self {
            Self::Stigmergy(_) => None,
            Self::Presence { meeting, occurrence }
            | Self::PresenceReply { meeting, occurrence }
            | Self::AlreadyHere { meeting, occurrence } => Some((meeting, occurrence)),
        }
    }
}

/// A message with its sender and send tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: AgentId,
    pub tick: Tick,
    pub message: CoordinationMessage,
}

impl Envelope {
    pub fn new(sender: AgentId, tick: Tick, message: CoordinationMessage) -> Self {
        Self {
            sender,
            tick,
            message,
        }
    }

    /// Serialize with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize with bincode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_stigmergy::StigmergyKey;

    #[test]
    fn meeting_accessor() {
        let presence = CoordinationMessage::Presence {
            meeting: MeetingId(2),
            occurrence: 5,
        };
        assert_eq!(presence.meeting(), Some((MeetingId(2), 5)));

        let gossip = CoordinationMessage::Stigmergy(StigmergyMessage::Get(StigmergyKey::from("k")));
        assert_eq!(gossip.meeting(), None);
    }

    #[test]
    fn garbage_is_rejected() {
        let envelope = Envelope::new(AgentId(4), 9, CoordinationMessage::AlreadyHere {
            meeting: MeetingId(1),
            occurrence: 0,
        });
        let bytes = envelope.to_bytes().unwrap();
        assert_eq!(Envelope::from_bytes(&bytes).unwrap(), envelope);
        assert!(Envelope::from_bytes(&[0xff; 3]).is_err());
    }
}
