//! Stigmergy gossip messages.

use serde::{Deserialize, Serialize};

use crate::entry::{StigmergyEntry, StigmergyKey};
use crate::error::Result;

/// What replicas tell each other over the broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StigmergyMessage {
    /// "This is my entry for the key."
    Put(StigmergyEntry),
    /// "Does anyone have this key?"
    Get(StigmergyKey),
}

impl StigmergyMessage {
    /// The key this message is about.
    pub fn key(&self) -> &StigmergyKey {
        match self {
            Self::Put(entry) => &entry.key,
            Self::Get(key) => key,
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
