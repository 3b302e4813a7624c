//! Stigmergy entry types.

use serde::{Deserialize, Serialize};
use vigil_topology::AgentId;

/// A stigmergy key, e.g. `partition/3`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StigmergyKey(pub String);

impl StigmergyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StigmergyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StigmergyKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for StigmergyKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Stigmergy value - arbitrary bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StigmergyValue(pub Vec<u8>);

impl StigmergyValue {
    /// Create from bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Create from string.
    pub fn from_string(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }

    /// Encode an integer (big-endian).
    pub fn from_u64(n: u64) -> Self {
        Self(n.to_be_bytes().to_vec())
    }

    /// Get as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Try to get as UTF-8 string.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Decode an integer written by [`from_u64`](Self::from_u64).
    pub fn as_u64(&self) -> Option<u64> {
        let bytes: [u8; 8] = self.0.as_slice().try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }
}

impl From<Vec<u8>> for StigmergyValue {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&str> for StigmergyValue {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl From<String> for StigmergyValue {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<u64> for StigmergyValue {
    fn from(n: u64) -> Self {
        Self::from_u64(n)
    }
}

/// A replicated entry.
///
/// `owner` is the writing agent and doubles as its priority: lower ids win
/// ties. `version` is a Lamport-style counter, one higher than anything the
/// writer had seen, so a write that follows a converged value supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StigmergyEntry {
    pub key: StigmergyKey,
    pub value: StigmergyValue,
    pub owner: AgentId,
    pub version: u64,
}

impl StigmergyEntry {
    pub fn new(key: StigmergyKey, value: StigmergyValue, owner: AgentId, version: u64) -> Self {
        Self {
            key,
            value,
            owner,
            version,
        }
    }

    /// Same write (writer and version), regardless of value bytes.
    pub fn same_write(&self, other: &Self) -> bool {
        self.owner == other.owner && self.version == other.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_values() {
        let v = StigmergyValue::from(42u64);
        assert_eq!(v.as_u64(), Some(42));
        assert_eq!(StigmergyValue::from("abc").as_u64(), None);
    }

    #[test]
    fn string_values() {
        let v: StigmergyValue = "hello".into();
        assert_eq!(v.as_str(), Some("hello"));
        assert_eq!(StigmergyValue::new(vec![0xff, 0xfe]).as_str(), None);
    }

    #[test]
    fn same_write_ignores_value() {
        let key = StigmergyKey::from("k");
        let a = StigmergyEntry::new(key.clone(), "A".into(), AgentId(1), 3);
        let b = StigmergyEntry::new(key.clone(), "B".into(), AgentId(1), 3);
        let c = StigmergyEntry::new(key, "A".into(), AgentId(2), 3);
        assert!(a.same_write(&b));
        assert!(!a.same_write(&c));
        assert_eq!(a.key.to_string(), "k");
    }
}
