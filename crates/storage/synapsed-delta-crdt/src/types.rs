//! Core types shared by the replication surface

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use uuid::Uuid;

/// Identifier of the replica a component instance runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(Uuid);

impl ReplicaId {
    /// Create a new random replica ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create replica ID from UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReplicaId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ReplicaId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// How many replicas must acknowledge a delta before the write is confirmed.
///
/// Carried alongside outgoing deltas; enforcement belongs to the replication
/// runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteConsistency {
    /// Only the local replica
    #[default]
    Local,
    /// A majority of replicas
    Majority,
    /// Every replica
    All,
}

impl Display for WriteConsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteConsistency::Local => "local",
            WriteConsistency::Majority => "majority",
            WriteConsistency::All => "all",
        };
        f.write_str(name)
    }
}
