//! Replica configuration

use crate::{
    error::{CrdtError, Result},
    types::{ReplicaId, WriteConsistency},
};
use serde::{Deserialize, Serialize};

/// Configuration for a [`ReplicatedState`](crate::replica::ReplicatedState)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Replica identity, generated when absent
    #[serde(default)]
    pub replica_id: ReplicaId,

    /// Consistency requested for outgoing deltas
    #[serde(default)]
    pub write_consistency: WriteConsistency,

    /// Force a delta, possibly empty, on the first take after attaching
    #[serde(default = "default_true")]
    pub initial_snapshot: bool,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            replica_id: ReplicaId::new(),
            write_consistency: WriteConsistency::default(),
            initial_snapshot: default_true(),
        }
    }
}

impl ReplicaConfig {
    /// Parse configuration from TOML
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Parse configuration from JSON
    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|err| CrdtError::ConfigError(err.to_string()))
    }

    pub fn with_write_consistency(mut self, write_consistency: WriteConsistency) -> Self {
        self.write_consistency = write_consistency;
        self
    }

    pub fn with_initial_snapshot(mut self, initial_snapshot: bool) -> Self {
        self.initial_snapshot = initial_snapshot;
        self
    }
}

fn default_true() -> bool {
    true
}
