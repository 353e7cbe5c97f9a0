//! Replica-side delta coordination.
//!
//! [`ReplicatedState`] owns the root CRDT of one component instance. The
//! replication runtime drains it with [`ReplicatedState::take_outgoing_delta`]
//! and feeds it remote deltas through
//! [`ReplicatedState::apply_incoming_delta`]. Both run on the caller's thread;
//! no locking is done here.

use crate::{
    config::ReplicaConfig,
    data::ReplicatedData,
    delta::{DeltaKind, ReplicatedDelta},
    error::{CrdtError, Result},
    traits::{DeltaCrdt, FromDelta},
    types::{ReplicaId, WriteConsistency},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A delta ready to be handed to the replication runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingDelta {
    /// Replica the delta originates from
    pub replica_id: ReplicaId,
    /// Requested acknowledgement level
    pub write_consistency: WriteConsistency,
    pub delta: ReplicatedDelta,
}

impl OutgoingDelta {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Delta traffic counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaStatistics {
    /// Deltas produced by `take_outgoing_delta`
    pub deltas_emitted: u64,
    /// Takes that found nothing to ship
    pub empty_takes: u64,
    /// Remote deltas applied successfully
    pub deltas_applied: u64,
    /// Remote deltas rejected with an error
    pub deltas_rejected: u64,
}

/// Replicated root state of a component instance
#[derive(Debug)]
pub struct ReplicatedState {
    config: ReplicaConfig,
    data: Option<ReplicatedData>,
    /// The next take returns a delta even if nothing changed
    snapshot_pending: bool,
    stats: DeltaStatistics,
}

impl ReplicatedState {
    /// Create a replica with no root state yet
    pub fn new(config: ReplicaConfig) -> Self {
        Self {
            config,
            data: None,
            snapshot_pending: false,
            stats: DeltaStatistics::default(),
        }
    }

    /// Create a replica owning `data`
    pub fn with_data(config: ReplicaConfig, data: impl Into<ReplicatedData>) -> Self {
        let snapshot_pending = config.initial_snapshot;
        Self {
            config,
            data: Some(data.into()),
            snapshot_pending,
            stats: DeltaStatistics::default(),
        }
    }

    pub fn replica_id(&self) -> ReplicaId {
        self.config.replica_id
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    /// Attach the root state.
    ///
    /// Once a root exists it may only be replaced by one of the same kind.
    pub fn set_data(&mut self, data: impl Into<ReplicatedData>) -> Result<()> {
        let data = data.into();
        if let Some(existing) = &self.data {
            if existing.kind() != data.kind() {
                return Err(CrdtError::StateAlreadySet {
                    existing: existing.kind(),
                    requested: data.kind(),
                });
            }
        }
        debug!(replica = %self.config.replica_id, kind = %data.kind(), "Attaching replicated state");
        self.data = Some(data);
        self.snapshot_pending = self.config.initial_snapshot;
        Ok(())
    }

    pub fn data(&self) -> Option<&ReplicatedData> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut ReplicatedData> {
        self.data.as_mut()
    }

    pub fn kind(&self) -> Option<DeltaKind> {
        self.data.as_ref().map(ReplicatedData::kind)
    }

    pub fn has_pending_delta(&self) -> bool {
        self.snapshot_pending || self.data.as_ref().is_some_and(|data| data.has_pending_delta())
    }

    /// Drain the local changes since the previous call.
    ///
    /// With `initial_snapshot` configured, the first call after attaching
    /// state always returns a delta, possibly an empty one, so the receiver
    /// can materialize the root. Otherwise returns `None` when there is
    /// nothing to send.
    pub fn take_outgoing_delta(&mut self) -> Option<OutgoingDelta> {
        let Some(data) = self.data.as_mut() else {
            self.stats.empty_takes += 1;
            return None;
        };
        let initial = std::mem::take(&mut self.snapshot_pending);

        match data.take_delta(initial) {
            Some(delta) => {
                self.stats.deltas_emitted += 1;
                debug!(
                    replica = %self.config.replica_id,
                    kind = %delta.kind(),
                    initial,
                    "Emitting delta"
                );
                Some(OutgoingDelta {
                    replica_id: self.config.replica_id,
                    write_consistency: self.config.write_consistency,
                    delta,
                })
            }
            None => {
                self.stats.empty_takes += 1;
                None
            }
        }
    }

    /// Apply a delta received from another replica.
    ///
    /// Without a root yet, one is created from the delta's kind. A delta of a
    /// different kind than the existing root is rejected and leaves the state
    /// untouched.
    pub fn apply_incoming_delta(&mut self, delta: ReplicatedDelta) -> Result<()> {
        debug!(replica = %self.config.replica_id, kind = %delta.kind(), "Applying incoming delta");

        let result = match self.data.as_mut() {
            Some(data) => data.apply_delta(delta),
            None => ReplicatedData::from_delta(&delta).and_then(|mut data| {
                data.apply_delta(delta)?;
                self.data = Some(data);
                Ok(())
            }),
        };

        match &result {
            Ok(()) => self.stats.deltas_applied += 1,
            Err(_) => self.stats.deltas_rejected += 1,
        }
        result
    }

    pub fn statistics(&self) -> &DeltaStatistics {
        &self.stats
    }
}
