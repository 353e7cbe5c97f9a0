//! Wire-level delta envelope for heterogeneous CRDT trees.

use crate::{
    canonical::Value,
    counter_map::CounterMapDelta,
    flag::FlagDelta,
    lww_register::RegisterDelta,
    multi_map::MultiMapDelta,
    or_map::MapDelta,
    or_set::SetDelta,
    pn_counter::CounterDelta,
    register_map::RegisterMapDelta,
    vote::VoteDelta,
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Kind of a CRDT or of a delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeltaKind {
    Counter,
    Set,
    Register,
    Flag,
    Vote,
    Map,
    CounterMap,
    RegisterMap,
    MultiMap,
}

impl Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeltaKind::Counter => "counter",
            DeltaKind::Set => "set",
            DeltaKind::Register => "register",
            DeltaKind::Flag => "flag",
            DeltaKind::Vote => "vote",
            DeltaKind::Map => "map",
            DeltaKind::CounterMap => "counterMap",
            DeltaKind::RegisterMap => "registerMap",
            DeltaKind::MultiMap => "multiMap",
        };
        write!(f, "{}", name)
    }
}

/// Delta of any supported CRDT, tagged with its kind.
///
/// Serialized as `{"type": "<kind>", "delta": {...}}`. Map deltas nest
/// further tagged deltas for their values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "delta", rename_all = "camelCase")]
pub enum ReplicatedDelta {
    Counter(CounterDelta),
    Set(SetDelta<Value>),
    Register(RegisterDelta<Value>),
    Flag(FlagDelta),
    Vote(VoteDelta),
    Map(MapDelta<Value, ReplicatedDelta>),
    CounterMap(CounterMapDelta<Value>),
    RegisterMap(RegisterMapDelta<Value, Value>),
    MultiMap(MultiMapDelta<Value, Value>),
}

impl ReplicatedDelta {
    pub fn kind(&self) -> DeltaKind {
        match self {
            ReplicatedDelta::Counter(_) => DeltaKind::Counter,
            ReplicatedDelta::Set(_) => DeltaKind::Set,
            ReplicatedDelta::Register(_) => DeltaKind::Register,
            ReplicatedDelta::Flag(_) => DeltaKind::Flag,
            ReplicatedDelta::Vote(_) => DeltaKind::Vote,
            ReplicatedDelta::Map(_) => DeltaKind::Map,
            ReplicatedDelta::CounterMap(_) => DeltaKind::CounterMap,
            ReplicatedDelta::RegisterMap(_) => DeltaKind::RegisterMap,
            ReplicatedDelta::MultiMap(_) => DeltaKind::MultiMap,
        }
    }

    /// Encode as JSON
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
