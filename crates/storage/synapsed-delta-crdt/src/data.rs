//! Heterogeneous CRDT values.
//!
//! [`ReplicatedData`] lets a single tree mix every supported CRDT kind, e.g.
//! a map whose values are counters, sets and nested maps. Deltas travel as
//! [`ReplicatedDelta`] and are routed to the matching variant.

use crate::{
    canonical::Value,
    counter_map::CounterMap,
    delta::{DeltaKind, ReplicatedDelta},
    error::{CrdtError, Result},
    flag::Flag,
    lww_register::LwwRegister,
    multi_map::MultiMap,
    or_map::OrMap,
    or_set::OrSet,
    pn_counter::PnCounter,
    register_map::RegisterMap,
    traits::{DeltaCrdt, FromDelta},
    vote::Vote,
};

/// Any supported CRDT
#[derive(Debug, Clone)]
pub enum ReplicatedData {
    Counter(PnCounter),
    Set(OrSet<Value>),
    Register(LwwRegister<Value>),
    Flag(Flag),
    Vote(Vote),
    Map(OrMap<Value, ReplicatedData>),
    CounterMap(CounterMap<Value>),
    RegisterMap(RegisterMap<Value, Value>),
    MultiMap(MultiMap<Value, Value>),
}

macro_rules! replicated_variant {
    ($variant:ident, $ty:ty, $as_ref:ident, $as_mut:ident) => {
        impl ReplicatedData {
            pub fn $as_ref(&self) -> Option<&$ty> {
                match self {
                    ReplicatedData::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            pub fn $as_mut(&mut self) -> Option<&mut $ty> {
                match self {
                    ReplicatedData::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for ReplicatedData {
            fn from(inner: $ty) -> Self {
                ReplicatedData::$variant(inner)
            }
        }
    };
}

replicated_variant!(Counter, PnCounter, as_counter, as_counter_mut);
replicated_variant!(Set, OrSet<Value>, as_set, as_set_mut);
replicated_variant!(Register, LwwRegister<Value>, as_register, as_register_mut);
replicated_variant!(Flag, Flag, as_flag, as_flag_mut);
replicated_variant!(Vote, Vote, as_vote, as_vote_mut);
replicated_variant!(Map, OrMap<Value, ReplicatedData>, as_map, as_map_mut);
replicated_variant!(CounterMap, CounterMap<Value>, as_counter_map, as_counter_map_mut);
replicated_variant!(RegisterMap, RegisterMap<Value, Value>, as_register_map, as_register_map_mut);
replicated_variant!(MultiMap, MultiMap<Value, Value>, as_multi_map, as_multi_map_mut);

impl ReplicatedData {
    pub fn kind(&self) -> DeltaKind {
        match self {
            ReplicatedData::Counter(_) => DeltaKind::Counter,
            ReplicatedData::Set(_) => DeltaKind::Set,
            ReplicatedData::Register(_) => DeltaKind::Register,
            ReplicatedData::Flag(_) => DeltaKind::Flag,
            ReplicatedData::Vote(_) => DeltaKind::Vote,
            ReplicatedData::Map(_) => DeltaKind::Map,
            ReplicatedData::CounterMap(_) => DeltaKind::CounterMap,
            ReplicatedData::RegisterMap(_) => DeltaKind::RegisterMap,
            ReplicatedData::MultiMap(_) => DeltaKind::MultiMap,
        }
    }
}

impl DeltaCrdt for ReplicatedData {
    type Delta = ReplicatedDelta;

    fn take_delta(&mut self, initial: bool) -> Option<ReplicatedDelta> {
        match self {
            ReplicatedData::Counter(c) => c.take_delta(initial).map(ReplicatedDelta::Counter),
            ReplicatedData::Set(s) => s.take_delta(initial).map(ReplicatedDelta::Set),
            ReplicatedData::Register(r) => r.take_delta(initial).map(ReplicatedDelta::Register),
            ReplicatedData::Flag(f) => f.take_delta(initial).map(ReplicatedDelta::Flag),
            ReplicatedData::Vote(v) => v.take_delta(initial).map(ReplicatedDelta::Vote),
            ReplicatedData::Map(m) => m.take_delta(initial).map(ReplicatedDelta::Map),
            ReplicatedData::CounterMap(m) => m.take_delta(initial).map(ReplicatedDelta::CounterMap),
            ReplicatedData::RegisterMap(m) => m.take_delta(initial).map(ReplicatedDelta::RegisterMap),
            ReplicatedData::MultiMap(m) => m.take_delta(initial).map(ReplicatedDelta::MultiMap),
        }
    }

    fn apply_delta(&mut self, delta: ReplicatedDelta) -> Result<()> {
        match (self, delta) {
            (ReplicatedData::Counter(c), ReplicatedDelta::Counter(d)) => c.apply_delta(d),
            (ReplicatedData::Set(s), ReplicatedDelta::Set(d)) => s.apply_delta(d),
            (ReplicatedData::Register(r), ReplicatedDelta::Register(d)) => r.apply_delta(d),
            (ReplicatedData::Flag(f), ReplicatedDelta::Flag(d)) => f.apply_delta(d),
            (ReplicatedData::Vote(v), ReplicatedDelta::Vote(d)) => v.apply_delta(d),
            (ReplicatedData::Map(m), ReplicatedDelta::Map(d)) => m.apply_delta(d),
            (ReplicatedData::CounterMap(m), ReplicatedDelta::CounterMap(d)) => m.apply_delta(d),
            (ReplicatedData::RegisterMap(m), ReplicatedDelta::RegisterMap(d)) => m.apply_delta(d),
            (ReplicatedData::MultiMap(m), ReplicatedDelta::MultiMap(d)) => m.apply_delta(d),
            (data, delta) => Err(CrdtError::mismatch(data.kind(), delta.kind())),
        }
    }

    fn has_pending_delta(&self) -> bool {
        match self {
            ReplicatedData::Counter(c) => c.has_pending_delta(),
            ReplicatedData::Set(s) => s.has_pending_delta(),
            ReplicatedData::Register(r) => r.has_pending_delta(),
            ReplicatedData::Flag(f) => f.has_pending_delta(),
            ReplicatedData::Vote(v) => v.has_pending_delta(),
            ReplicatedData::Map(m) => m.has_pending_delta(),
            ReplicatedData::CounterMap(m) => m.has_pending_delta(),
            ReplicatedData::RegisterMap(m) => m.has_pending_delta(),
            ReplicatedData::MultiMap(m) => m.has_pending_delta(),
        }
    }
}

impl FromDelta for ReplicatedData {
    /// Construct an empty CRDT of the delta's kind, ready to have the delta
    /// applied. Registers are seeded with the delta's value.
    fn from_delta(delta: &ReplicatedDelta) -> Result<Self> {
        Ok(match delta {
            ReplicatedDelta::Counter(d) => PnCounter::from_delta(d)?.into(),
            ReplicatedDelta::Set(d) => OrSet::<Value>::from_delta(d)?.into(),
            ReplicatedDelta::Register(d) => LwwRegister::<Value>::from_delta(d)?.into(),
            ReplicatedDelta::Flag(d) => Flag::from_delta(d)?.into(),
            ReplicatedDelta::Vote(d) => Vote::from_delta(d)?.into(),
            ReplicatedDelta::Map(d) => OrMap::<Value, ReplicatedData>::from_delta(d)?.into(),
            ReplicatedDelta::CounterMap(d) => CounterMap::<Value>::from_delta(d)?.into(),
            ReplicatedDelta::RegisterMap(d) => RegisterMap::<Value, Value>::from_delta(d)?.into(),
            ReplicatedDelta::MultiMap(d) => MultiMap::<Value, Value>::from_delta(d)?.into(),
        })
    }
}
