//! Register Map: an OR-Map of LWW-Registers.
//!
//! Delta entries carry the register value and clock directly. Writing to an
//! existing key updates its register in place rather than replacing it.

use crate::{
    canonical::Canonical,
    clock::Clock,
    error::Result,
    lww_register::{LwwRegister, RegisterDelta},
    or_map::{MapDelta, MapEntryDelta, OrMap},
    traits::{DeltaCrdt, FromDelta},
};
use serde::{Deserialize, Serialize};

/// Write to a single register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterMapEntryDelta<K, V> {
    pub key: K,
    pub value: V,
    #[serde(default)]
    pub clock: Clock,
    #[serde(default)]
    pub custom_clock_value: i64,
}

impl<K, V> From<MapEntryDelta<K, RegisterDelta<V>>> for RegisterMapEntryDelta<K, V> {
    fn from(entry: MapEntryDelta<K, RegisterDelta<V>>) -> Self {
        Self {
            key: entry.key,
            value: entry.delta.value,
            clock: entry.delta.clock,
            custom_clock_value: entry.delta.custom_clock_value,
        }
    }
}

impl<K, V> From<RegisterMapEntryDelta<K, V>> for MapEntryDelta<K, RegisterDelta<V>> {
    fn from(entry: RegisterMapEntryDelta<K, V>) -> Self {
        MapEntryDelta {
            key: entry.key,
            delta: RegisterDelta {
                value: entry.value,
                clock: entry.clock,
                custom_clock_value: entry.custom_clock_value,
            },
        }
    }
}

/// Register Map delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterMapDelta<K, V> {
    #[serde(default)]
    pub cleared: bool,
    #[serde(default = "Vec::new")]
    pub removed: Vec<K>,
    /// New and overwritten registers alike
    #[serde(default = "Vec::new")]
    pub updated: Vec<RegisterMapEntryDelta<K, V>>,
}

/// Map of replicated registers
#[derive(Debug, Clone)]
pub struct RegisterMap<K, V> {
    registers: OrMap<K, LwwRegister<V>>,
}

impl<K, V> Default for RegisterMap<K, V> {
    fn default() -> Self {
        Self {
            registers: OrMap::default(),
        }
    }
}

impl<K, V> RegisterMap<K, V>
where
    K: Canonical + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`
    pub fn get(&self, key: &K) -> Option<&V> {
        self.registers.get(key).map(LwwRegister::value)
    }

    /// Write `value` under `key` with the default clock
    pub fn set(&mut self, key: K, value: V) {
        self.set_with_clock(key, value, Clock::Default, None);
    }

    /// Write `value` under `key` with an explicit clock
    pub fn set_with_clock(&mut self, key: K, value: V, clock: Clock, custom_clock_value: Option<i64>) {
        if let Some(register) = self.registers.get_mut(&key) {
            register.set_with_clock(value, clock, custom_clock_value);
        } else {
            self.registers
                .set(key, LwwRegister::with_clock(value, clock, custom_clock_value));
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.registers.contains_key(key)
    }

    pub fn delete(&mut self, key: &K) -> bool {
        self.registers.delete(key)
    }

    pub fn clear(&mut self) {
        self.registers.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.registers.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.registers
            .iter()
            .map(|(key, register)| (key, register.value()))
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

impl<K, V> DeltaCrdt for RegisterMap<K, V>
where
    K: Canonical + Clone,
    V: Clone,
{
    type Delta = RegisterMapDelta<K, V>;

    fn take_delta(&mut self, initial: bool) -> Option<RegisterMapDelta<K, V>> {
        let delta = self.registers.take_delta(initial)?;
        Some(RegisterMapDelta {
            cleared: delta.cleared,
            removed: delta.removed,
            updated: delta
                .added
                .into_iter()
                .chain(delta.updated)
                .map(RegisterMapEntryDelta::from)
                .collect(),
        })
    }

    fn apply_delta(&mut self, delta: RegisterMapDelta<K, V>) -> Result<()> {
        self.registers.apply_delta(MapDelta {
            cleared: delta.cleared,
            removed: delta.removed,
            added: Vec::new(),
            updated: delta.updated.into_iter().map(MapEntryDelta::from).collect(),
        })
    }

    fn has_pending_delta(&self) -> bool {
        self.registers.has_pending_delta()
    }
}

impl<K, V> FromDelta for RegisterMap<K, V>
where
    K: Canonical + Clone,
    V: Clone,
{
    fn from_delta(_delta: &RegisterMapDelta<K, V>) -> Result<Self> {
        Ok(Self::new())
    }
}
