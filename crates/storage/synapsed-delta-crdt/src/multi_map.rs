//! Multi Map: an OR-Map of OR-Sets, associating each key with a set of values.
//!
//! A key exists only while it has at least one value. Delta entries carry the
//! added and removed values per key.

use crate::{
    canonical::Canonical,
    error::Result,
    or_map::{MapDelta, MapEntryDelta, OrMap},
    or_set::{OrSet, SetDelta},
    traits::{DeltaCrdt, FromDelta},
};
use serde::{Deserialize, Serialize};

/// Multi Map delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiMapDelta<K, V> {
    #[serde(default)]
    pub cleared: bool,
    #[serde(default = "Vec::new")]
    pub removed: Vec<K>,
    #[serde(default = "Vec::new")]
    pub updated: Vec<MapEntryDelta<K, SetDelta<V>>>,
}

/// Map from keys to replicated sets of values
#[derive(Debug, Clone)]
pub struct MultiMap<K, V> {
    sets: OrMap<K, OrSet<V>>,
}

impl<K, V> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self {
            sets: OrMap::default(),
        }
    }
}

impl<K, V> MultiMap<K, V>
where
    K: Canonical + Clone,
    V: Canonical + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Values stored under `key`
    pub fn get(&self, key: &K) -> Option<&OrSet<V>> {
        self.sets.get(key)
    }

    /// Associate `value` with `key`. Returns `false` if already associated.
    pub fn put(&mut self, key: K, value: V) -> bool {
        self.sets.get_or_insert_with(key, |_| OrSet::new()).add(value)
    }

    /// Associate every value with `key`, returning how many were new
    pub fn put_all<I>(&mut self, key: K, values: I) -> usize
    where
        I: IntoIterator<Item = V>,
    {
        let values: Vec<V> = values.into_iter().collect();
        if values.is_empty() {
            return 0;
        }
        self.sets.get_or_insert_with(key, |_| OrSet::new()).add_all(values)
    }

    /// Remove a single association. Removing the last value removes the key.
    pub fn delete(&mut self, key: &K, value: &V) -> bool {
        let Some(set) = self.sets.get_mut(key) else {
            return false;
        };
        if !set.contains(value) {
            return false;
        }
        if set.len() == 1 {
            self.sets.delete(key)
        } else {
            set.delete(value)
        }
    }

    /// Remove every value associated with `key`
    pub fn delete_all(&mut self, key: &K) -> bool {
        self.sets.delete(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.sets.contains_key(key)
    }

    pub fn contains_value(&self, key: &K, value: &V) -> bool {
        self.sets.get(key).is_some_and(|set| set.contains(value))
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.sets.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &OrSet<V>)> {
        self.sets.iter()
    }

    /// Total number of key/value associations
    pub fn size(&self) -> usize {
        self.sets.values().map(OrSet::len).sum()
    }

    /// Number of distinct keys
    pub fn keys_size(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl<K, V> DeltaCrdt for MultiMap<K, V>
where
    K: Canonical + Clone,
    V: Canonical + Clone,
{
    type Delta = MultiMapDelta<K, V>;

    fn take_delta(&mut self, initial: bool) -> Option<MultiMapDelta<K, V>> {
        let delta = self.sets.take_delta(initial)?;
        Some(MultiMapDelta {
            cleared: delta.cleared,
            removed: delta.removed,
            updated: delta.added.into_iter().chain(delta.updated).collect(),
        })
    }

    fn apply_delta(&mut self, delta: MultiMapDelta<K, V>) -> Result<()> {
        self.sets.apply_delta(MapDelta {
            cleared: delta.cleared,
            removed: delta.removed,
            added: Vec::new(),
            updated: delta.updated,
        })?;

        let emptied: Vec<K> = self
            .sets
            .iter()
            .filter(|(_, set)| set.is_empty())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &emptied {
            self.sets.forget(key);
        }
        Ok(())
    }

    fn has_pending_delta(&self) -> bool {
        self.sets.has_pending_delta()
    }
}

impl<K, V> FromDelta for MultiMap<K, V>
where
    K: Canonical + Clone,
    V: Canonical + Clone,
{
    fn from_delta(_delta: &MultiMapDelta<K, V>) -> Result<Self> {
        Ok(Self::new())
    }
}
