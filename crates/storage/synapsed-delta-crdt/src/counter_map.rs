//! Counter Map: an OR-Map of PN-Counters with a flattened delta encoding.
//!
//! Entries in the delta carry the raw counter change instead of a nested
//! counter delta. Keys are materialized on first increment.

use crate::{
    canonical::Canonical,
    error::Result,
    or_map::{MapDelta, MapEntryDelta, OrMap},
    pn_counter::{CounterDelta, PnCounter},
    traits::{DeltaCrdt, FromDelta},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterMapEntryDelta<K> {
    pub key: K,
    pub change: i64,
}

/// Counter Map delta
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterMapDelta<K> {
    #[serde(default)]
    pub cleared: bool,
    #[serde(default = "Vec::new")]
    pub removed: Vec<K>,
    /// New and changed counters alike
    #[serde(default = "Vec::new")]
    pub updated: Vec<CounterMapEntryDelta<K>>,
}

/// Map of replicated counters
#[derive(Debug, Clone)]
pub struct CounterMap<K> {
    counters: OrMap<K, PnCounter>,
}

impl<K> Default for CounterMap<K> {
    fn default() -> Self {
        Self {
            counters: OrMap::default(),
        }
    }
}

impl<K> CounterMap<K>
where
    K: Canonical + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the counter for `key`, `None` if it does not exist
    pub fn get(&self, key: &K) -> Option<i64> {
        self.counters.get(key).map(PnCounter::value)
    }

    /// Increment the counter for `key`, creating it if needed.
    ///
    /// Returns the new value.
    pub fn increment(&mut self, key: K, amount: i64) -> i64 {
        let counter = self.counters.get_or_insert_with(key, |_| PnCounter::new());
        counter.increment(amount);
        counter.value()
    }

    /// Decrement the counter for `key`, creating it if needed.
    ///
    /// Returns the new value.
    pub fn decrement(&mut self, key: K, amount: i64) -> i64 {
        self.increment(key, amount.wrapping_neg())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.counters.contains_key(key)
    }

    /// Remove the counter for `key`
    pub fn delete(&mut self, key: &K) -> bool {
        self.counters.delete(key)
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.counters.keys()
    }

    /// Iterate keys and counter values
    pub fn iter(&self) -> impl Iterator<Item = (&K, i64)> {
        self.counters.iter().map(|(key, counter)| (key, counter.value()))
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl<K> DeltaCrdt for CounterMap<K>
where
    K: Canonical + Clone,
{
    type Delta = CounterMapDelta<K>;

    fn take_delta(&mut self, initial: bool) -> Option<CounterMapDelta<K>> {
        let delta = self.counters.take_delta(initial)?;
        Some(CounterMapDelta {
            cleared: delta.cleared,
            removed: delta.removed,
            updated: delta
                .added
                .into_iter()
                .chain(delta.updated)
                .map(|entry| CounterMapEntryDelta {
                    key: entry.key,
                    change: entry.delta.change,
                })
                .collect(),
        })
    }

    fn apply_delta(&mut self, delta: CounterMapDelta<K>) -> Result<()> {
        self.counters.apply_delta(MapDelta {
            cleared: delta.cleared,
            removed: delta.removed,
            added: Vec::new(),
            updated: delta
                .updated
                .into_iter()
                .map(|entry| MapEntryDelta {
                    key: entry.key,
                    delta: CounterDelta {
                        change: entry.change,
                    },
                })
                .collect(),
        })
    }

    fn has_pending_delta(&self) -> bool {
        self.counters.has_pending_delta()
    }
}

impl<K> FromDelta for CounterMap<K>
where
    K: Canonical + Clone,
{
    fn from_delta(_delta: &CounterMapDelta<K>) -> Result<Self> {
        Ok(Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, change: i64) -> CounterMapEntryDelta<String> {
        CounterMapEntryDelta {
            key: key.to_string(),
            change,
        }
    }

    #[test]
    fn test_counter_map_increment_creates_key() {
        let mut map = CounterMap::new();

        assert_eq!(map.get(&"hits".to_string()), None);
        assert_eq!(map.increment("hits".to_string(), 3), 3);
        assert_eq!(map.decrement("hits".to_string(), 1), 2);

        let delta = map.take_delta(false).unwrap();
        assert_eq!(delta.updated, vec![entry("hits", 2)]);
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn test_counter_map_update_existing() {
        let mut map = CounterMap::new();
        map.increment("a".to_string(), 1);
        map.increment("b".to_string(), 1);
        map.take_delta(false);

        map.increment("b".to_string(), 5);

        let delta = map.take_delta(false).unwrap();
        assert_eq!(delta.updated, vec![entry("b", 5)]);
        assert_eq!(map.take_delta(false), None);
    }

    #[test]
    fn test_counter_map_delete_and_recreate() {
        let mut map = CounterMap::new();
        map.increment("a".to_string(), 1);
        map.increment("b".to_string(), 1);
        map.take_delta(false);

        map.delete(&"a".to_string());
        map.increment("a".to_string(), 4);

        assert_eq!(map.get(&"a".to_string()), Some(4));
        let delta = map.take_delta(false).unwrap();
        assert_eq!(delta.removed, vec!["a".to_string()]);
        assert_eq!(delta.updated, vec![entry("a", 4)]);
    }

    #[test]
    fn test_counter_map_apply_remote() {
        let mut map = CounterMap::new();
        map.increment("a".to_string(), 1);
        map.take_delta(false);

        map.apply_delta(CounterMapDelta {
            cleared: false,
            removed: vec![],
            updated: vec![entry("a", 2), entry("z", -3)],
        })
        .unwrap();

        assert_eq!(map.get(&"a".to_string()), Some(3));
        assert_eq!(map.get(&"z".to_string()), Some(-3));
        assert_eq!(map.len(), 2);
        assert!(!map.has_pending_delta());

        map.apply_delta(CounterMapDelta {
            cleared: true,
            removed: vec![],
            updated: vec![entry("q", 1)],
        })
        .unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["q"]);
    }
}
