//! Observed-Remove Map (OR-Map) CRDT implementation
//!
//! Maps canonical keys to nested CRDT values. Key membership follows OR-Set
//! rules; the nested values carry their own deltas.
//!
//! Two kinds of change are distinguished for an existing key:
//! - storing a new value instance with [`OrMap::set`] is a replacement and
//!   surfaces as a `removed` plus `added` pair,
//! - mutating the value obtained from [`OrMap::get_mut`] surfaces as an
//!   `updated` entry carrying the nested delta.

use crate::{
    canonical::{Canonical, CanonicalKey},
    error::Result,
    traits::{DeltaCrdt, FromDelta},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{btree_map, BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};
use tracing::debug;

/// Factory producing the value for a key read before it was set
pub type DefaultValueFn<K, V> = Arc<dyn Fn(&K) -> V + Send + Sync>;

/// Delta for a single map entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEntryDelta<K, D> {
    pub key: K,
    pub delta: D,
}

/// OR-Map delta.
///
/// Applied in field order: `cleared`, `removed`, `added`, `updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDelta<K, D> {
    #[serde(default)]
    pub cleared: bool,
    #[serde(default = "Vec::new")]
    pub removed: Vec<K>,
    /// New entries, each with the full initial delta of its value
    #[serde(default = "Vec::new")]
    pub added: Vec<MapEntryDelta<K, D>>,
    /// Existing entries whose value changed in place
    #[serde(default = "Vec::new")]
    pub updated: Vec<MapEntryDelta<K, D>>,
}

impl<K, D> MapDelta<K, D> {
    pub fn is_empty(&self) -> bool {
        !self.cleared && self.removed.is_empty() && self.added.is_empty() && self.updated.is_empty()
    }
}

impl<K, D> Default for MapDelta<K, D> {
    fn default() -> Self {
        Self {
            cleared: false,
            removed: Vec::new(),
            added: Vec::new(),
            updated: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct MapEntry<K, V> {
    key: K,
    value: V,
}

/// Observed-Remove Map CRDT
#[derive(Clone)]
pub struct OrMap<K, V> {
    entries: BTreeMap<CanonicalKey, MapEntry<K, V>>,
    /// Keys set since the last delta, always present in `entries`
    pending_added: BTreeSet<CanonicalKey>,
    /// Synchronized keys removed or replaced since the last delta
    pending_removed: BTreeMap<CanonicalKey, K>,
    pending_cleared: bool,
    default_value: Option<DefaultValueFn<K, V>>,
}

impl<K, V> Default for OrMap<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            pending_added: BTreeSet::new(),
            pending_removed: BTreeMap::new(),
            pending_cleared: false,
            default_value: None,
        }
    }
}

impl<K, V> OrMap<K, V>
where
    K: Canonical + Clone,
    V: DeltaCrdt,
{
    /// Create new empty OR-Map
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map that materializes absent keys with `factory`
    /// in [`get_or_insert_default`](OrMap::get_or_insert_default).
    pub fn with_default_value<F>(factory: F) -> Self
    where
        F: Fn(&K) -> V + Send + Sync + 'static,
    {
        Self {
            default_value: Some(Arc::new(factory)),
            ..Self::default()
        }
    }

    /// Store a value under `key`.
    ///
    /// Replacing the value of a synchronized key is recorded as a removal of
    /// the old entry followed by an addition of the new one.
    pub fn set(&mut self, key: K, value: V) {
        let canonical = key.canonical_key();
        if self.entries.contains_key(&canonical) && !self.pending_added.contains(&canonical) {
            self.pending_removed.insert(canonical.clone(), key.clone());
        }
        self.pending_added.insert(canonical.clone());
        self.entries.insert(canonical, MapEntry { key, value });
    }

    /// Get the value for `key`, `None` if absent
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(&key.canonical_key()).map(|entry| &entry.value)
    }

    /// Get the value for `key` for in-place mutation.
    ///
    /// Changes made through the returned reference are shipped as `updated`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries
            .get_mut(&key.canonical_key())
            .map(|entry| &mut entry.value)
    }

    /// Get the value for `key`, first storing `factory(&key)` if absent.
    ///
    /// A value created here is recorded as added.
    pub fn get_or_insert_with<F>(&mut self, key: K, factory: F) -> &mut V
    where
        F: FnOnce(&K) -> V,
    {
        match self.entries.entry(key.canonical_key()) {
            btree_map::Entry::Occupied(occupied) => &mut occupied.into_mut().value,
            btree_map::Entry::Vacant(vacant) => {
                let value = factory(&key);
                self.pending_added.insert(vacant.key().clone());
                &mut vacant.insert(MapEntry { key, value }).value
            }
        }
    }

    /// Get the value for `key`, materializing it with the map's default
    /// value factory if absent.
    ///
    /// Returns `None` if the key is absent and the map has no factory.
    pub fn get_or_insert_default(&mut self, key: K) -> Option<&mut V> {
        if !self.contains_key(&key) {
            let factory = self.default_value.clone()?;
            return Some(self.get_or_insert_with(key, |k| factory(k)));
        }
        self.get_mut(&key)
    }

    /// Remove `key`. Returns `false` if it was absent.
    pub fn delete(&mut self, key: &K) -> bool {
        let canonical = key.canonical_key();
        if !self.entries.contains_key(&canonical) {
            return false;
        }

        if self.entries.len() == 1 && !self.pending_added.contains(&canonical) {
            // Removing every synchronized key: encode as a clear
            self.clear();
            return true;
        }

        if let Some(entry) = self.entries.remove(&canonical) {
            if !self.pending_added.remove(&canonical) {
                self.pending_removed.insert(canonical, entry.key);
            }
        }
        true
    }

    /// Remove every entry.
    ///
    /// Supersedes all other pending changes of this cycle, including pending
    /// changes inside nested values.
    pub fn clear(&mut self) {
        if self.entries.is_empty() && self.pending_removed.is_empty() {
            return;
        }
        self.entries.clear();
        self.pending_added.clear();
        self.pending_removed.clear();
        self.pending_cleared = true;
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(&key.canonical_key())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate keys in canonical order
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.values().map(|entry| &entry.key)
    }

    /// Iterate entries in canonical key order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.values().map(|entry| (&entry.key, &entry.value))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|entry| &entry.value)
    }

    /// Apply a remote delta, constructing values for unseen keys with
    /// `factory`.
    ///
    /// Every added and updated value is built before the map is touched, so a
    /// delta that fails leaves the map unchanged.
    pub fn apply_delta_with<F>(&mut self, delta: MapDelta<K, V::Delta>, mut factory: F) -> Result<()>
    where
        F: FnMut(&V::Delta) -> Result<V>,
        V: Clone,
    {
        debug!(
            cleared = delta.cleared,
            removed = delta.removed.len(),
            added = delta.added.len(),
            updated = delta.updated.len(),
            "Applying map delta"
        );

        let MapDelta {
            cleared,
            removed,
            added,
            updated,
        } = delta;
        let removed: BTreeSet<CanonicalKey> = removed.iter().map(|key| key.canonical_key()).collect();

        let mut added_keys = BTreeSet::new();
        let mut staged: BTreeMap<CanonicalKey, MapEntry<K, V>> = BTreeMap::new();
        for MapEntryDelta { key, delta } in added {
            let mut value = factory(&delta)?;
            value.apply_delta(delta)?;
            let canonical = key.canonical_key();
            added_keys.insert(canonical.clone());
            staged.insert(canonical, MapEntry { key, value });
        }
        for MapEntryDelta { key, delta } in updated {
            let entry = match staged.entry(key.canonical_key()) {
                btree_map::Entry::Occupied(occupied) => occupied.into_mut(),
                btree_map::Entry::Vacant(vacant) => {
                    let existing = if cleared || removed.contains(vacant.key()) {
                        None
                    } else {
                        self.entries.get(vacant.key())
                    };
                    let entry = match existing {
                        Some(existing) => existing.clone(),
                        None => {
                            debug!("Materializing value for update to unseen key");
                            MapEntry {
                                value: factory(&delta)?,
                                key,
                            }
                        }
                    };
                    vacant.insert(entry)
                }
            };
            entry.value.apply_delta(delta)?;
        }

        if cleared {
            self.entries.clear();
            self.pending_added.clear();
        }
        for canonical in &removed {
            self.entries.remove(canonical);
            self.pending_added.remove(canonical);
        }
        for (canonical, entry) in staged {
            if added_keys.contains(&canonical) {
                self.pending_added.remove(&canonical);
            }
            self.entries.insert(canonical, entry);
        }
        Ok(())
    }

    /// Drop an entry without recording a removal.
    ///
    /// Used by specializations to prune entries emptied by a remote delta.
    pub(crate) fn forget(&mut self, key: &K) {
        let canonical = key.canonical_key();
        self.entries.remove(&canonical);
        self.pending_added.remove(&canonical);
    }
}

impl<K, V> DeltaCrdt for OrMap<K, V>
where
    K: Canonical + Clone,
    V: FromDelta + Clone,
{
    type Delta = MapDelta<K, V::Delta>;

    fn take_delta(&mut self, initial: bool) -> Option<Self::Delta> {
        let mut added = Vec::new();
        let mut updated = Vec::new();
        for (canonical, entry) in self.entries.iter_mut() {
            let is_new = self.pending_added.contains(canonical);
            if let Some(delta) = entry.value.take_delta(is_new) {
                let entry_delta = MapEntryDelta {
                    key: entry.key.clone(),
                    delta,
                };
                if is_new {
                    added.push(entry_delta);
                } else {
                    updated.push(entry_delta);
                }
            }
        }

        if !initial
            && !self.pending_cleared
            && self.pending_removed.is_empty()
            && added.is_empty()
            && updated.is_empty()
        {
            return None;
        }

        self.pending_added.clear();
        let delta = MapDelta {
            cleared: std::mem::take(&mut self.pending_cleared),
            removed: std::mem::take(&mut self.pending_removed).into_values().collect(),
            added,
            updated,
        };
        debug!(
            cleared = delta.cleared,
            removed = delta.removed.len(),
            added = delta.added.len(),
            updated = delta.updated.len(),
            initial,
            "Taking map delta"
        );
        Some(delta)
    }

    fn apply_delta(&mut self, delta: Self::Delta) -> Result<()> {
        self.apply_delta_with(delta, V::from_delta)
    }

    fn has_pending_delta(&self) -> bool {
        self.pending_cleared
            || !self.pending_added.is_empty()
            || !self.pending_removed.is_empty()
            || self.entries.values().any(|entry| entry.value.has_pending_delta())
    }
}

impl<K, V> FromDelta for OrMap<K, V>
where
    K: Canonical + Clone,
    V: FromDelta + Clone,
{
    fn from_delta(_delta: &Self::Delta) -> Result<Self> {
        Ok(Self::new())
    }
}

impl<K, V> fmt::Debug for OrMap<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrMap")
            .field(
                "entries",
                &self
                    .entries
                    .values()
                    .map(|entry| (&entry.key, &entry.value))
                    .collect::<Vec<_>>(),
            )
            .field("pending_added", &self.pending_added.len())
            .field("pending_removed", &self.pending_removed.len())
            .field("pending_cleared", &self.pending_cleared)
            .field("default_value", &self.default_value.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pn_counter::{CounterDelta, PnCounter};

    type CounterOrMap = OrMap<String, PnCounter>;

    fn key(k: &str) -> String {
        k.to_string()
    }

    fn counter(value: i64) -> PnCounter {
        let mut counter = PnCounter::new();
        counter.increment(value);
        counter
    }

    #[test]
    fn test_or_map_set_emits_added_with_full_delta() {
        let mut map = CounterOrMap::new();

        map.set(key("a"), counter(3));
        map.set(key("b"), PnCounter::new());

        let delta = map.take_delta(false).unwrap();
        assert!(!delta.cleared);
        assert_eq!(delta.added.len(), 2);
        assert_eq!(delta.added[0].key, "a");
        assert_eq!(delta.added[0].delta, CounterDelta { change: 3 });
        // A fresh counter still ships so the receiver materializes it
        assert_eq!(delta.added[1].delta, CounterDelta { change: 0 });
        assert!(delta.updated.is_empty());
        assert_eq!(map.take_delta(false), None);
    }

    #[test]
    fn test_or_map_in_place_update() {
        let mut map = CounterOrMap::new();
        map.set(key("one"), PnCounter::new());
        map.take_delta(false);

        map.get_mut(&key("one")).unwrap().increment(5);

        let delta = map.take_delta(false).unwrap();
        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
        assert_eq!(
            delta.updated,
            vec![MapEntryDelta {
                key: key("one"),
                delta: CounterDelta { change: 5 },
            }]
        );
    }

    #[test]
    fn test_or_map_replace_is_remove_and_add() {
        let mut map = CounterOrMap::new();
        map.set(key("one"), counter(1));
        map.set(key("two"), counter(2));
        map.take_delta(false);

        map.set(key("one"), counter(10));

        let delta = map.take_delta(false).unwrap();
        assert_eq!(delta.removed, vec![key("one")]);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].delta, CounterDelta { change: 10 });
        assert!(delta.updated.is_empty());
    }

    #[test]
    fn test_or_map_replace_unsynced_key_stays_added() {
        let mut map = CounterOrMap::new();
        map.set(key("one"), counter(1));
        map.set(key("one"), counter(2));

        let delta = map.take_delta(false).unwrap();
        assert!(delta.removed.is_empty());
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].delta, CounterDelta { change: 2 });
    }

    #[test]
    fn test_or_map_delete_unsynced_key_cancels() {
        let mut map = CounterOrMap::new();
        map.set(key("a"), counter(1));
        map.set(key("b"), counter(1));
        map.take_delta(false);

        map.set(key("c"), counter(1));
        assert!(map.delete(&key("c")));
        assert!(!map.delete(&key("missing")));

        assert_eq!(map.take_delta(false), None);
    }

    #[test]
    fn test_or_map_delete_synced_key() {
        let mut map = CounterOrMap::new();
        map.set(key("a"), counter(1));
        map.set(key("b"), counter(1));
        map.take_delta(false);

        map.get_mut(&key("a")).unwrap().increment(1);
        map.delete(&key("a"));

        let delta = map.take_delta(false).unwrap();
        assert_eq!(delta.removed, vec![key("a")]);
        assert!(delta.updated.is_empty());
    }

    #[test]
    fn test_or_map_delete_last_synced_key_clears() {
        let mut map = CounterOrMap::new();
        map.set(key("a"), counter(1));
        map.take_delta(false);

        map.delete(&key("a"));

        let delta = map.take_delta(false).unwrap();
        assert!(delta.cleared);
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn test_or_map_clear_dominates() {
        let mut map = CounterOrMap::new();
        map.set(key("a"), PnCounter::new());
        map.set(key("b"), PnCounter::new());
        map.take_delta(false);

        map.get_mut(&key("b")).unwrap().increment(10);
        map.set(key("a"), PnCounter::new());
        map.clear();

        let delta = map.take_delta(false).unwrap();
        assert!(delta.cleared);
        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
        assert!(delta.updated.is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn test_or_map_mutations_after_clear_accumulate() {
        let mut map = CounterOrMap::new();
        map.set(key("a"), counter(1));
        map.take_delta(false);

        map.clear();
        map.set(key("b"), counter(2));

        let delta = map.take_delta(false).unwrap();
        assert!(delta.cleared);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].key, "b");
    }

    #[test]
    fn test_or_map_absent_without_default() {
        let mut map = CounterOrMap::new();
        assert!(map.get(&key("x")).is_none());
        assert!(map.get_or_insert_default(key("x")).is_none());
        assert_eq!(map.take_delta(false), None);
    }

    #[test]
    fn test_or_map_default_value_materializes_as_added() {
        let mut map: CounterOrMap = OrMap::with_default_value(|_| PnCounter::new());

        map.get_or_insert_default(key("x")).unwrap().increment(4);
        map.get_or_insert_default(key("x")).unwrap().increment(1);

        assert_eq!(map.get(&key("x")).map(PnCounter::value), Some(5));
        let delta = map.take_delta(false).unwrap();
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].delta, CounterDelta { change: 5 });
    }

    #[test]
    fn test_or_map_initial_delta_is_present() {
        let mut map = CounterOrMap::new();
        let delta = map.take_delta(true).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn test_or_map_apply_remote() {
        let mut map = CounterOrMap::new();
        map.set(key("keep"), counter(1));
        map.set(key("drop"), counter(1));
        map.take_delta(false);

        map.apply_delta(MapDelta {
            cleared: false,
            removed: vec![key("drop")],
            added: vec![MapEntryDelta {
                key: key("new"),
                delta: CounterDelta { change: 7 },
            }],
            updated: vec![
                MapEntryDelta {
                    key: key("keep"),
                    delta: CounterDelta { change: 2 },
                },
                MapEntryDelta {
                    key: key("unseen"),
                    delta: CounterDelta { change: 3 },
                },
            ],
        })
        .unwrap();

        let values: Vec<(&String, i64)> = map.iter().map(|(k, v)| (k, v.value())).collect();
        assert_eq!(
            values,
            vec![(&key("keep"), 3), (&key("new"), 7), (&key("unseen"), 3)]
        );
        assert!(!map.has_pending_delta());
        assert_eq!(map.take_delta(false), None);
    }

    #[test]
    fn test_or_map_apply_with_custom_factory() {
        let mut map = CounterOrMap::new();
        let mut created = 0;

        map.apply_delta_with(
            MapDelta {
                added: vec![MapEntryDelta {
                    key: key("a"),
                    delta: CounterDelta { change: 1 },
                }],
                ..MapDelta::default()
            },
            |_| {
                created += 1;
                Ok(counter(100))
            },
        )
        .unwrap();

        assert_eq!(created, 1);
        assert_eq!(map.get(&key("a")).map(PnCounter::value), Some(101));
    }

    #[test]
    fn test_or_map_failed_apply_leaves_map_unchanged() {
        let mut map = CounterOrMap::new();
        map.set(key("a"), counter(1));
        map.set(key("b"), counter(2));
        map.take_delta(false);

        let result = map.apply_delta_with(
            MapDelta {
                cleared: false,
                removed: vec![key("b")],
                added: vec![MapEntryDelta {
                    key: key("c"),
                    delta: CounterDelta { change: 3 },
                }],
                updated: vec![
                    MapEntryDelta {
                        key: key("a"),
                        delta: CounterDelta { change: 4 },
                    },
                    MapEntryDelta {
                        key: key("unseen"),
                        delta: CounterDelta { change: 5 },
                    },
                ],
            },
            |delta| match delta.change {
                5 => Err(crate::CrdtError::SerializationError("unknown value".into())),
                _ => Ok(PnCounter::new()),
            },
        );

        assert!(result.is_err());
        let values: Vec<(&String, i64)> = map.iter().map(|(k, v)| (k, v.value())).collect();
        assert_eq!(values, vec![(&key("a"), 1), (&key("b"), 2)]);
        assert!(!map.has_pending_delta());
    }

    #[test]
    fn test_or_map_update_after_remove_rematerializes() {
        let mut map = CounterOrMap::new();
        map.set(key("a"), counter(10));
        map.set(key("b"), counter(1));
        map.take_delta(false);

        map.apply_delta(MapDelta {
            removed: vec![key("a")],
            updated: vec![MapEntryDelta {
                key: key("a"),
                delta: CounterDelta { change: 2 },
            }],
            ..MapDelta::default()
        })
        .unwrap();

        assert_eq!(map.get(&key("a")).map(PnCounter::value), Some(2));
    }
}
