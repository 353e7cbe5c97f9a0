//! Observed-Remove Set (OR-Set) CRDT implementation
//!
//! Elements are identified by their canonical encoding. Pending adds and
//! removes are kept disjoint, so an element added and removed within one
//! synchronization cycle leaves no trace in the emitted delta.
//!
//! Removing the last element of a set that was previously synchronized is
//! encoded as a clear. A receiver applying the delta to the same base state
//! observes the same result either way. Under a concurrent remote add that the
//! sender had not yet observed, the clear also drops that add.

use crate::{
    canonical::{Canonical, CanonicalKey},
    error::Result,
    traits::{DeltaCrdt, FromDelta},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

/// OR-Set delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDelta<T> {
    /// Remove every element before applying `removed` and `added`
    #[serde(default)]
    pub cleared: bool,
    #[serde(default = "Vec::new")]
    pub removed: Vec<T>,
    #[serde(default = "Vec::new")]
    pub added: Vec<T>,
}

impl<T> SetDelta<T> {
    pub fn is_empty(&self) -> bool {
        !self.cleared && self.removed.is_empty() && self.added.is_empty()
    }
}

impl<T> Default for SetDelta<T> {
    fn default() -> Self {
        Self {
            cleared: false,
            removed: Vec::new(),
            added: Vec::new(),
        }
    }
}

/// Observed-Remove Set CRDT
#[derive(Debug, Clone)]
pub struct OrSet<T> {
    /// Current elements by canonical key
    elements: BTreeMap<CanonicalKey, T>,
    /// Added since the last delta, always a subset of `elements`
    pending_adds: BTreeMap<CanonicalKey, T>,
    /// Removed since the last delta, disjoint from `elements`
    pending_removes: BTreeMap<CanonicalKey, T>,
    pending_cleared: bool,
}

impl<T> Default for OrSet<T> {
    fn default() -> Self {
        Self {
            elements: BTreeMap::new(),
            pending_adds: BTreeMap::new(),
            pending_removes: BTreeMap::new(),
            pending_cleared: false,
        }
    }
}

impl<T> OrSet<T>
where
    T: Canonical + Clone,
{
    /// Create new empty OR-Set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add element to the set.
    ///
    /// Returns `false` if the element was already present.
    pub fn add(&mut self, element: T) -> bool {
        let key = element.canonical_key();
        if self.elements.contains_key(&key) {
            return false;
        }
        if self.pending_removes.remove(&key).is_none() {
            self.pending_adds.insert(key.clone(), element.clone());
        }
        self.elements.insert(key, element);
        true
    }

    /// Add every element, returning how many were new
    pub fn add_all<I>(&mut self, elements: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        elements
            .into_iter()
            .map(|element| self.add(element))
            .filter(|added| *added)
            .count()
    }

    /// Remove element from the set.
    ///
    /// Returns `false` if the element was not present.
    pub fn delete(&mut self, element: &T) -> bool {
        let key = element.canonical_key();
        if !self.elements.contains_key(&key) {
            return false;
        }

        if self.elements.len() == 1 && !self.pending_adds.contains_key(&key) {
            // Removing every synchronized element: encode as a clear
            self.clear();
            return true;
        }

        if let Some(removed) = self.elements.remove(&key) {
            if self.pending_adds.remove(&key).is_none() {
                self.pending_removes.insert(key, removed);
            }
        }
        true
    }

    /// Remove every element.
    ///
    /// Supersedes all other pending changes of this cycle.
    pub fn clear(&mut self) {
        if self.elements.is_empty() && self.pending_removes.is_empty() {
            return;
        }
        self.elements.clear();
        self.pending_adds.clear();
        self.pending_removes.clear();
        self.pending_cleared = true;
    }

    /// Check if element is in the set
    pub fn contains(&self, element: &T) -> bool {
        self.elements.contains_key(&element.canonical_key())
    }

    /// Get size of the set
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if set is empty
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterate elements in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.values()
    }

    fn apply_remote(&mut self, delta: SetDelta<T>) {
        if delta.cleared {
            self.elements.clear();
        }
        for element in &delta.removed {
            self.elements.remove(&element.canonical_key());
        }
        for element in delta.added {
            self.elements.insert(element.canonical_key(), element);
        }
    }
}

impl<T> DeltaCrdt for OrSet<T>
where
    T: Canonical + Clone,
{
    type Delta = SetDelta<T>;

    fn take_delta(&mut self, initial: bool) -> Option<SetDelta<T>> {
        if !self.has_pending_delta() && !initial {
            return None;
        }
        let delta = SetDelta {
            cleared: std::mem::take(&mut self.pending_cleared),
            removed: std::mem::take(&mut self.pending_removes).into_values().collect(),
            added: std::mem::take(&mut self.pending_adds).into_values().collect(),
        };
        tracing::trace!(
            cleared = delta.cleared,
            added = delta.added.len(),
            removed = delta.removed.len(),
            "Taking set delta"
        );
        Some(delta)
    }

    fn apply_delta(&mut self, delta: SetDelta<T>) -> Result<()> {
        self.apply_remote(delta);
        Ok(())
    }

    fn has_pending_delta(&self) -> bool {
        self.pending_cleared || !self.pending_adds.is_empty() || !self.pending_removes.is_empty()
    }
}

impl<T> FromDelta for OrSet<T>
where
    T: Canonical + Clone,
{
    fn from_delta(_delta: &SetDelta<T>) -> Result<Self> {
        Ok(Self::new())
    }
}

impl<'a, T> IntoIterator for &'a OrSet<T> {
    type Item = &'a T;
    type IntoIter = std::collections::btree_map::Values<'a, CanonicalKey, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.values()
    }
}

impl<T> Display for OrSet<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elements: Vec<String> = self.elements.values().map(|e| e.to_string()).collect();
        write!(f, "OR-Set{{{}}}", elements.join(", "))
    }
}
