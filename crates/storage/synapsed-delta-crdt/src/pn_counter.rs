//! PN-Counter (Increment/Decrement Counter) CRDT implementation
//!
//! Every replica may increment or decrement. Local changes accumulate into a
//! single pending change that is shipped as one delta; remote deltas add their
//! change to the local value.
//!
//! Arithmetic is 64-bit two's complement and wraps on overflow.

use crate::{
    error::Result,
    traits::{DeltaCrdt, FromDelta},
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Counter delta: the net change since the last synchronization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDelta {
    pub change: i64,
}

/// PN-Counter CRDT
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PnCounter {
    /// Cumulative value, local and remote
    value: i64,
    /// Local change not yet taken
    pending: i64,
}

impl PnCounter {
    /// Create new counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment counter, any sign accepted
    pub fn increment(&mut self, amount: i64) {
        self.value = self.value.wrapping_add(amount);
        self.pending = self.pending.wrapping_add(amount);
    }

    /// Decrement counter
    pub fn decrement(&mut self, amount: i64) {
        self.increment(amount.wrapping_neg());
    }

    /// Get current counter value
    pub fn value(&self) -> i64 {
        self.value
    }
}

impl DeltaCrdt for PnCounter {
    type Delta = CounterDelta;

    fn take_delta(&mut self, initial: bool) -> Option<CounterDelta> {
        if self.pending == 0 && !initial {
            return None;
        }
        let change = std::mem::take(&mut self.pending);
        tracing::trace!(change, initial, "Taking counter delta");
        Some(CounterDelta { change })
    }

    fn apply_delta(&mut self, delta: CounterDelta) -> Result<()> {
        self.value = self.value.wrapping_add(delta.change);
        Ok(())
    }

    fn has_pending_delta(&self) -> bool {
        self.pending != 0
    }
}

impl FromDelta for PnCounter {
    fn from_delta(_delta: &CounterDelta) -> Result<Self> {
        Ok(Self::new())
    }
}

impl Display for PnCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PN-Counter({})", self.value)
    }
}
