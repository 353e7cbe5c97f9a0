//! Flag CRDT: a boolean that can only ever be switched on.

use crate::{
    error::Result,
    traits::{DeltaCrdt, FromDelta},
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDelta {
    pub value: bool,
}

/// Monotonic boolean, merged by OR
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flag {
    value: bool,
    pending_set: bool,
}

impl Flag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.value
    }

    /// Switch the flag on. No-op if it already is.
    pub fn enable(&mut self) {
        if !self.value {
            self.value = true;
            self.pending_set = true;
        }
    }
}

impl DeltaCrdt for Flag {
    type Delta = FlagDelta;

    fn take_delta(&mut self, initial: bool) -> Option<FlagDelta> {
        if !self.pending_set && !initial {
            return None;
        }
        self.pending_set = false;
        Some(FlagDelta { value: self.value })
    }

    fn apply_delta(&mut self, delta: FlagDelta) -> Result<()> {
        self.value |= delta.value;
        Ok(())
    }

    fn has_pending_delta(&self) -> bool {
        self.pending_set
    }
}

impl FromDelta for Flag {
    fn from_delta(_delta: &FlagDelta) -> Result<Self> {
        Ok(Self::new())
    }
}

impl Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flag({})", self.value)
    }
}
