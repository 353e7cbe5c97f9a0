//! Clock policies for register writes
//!
//! A register write is tagged with the clock that orders it against
//! concurrent writes from other replicas. The ordering itself is decided by
//! the replication runtime before a delta reaches this crate.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Ordering rule attached to a register write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clock {
    /// System time of the writing replica
    #[default]
    Default,
    /// Reversed system time, so the earliest write wins
    Reverse,
    /// Application supplied ordinal
    Custom,
    /// Application supplied ordinal, bumped by one if not ahead of the current clock
    CustomAutoIncrement,
}

impl Clock {
    /// Whether writes with this clock carry an application ordinal
    pub fn uses_custom_value(&self) -> bool {
        matches!(self, Clock::Custom | Clock::CustomAutoIncrement)
    }
}

impl Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Clock::Default => "default",
            Clock::Reverse => "reverse",
            Clock::Custom => "custom",
            Clock::CustomAutoIncrement => "custom_auto_increment",
        };
        f.write_str(name)
    }
}
