//! Last-Writer-Wins Register CRDT implementation
//!
//! LWW-Register stores a single value. Each local write is tagged with a
//! [`Clock`] policy, and for custom clocks an application ordinal. The winner
//! among concurrent writers is chosen by the replication runtime, so a remote
//! delta always replaces the local value.

use crate::{
    clock::Clock,
    error::Result,
    traits::{DeltaCrdt, FromDelta},
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// LWW Register delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDelta<T> {
    /// New value
    pub value: T,
    /// Clock the write was made with
    #[serde(default)]
    pub clock: Clock,
    /// Ordinal for custom clocks, zero otherwise
    #[serde(default)]
    pub custom_clock_value: i64,
}

/// Last-Writer-Wins Register CRDT
#[derive(Debug, Clone, PartialEq)]
pub struct LwwRegister<T> {
    value: T,
    clock: Clock,
    custom_clock_value: i64,
    pending_write: bool,
}

impl<T> LwwRegister<T>
where
    T: Clone,
{
    /// Create a register holding `value`.
    ///
    /// The initial value is not a pending write; it is shipped by the initial
    /// snapshot delta.
    pub fn new(value: T) -> Self {
        Self {
            value,
            clock: Clock::Default,
            custom_clock_value: 0,
            pending_write: false,
        }
    }

    /// Create a register whose initial value is written with the given clock
    pub fn with_clock(value: T, clock: Clock, custom_clock_value: Option<i64>) -> Self {
        let mut register = Self::new(value.clone());
        register.set_with_clock(value, clock, custom_clock_value);
        register
    }

    /// Get current value
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Set value with the default clock
    pub fn set(&mut self, value: T) {
        self.set_with_clock(value, Clock::Default, None);
    }

    /// Set value with an explicit clock.
    ///
    /// The last local write of a cycle wins locally; earlier writes are not
    /// shipped.
    pub fn set_with_clock(&mut self, value: T, clock: Clock, custom_clock_value: Option<i64>) {
        self.value = value;
        self.clock = clock;
        self.custom_clock_value = if clock.uses_custom_value() {
            custom_clock_value.unwrap_or(0)
        } else {
            0
        };
        self.pending_write = true;
    }

    /// Clock of the pending write, `Clock::Default` once taken
    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn custom_clock_value(&self) -> i64 {
        self.custom_clock_value
    }
}

impl<T> DeltaCrdt for LwwRegister<T>
where
    T: Clone,
{
    type Delta = RegisterDelta<T>;

    fn take_delta(&mut self, initial: bool) -> Option<RegisterDelta<T>> {
        if !self.pending_write && !initial {
            return None;
        }
        let delta = RegisterDelta {
            value: self.value.clone(),
            clock: self.clock,
            custom_clock_value: self.custom_clock_value,
        };
        tracing::trace!(clock = %delta.clock, initial, "Taking register delta");
        self.pending_write = false;
        self.clock = Clock::Default;
        self.custom_clock_value = 0;
        Some(delta)
    }

    fn apply_delta(&mut self, delta: RegisterDelta<T>) -> Result<()> {
        self.value = delta.value;
        Ok(())
    }

    fn has_pending_delta(&self) -> bool {
        self.pending_write
    }
}

impl<T> FromDelta for LwwRegister<T>
where
    T: Clone,
{
    fn from_delta(delta: &RegisterDelta<T>) -> Result<Self> {
        Ok(Self::new(delta.value.clone()))
    }
}

impl<T> Display for LwwRegister<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LWW-Register({})", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lww_register_initial_value() {
        let mut register = LwwRegister::new("hello".to_string());

        assert_eq!(register.value(), "hello");
        assert_eq!(register.take_delta(false), None);

        let delta = register.take_delta(true).unwrap();
        assert_eq!(delta.value, "hello");
        assert_eq!(delta.clock, Clock::Default);
    }

    #[test]
    fn test_lww_register_last_local_write_wins() {
        let mut register = LwwRegister::new(1i64);

        register.set(2);
        register.set(3);

        assert_eq!(*register.value(), 3);
        let delta = register.take_delta(false).unwrap();
        assert_eq!(delta.value, 3);
        assert_eq!(register.take_delta(false), None);
    }

    #[test]
    fn test_lww_register_rewrite_same_value_still_emits() {
        let mut register = LwwRegister::new("a".to_string());
        register.set("a".to_string());
        assert!(register.take_delta(false).is_some());
    }

    #[test]
    fn test_lww_register_custom_clock() {
        let mut register = LwwRegister::new("v0".to_string());

        register.set_with_clock("v1".to_string(), Clock::Custom, Some(10));

        let delta = register.take_delta(false).unwrap();
        assert_eq!(delta.clock, Clock::Custom);
        assert_eq!(delta.custom_clock_value, 10);

        // Clock resets once the write has been taken
        assert_eq!(register.clock(), Clock::Default);
        let delta = register.take_delta(true).unwrap();
        assert_eq!(delta.clock, Clock::Default);
        assert_eq!(delta.custom_clock_value, 0);
    }

    #[test]
    fn test_lww_register_custom_value_ignored_for_system_clocks() {
        let mut register = LwwRegister::new(0i64);
        register.set_with_clock(1, Clock::Reverse, Some(99));
        let delta = register.take_delta(false).unwrap();
        assert_eq!(delta.clock, Clock::Reverse);
        assert_eq!(delta.custom_clock_value, 0);
    }

    #[test]
    fn test_lww_register_apply_remote_replaces_value() {
        let mut register = LwwRegister::new("local".to_string());

        register
            .apply_delta(RegisterDelta {
                value: "remote".to_string(),
                clock: Clock::Reverse,
                custom_clock_value: 0,
            })
            .unwrap();

        assert_eq!(register.value(), "remote");
        assert!(!register.has_pending_delta());
    }

    #[test]
    fn test_lww_register_from_delta() {
        let delta = RegisterDelta {
            value: 7i64,
            clock: Clock::Default,
            custom_clock_value: 0,
        };
        let mut register = LwwRegister::from_delta(&delta).unwrap();
        register.apply_delta(delta).unwrap();
        assert_eq!(*register.value(), 7);
    }
}
