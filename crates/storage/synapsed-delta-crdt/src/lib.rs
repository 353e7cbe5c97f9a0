//! # Synapsed Delta CRDT
//!
//! Delta-state Conflict-free Replicated Data Types for replicated component
//! state.
//!
//! Every CRDT records its local mutations in pending buffers. At a
//! synchronization point the host drains the net change with
//! [`DeltaCrdt::take_delta`] and hands it to the replication runtime; deltas
//! from other replicas are folded in with [`DeltaCrdt::apply_delta`].
//! Mutations that cancel within one cycle, such as adding then removing the
//! same element, never reach the wire.
//!
//! ## Supported CRDTs
//!
//! - **PN-Counter**: Increment/Decrement counter
//! - **OR-Set**: Observed-Remove Set keyed by canonical encoding
//! - **LWW-Register**: Last-Writer-Wins register with clock policies
//! - **Flag**: Boolean that can only be enabled
//! - **Vote**: Quorum tally of per-replica votes
//! - **OR-Map**: Map of nested CRDTs
//! - **Counter Map**, **Register Map**, **Multi Map**: OR-Map specializations
//!   with flattened deltas
//!
//! ## Example
//!
//! ```rust
//! use synapsed_delta_crdt::{DeltaCrdt, OrSet};
//!
//! let mut local = OrSet::new();
//! let mut remote = OrSet::new();
//!
//! local.add("a".to_string());
//! local.add("b".to_string());
//! local.delete(&"b".to_string());
//!
//! // Only the net change is shipped
//! let delta = local.take_delta(false).unwrap();
//! assert_eq!(delta.added, vec!["a".to_string()]);
//!
//! remote.apply_delta(delta).unwrap();
//! assert!(remote.contains(&"a".to_string()));
//! ```

pub mod error;
pub mod types;
pub mod traits;

// CRDT implementations
pub mod pn_counter;
pub mod or_set;
pub mod lww_register;
pub mod flag;
pub mod vote;
pub mod or_map;
pub mod counter_map;
pub mod register_map;
pub mod multi_map;

// Heterogeneous trees and replication surface
pub mod canonical;
pub mod clock;
pub mod config;
pub mod data;
pub mod delta;
pub mod replica;

// Re-exports for convenience
pub use error::{CrdtError, Result};
pub use types::{ReplicaId, WriteConsistency};
pub use traits::{DeltaCrdt, FromDelta};

pub use canonical::{Canonical, CanonicalKey, Value};
pub use clock::Clock;
pub use config::ReplicaConfig;
pub use data::ReplicatedData;
pub use delta::{DeltaKind, ReplicatedDelta};
pub use replica::{DeltaStatistics, OutgoingDelta, ReplicatedState};

pub use counter_map::{CounterMap, CounterMapDelta, CounterMapEntryDelta};
pub use flag::{Flag, FlagDelta};
pub use lww_register::{LwwRegister, RegisterDelta};
pub use multi_map::{MultiMap, MultiMapDelta};
pub use or_map::{MapDelta, MapEntryDelta, OrMap};
pub use or_set::{OrSet, SetDelta};
pub use pn_counter::{CounterDelta, PnCounter};
pub use register_map::{RegisterMap, RegisterMapDelta, RegisterMapEntryDelta};
pub use vote::{Vote, VoteDelta};
