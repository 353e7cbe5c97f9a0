//! Core traits for delta-state CRDT implementations

use crate::Result;

/// Delta protocol implemented by every replicated data type.
///
/// Local mutators record what they changed in pending buffers held by the
/// CRDT itself. At a synchronization point the host drains those buffers with
/// [`take_delta`](DeltaCrdt::take_delta) and ships the result; deltas received
/// from other replicas are folded in with [`apply_delta`](DeltaCrdt::apply_delta).
///
/// Access is single-threaded and non-reentrant, so draining the buffers and
/// computing the delta happen in one `&mut self` call.
pub trait DeltaCrdt {
    /// The delta payload this CRDT emits and absorbs
    type Delta;

    /// Drain the net local mutations since the previous call.
    ///
    /// Returns `None` when nothing changed, unless `initial` is set, in which
    /// case a (possibly empty) delta is always returned so a newly attached
    /// replica can materialize the value.
    fn take_delta(&mut self, initial: bool) -> Option<Self::Delta>;

    /// Fold a delta produced by another replica into local state.
    ///
    /// Remote changes are never recorded as pending local changes.
    fn apply_delta(&mut self, delta: Self::Delta) -> Result<()>;

    /// Whether the next `take_delta(false)` would produce a delta
    fn has_pending_delta(&self) -> bool;
}

/// CRDTs that can be constructed from the first delta observed for them.
pub trait FromDelta: DeltaCrdt + Sized {
    /// Create an empty instance of the kind implied by `delta`.
    ///
    /// The delta itself is not applied; callers follow up with
    /// [`DeltaCrdt::apply_delta`].
    fn from_delta(delta: &Self::Delta) -> Result<Self>;
}
