//! Vote CRDT: a quorum tally where each replica contributes one vote.
//!
//! Only the local replica's own vote is shipped. The tally across replicas is
//! computed by the replication runtime and arrives as a full-state delta.

use crate::{
    error::Result,
    traits::{DeltaCrdt, FromDelta},
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDelta {
    pub self_vote: bool,
    pub votes_for: u32,
    pub total_voters: u32,
}

/// Distributed quorum tally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    self_vote: bool,
    votes_for: u32,
    voters: u32,
    /// Self vote changed since the last delta
    pending_self_vote: Option<bool>,
}

impl Default for Vote {
    fn default() -> Self {
        Self {
            self_vote: false,
            votes_for: 0,
            voters: 1,
            pending_self_vote: None,
        }
    }
}

impl Vote {
    /// Create a vote where this replica is the only known voter
    pub fn new() -> Self {
        Self::default()
    }

    /// This replica's vote
    pub fn vote(&self) -> bool {
        self.self_vote
    }

    /// Change this replica's vote, adjusting the local tally.
    ///
    /// Flipping back within the same cycle cancels the pending vote.
    pub fn set_vote(&mut self, vote: bool) {
        if self.self_vote == vote {
            return;
        }
        self.self_vote = vote;
        if vote {
            self.votes_for = self.votes_for.saturating_add(1);
        } else {
            self.votes_for = self.votes_for.saturating_sub(1);
        }
        self.pending_self_vote = match self.pending_self_vote {
            Some(_) => None,
            None => Some(vote),
        };
    }

    /// Number of replicas voting for
    pub fn votes_for(&self) -> u32 {
        self.votes_for
    }

    /// Total number of voting replicas
    pub fn voters(&self) -> u32 {
        self.voters
    }

    pub fn at_least_one(&self) -> bool {
        self.votes_for > 0
    }

    pub fn majority(&self) -> bool {
        u64::from(self.votes_for) * 2 > u64::from(self.voters)
    }

    pub fn all(&self) -> bool {
        self.votes_for == self.voters
    }
}

impl DeltaCrdt for Vote {
    type Delta = VoteDelta;

    fn take_delta(&mut self, initial: bool) -> Option<VoteDelta> {
        if self.pending_self_vote.take().is_none() && !initial {
            return None;
        }
        Some(VoteDelta {
            self_vote: self.self_vote,
            votes_for: self.votes_for,
            total_voters: self.voters,
        })
    }

    fn apply_delta(&mut self, delta: VoteDelta) -> Result<()> {
        self.self_vote = delta.self_vote;
        self.votes_for = delta.votes_for;
        self.voters = delta.total_voters;
        Ok(())
    }

    fn has_pending_delta(&self) -> bool {
        self.pending_self_vote.is_some()
    }
}

impl FromDelta for Vote {
    fn from_delta(_delta: &VoteDelta) -> Result<Self> {
        Ok(Self::new())
    }
}

impl Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vote({}/{}, self: {})", self.votes_for, self.voters, self.self_vote)
    }
}
